pub mod character;
pub mod config;
pub mod error;
pub mod operator;
pub mod platform;
pub mod prompt;
pub mod session;
pub mod utils;

use std::{env, sync::Arc};

use anyhow::{Context as _, Result as AResult};
use tokio::{
	select,
	signal::unix::{SignalKind, signal},
};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt as _, util::SubscriberInitExt as _};

use crate::{
	character::CharacterResolver,
	config::{settings::AppConfig, types::BotConfig},
	operator::{
		Operator, OperatorCommand,
		console::{self, ConsoleExit},
	},
	platform::discord::DiscordConnector,
	session::SessionController,
	utils::ai::OobaClient,
};

/// `RUST_LOG` takes precedence over the configured level.
pub fn init_tracing(log_level: &str) {
	let filter = env::var("RUST_LOG")
		.ok()
		.and_then(|directives| EnvFilter::try_new(directives).ok())
		.unwrap_or_else(|| EnvFilter::new(log_level));
	tracing_subscriber::registry()
		.with(filter)
		.with(tracing_subscriber::fmt::layer())
		.init();
}

async fn wait_until_shutdown() -> AResult<()> {
	let [mut s1, mut s2, mut s3] = [
		signal(SignalKind::hangup())?,
		signal(SignalKind::interrupt())?,
		signal(SignalKind::terminate())?,
	];

	select!(
		_ = s1.recv() => {},
		_ = s2.recv() => {},
		_ = s3.recv() => {},
	);
	Ok(())
}

pub async fn run(app: AppConfig) -> AResult<()> {
	let mut bot_config =
		BotConfig::load(&app.bot.settings_path).context("Failed to load bot settings")?;
	bot_config
		.load_token(&app.bot.token_path)
		.context("Failed to load Discord token")?;
	let generator = OobaClient::new(&app.backend).context("Failed to build backend client")?;
	info!("Generating text through {}", generator.endpoint());
	let controller = Arc::new(SessionController::new(
		Arc::new(DiscordConnector::new(app.bot.connect_timeout())),
		Arc::new(generator),
		CharacterResolver::new(&app.bot.characters_dir, &app.bot.instruct_dir),
	));
	let mut operator = Operator::new(bot_config, &app.bot, Arc::clone(&controller));

	if app.bot.autostart {
		match operator.apply(OperatorCommand::Start).await {
			Ok(reply) => info!("{reply}"),
			Err(err) => warn!("Autostart failed: {err:#}"),
		}
	}

	select! {
		result = wait_until_shutdown() => {
			result.context("Failed to listen for shutdown signals")?;
			warn!("Received shutdown signal, stopping...");
		}
		exit = console::run(&mut operator) => {
			if exit? == ConsoleExit::InputClosed {
				info!("Console input closed, waiting for a shutdown signal");
				wait_until_shutdown()
					.await
					.context("Failed to listen for shutdown signals")?;
			}
		}
	}

	controller.stop().await;
	Ok(())
}
