use std::{env, path::PathBuf};

use anyhow::{Context as _, Result as AResult};
use beeperbot::{
	config::{constants::DEFAULT_CONFIG_PATH, settings::AppConfig},
	init_tracing, run,
};
use tracing::info;

#[tokio::main]
async fn main() -> AResult<()> {
	let config_path = env::var_os("BEEPERBOT_CONFIG")
		.map_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH), PathBuf::from);
	let loaded = AppConfig::load(&config_path)
		.with_context(|| format!("Failed to load {}", config_path.display()))?;
	let found = loaded.is_some();
	let app = loaded.unwrap_or_default();
	init_tracing(&app.bot.log_level);
	if !found {
		info!(
			"{} not found, using default configuration",
			config_path.display()
		);
	}
	run(app).await
}
