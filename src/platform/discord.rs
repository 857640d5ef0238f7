use std::{sync::Arc, time::Duration};

use dashmap::DashMap;
use poise::{
	Framework, FrameworkOptions,
	serenity_prelude::{
		Cache, ChannelId, ChannelType, ClientBuilder, CreateAllowedMentions, CreateAttachment,
		CreateMessage, EditProfile, GatewayIntents, Http, MessageId, ShardManager,
	},
};
use serenity::async_trait;
use tokio::{
	select, spawn,
	sync::{
		Mutex,
		mpsc::{self, UnboundedSender},
		oneshot,
	},
	task::JoinHandle,
	time::sleep,
};
use tracing::{info, warn};

use super::{
	ChannelKey, ChatPlatform, Connection, Connector, MessageKey, PlatformEvent, commands,
	handlers::{event_handler, on_error},
};
use crate::{
	config::constants::DISCORD_MESSAGE_LIMIT, error::ConnectionError,
	utils::helpers::split_message,
};

pub type Error = anyhow::Error;
pub type Context<'a> = poise::Context<'a, Data, Error>;

/// Framework user data shared by the event handler and slash commands.
pub struct Data {
	pub events: UnboundedSender<PlatformEvent>,
	/// Guild text channel names by channel id, `None` for channels that are not forwarded.
	pub channel_names: DashMap<u64, Option<String>>,
}

pub struct DiscordConnector {
	connect_timeout: Duration,
}

impl DiscordConnector {
	#[must_use]
	pub const fn new(connect_timeout: Duration) -> Self {
		Self { connect_timeout }
	}
}

#[async_trait]
impl Connector for DiscordConnector {
	async fn connect(&self, token: &str) -> Result<Connection, ConnectionError> {
		let (events_tx, events) = mpsc::unbounded_channel();
		let (ready_tx, ready_rx) = oneshot::channel::<()>();
		let framework = Framework::builder()
			.options(FrameworkOptions {
				commands: vec![commands::reset(), commands::repeat()],
				event_handler: |ctx, event, framework, data| {
					Box::pin(event_handler(ctx, event, framework, data))
				},
				on_error: |error| Box::pin(on_error(error)),
				allowed_mentions: Some(CreateAllowedMentions::default().replied_user(false)),
				..Default::default()
			})
			.setup(move |ctx, ready, framework| {
				Box::pin(async move {
					info!("Logged in as {}", ready.user.name);
					if let Err(err) =
						poise::builtins::register_globally(ctx, &framework.options().commands).await
					{
						warn!("Failed to register slash commands: {err}");
					}
					if ready_tx.send(()).is_err() {
						warn!("Connection attempt was abandoned before Discord became ready");
					}
					Ok(Data {
						events: events_tx,
						channel_names: DashMap::new(),
					})
				})
			})
			.build();
		let intents = GatewayIntents::GUILDS
			| GatewayIntents::GUILD_MESSAGES
			| GatewayIntents::MESSAGE_CONTENT;
		let mut client = ClientBuilder::new(token, intents)
			.framework(framework)
			.await?;

		let http = Arc::clone(&client.http);
		let cache = Arc::clone(&client.cache);
		let shard_manager = Arc::clone(&client.shard_manager);
		let (start_tx, mut start_rx) = oneshot::channel();
		let runner = spawn(async move {
			let result = client.start().await;
			// Once connected nobody waits on the result anymore.
			if let Err(Err(err)) = start_tx.send(result) {
				warn!("Discord client error: {err}");
			}
		});

		select! {
			ready = ready_rx => {
				if ready.is_err() {
					runner.abort();
					return Err(ConnectionError::Closed);
				}
			}
			started = &mut start_rx => {
				return Err(match started {
					Ok(Err(err)) => err.into(),
					_ => ConnectionError::Closed,
				});
			}
			() = sleep(self.connect_timeout) => {
				shard_manager.shutdown_all().await;
				runner.abort();
				return Err(ConnectionError::Timeout(self.connect_timeout));
			}
		}

		Ok(Connection {
			platform: Arc::new(DiscordPlatform {
				http,
				cache,
				shard_manager,
				runner: Mutex::new(Some(runner)),
			}),
			events,
		})
	}
}

pub struct DiscordPlatform {
	http: Arc<Http>,
	cache: Arc<Cache>,
	shard_manager: Arc<ShardManager>,
	runner: Mutex<Option<JoinHandle<()>>>,
}

impl DiscordPlatform {
	fn cached_channel(&self, name: &str) -> Option<ChannelKey> {
		self.cache.guilds().into_iter().find_map(|guild_id| {
			let guild = self.cache.guild(guild_id)?;
			guild
				.channels
				.values()
				.find(|channel| channel.kind == ChannelType::Text && channel.name == name)
				.map(|channel| ChannelKey(channel.id.get()))
		})
	}
}

#[async_trait]
impl ChatPlatform for DiscordPlatform {
	async fn send_message(&self, channel: ChannelKey, content: &str) -> Result<(), ConnectionError> {
		let channel_id = ChannelId::new(channel.0);
		for chunk in split_message(content, DISCORD_MESSAGE_LIMIT) {
			channel_id.say(&self.http, chunk).await?;
		}
		Ok(())
	}

	async fn send_reply(
		&self,
		channel: ChannelKey,
		message: MessageKey,
		content: &str,
	) -> Result<(), ConnectionError> {
		let channel_id = ChannelId::new(channel.0);
		let mut chunks = split_message(content, DISCORD_MESSAGE_LIMIT).into_iter();
		if let Some(first) = chunks.next() {
			let reply = CreateMessage::new()
				.content(first)
				.reference_message((channel_id, MessageId::new(message.0)))
				.allowed_mentions(CreateAllowedMentions::new().replied_user(false));
			channel_id.send_message(&self.http, reply).await?;
		}
		for chunk in chunks {
			channel_id.say(&self.http, chunk).await?;
		}
		Ok(())
	}

	async fn start_typing(&self, channel: ChannelKey) {
		if let Err(err) = self.http.broadcast_typing(ChannelId::new(channel.0)).await {
			warn!("Failed to show typing in channel {channel}: {err}");
		}
	}

	async fn find_channel(&self, name: &str) -> Option<ChannelKey> {
		let name = name.trim_start_matches('#');
		if let Some(channel) = self.cached_channel(name) {
			return Some(channel);
		}
		// Guilds may not be cached yet right after the ready event.
		for guild_id in self.cache.guilds() {
			match guild_id.channels(&self.http).await {
				Ok(channels) => {
					if let Some(channel) = channels
						.values()
						.find(|channel| channel.kind == ChannelType::Text && channel.name == name)
					{
						return Some(ChannelKey(channel.id.get()));
					}
				}
				Err(err) => warn!("Failed to list channels of guild {guild_id}: {err}"),
			}
		}
		None
	}

	async fn apply_persona(
		&self,
		name: &str,
		avatar: Option<Vec<u8>>,
	) -> Result<(), ConnectionError> {
		let mut profile = EditProfile::new().username(name);
		if let Some(bytes) = avatar {
			profile = profile.avatar(&CreateAttachment::bytes(bytes, "avatar.png"));
		}
		self.http.edit_profile(&profile).await?;
		info!("Bot profile now shows {name}");
		Ok(())
	}

	async fn close(&self) {
		self.shard_manager.shutdown_all().await;
		let runner = self.runner.lock().await.take();
		if let Some(runner) = runner
			&& let Err(err) = runner.await
		{
			warn!("Discord client task ended abnormally: {err}");
		}
	}
}
