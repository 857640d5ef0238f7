mod commands;
pub mod discord;
mod handlers;

use std::{
	fmt::{self, Display, Formatter},
	sync::Arc,
};

use serenity::async_trait;
use tokio::sync::mpsc::UnboundedReceiver;

use crate::error::ConnectionError;

/// Platform channel identifier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChannelKey(pub u64);

impl Display for ChannelKey {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		self.0.fmt(f)
	}
}

/// Platform message identifier, used to thread replies.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MessageKey(pub u64);

#[derive(Clone, Debug)]
pub struct InboundMessage {
	pub id: MessageKey,
	pub channel: ChannelKey,
	pub channel_name: String,
	pub author: String,
	pub from_self: bool,
	pub from_bot: bool,
	pub content: String,
}

#[derive(Clone, Debug)]
pub enum PlatformEvent {
	Message(InboundMessage),
	/// A user asked the bot to forget a channel's conversation.
	Reset {
		channel: ChannelKey,
		channel_name: String,
	},
}

/// An open connection: a handle for outbound calls plus the inbound event stream.
pub struct Connection {
	pub platform: Arc<dyn ChatPlatform>,
	pub events: UnboundedReceiver<PlatformEvent>,
}

#[async_trait]
pub trait Connector: Send + Sync {
	async fn connect(&self, token: &str) -> Result<Connection, ConnectionError>;
}

#[async_trait]
pub trait ChatPlatform: Send + Sync {
	async fn send_message(&self, channel: ChannelKey, content: &str) -> Result<(), ConnectionError>;

	/// Answers `message` without pinging its author.
	async fn send_reply(
		&self,
		channel: ChannelKey,
		_message: MessageKey,
		content: &str,
	) -> Result<(), ConnectionError> {
		self.send_message(channel, content).await
	}

	/// Best effort; failures are ignored.
	async fn start_typing(&self, _channel: ChannelKey) {}

	async fn find_channel(&self, name: &str) -> Option<ChannelKey>;

	async fn apply_persona(
		&self,
		_name: &str,
		_avatar: Option<Vec<u8>>,
	) -> Result<(), ConnectionError> {
		Ok(())
	}

	async fn close(&self);
}
