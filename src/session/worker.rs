use std::sync::Arc;

use tokio::{select, sync::mpsc::UnboundedReceiver};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::{
	config::{
		constants::{GREETING_AUTHOR, GREETING_PROMPT},
		types::Params,
	},
	platform::{ChannelKey, ChatPlatform, MessageKey},
	prompt::PromptFormat,
	session::history::{ConversationTurn, History},
	utils::ai::{GenerationRequest, TextGenerator},
};

/// Work queued for one channel. Jobs carry the parameters and prompt format that
/// were current when the triggering event arrived.
#[derive(Debug)]
pub(super) enum Job {
	Reply {
		message: MessageKey,
		author: String,
		content: String,
		params: Params,
		format: Arc<PromptFormat>,
	},
	Greet {
		greeting: Option<String>,
		params: Params,
		format: Arc<PromptFormat>,
	},
	Reset,
}

/// Owns a channel's history and answers its jobs strictly in arrival order.
pub(super) struct ChannelWorker {
	channel: ChannelKey,
	history: History,
	platform: Arc<dyn ChatPlatform>,
	generator: Arc<dyn TextGenerator>,
	cancel: CancellationToken,
}

impl ChannelWorker {
	pub(super) fn new(
		channel: ChannelKey,
		history_limit: usize,
		platform: Arc<dyn ChatPlatform>,
		generator: Arc<dyn TextGenerator>,
		cancel: CancellationToken,
	) -> Self {
		Self {
			channel,
			history: History::new(history_limit),
			platform,
			generator,
			cancel,
		}
	}

	pub(super) async fn run(mut self, mut jobs: UnboundedReceiver<Job>) {
		while let Some(job) = jobs.recv().await {
			if self.cancel.is_cancelled() {
				break;
			}
			match job {
				Job::Reply {
					message,
					author,
					content,
					params,
					format,
				} => {
					self.history
						.push(ConversationTurn::user(format!("{author}: {content}")));
					self.respond(params, &format, Some(message)).await;
				}
				Job::Greet {
					greeting: Some(greeting),
					..
				} => {
					self.history.push(ConversationTurn::bot(greeting.clone()));
					self.deliver(&greeting, None).await;
				}
				Job::Greet {
					greeting: None,
					params,
					format,
				} => {
					self.history.push(ConversationTurn::user(format!(
						"{GREETING_AUTHOR}: {GREETING_PROMPT}"
					)));
					self.respond(params, &format, None).await;
				}
				Job::Reset => {
					self.history.clear();
					info!("Cleared conversation in channel {}", self.channel);
				}
			}
		}
	}

	async fn respond(
		&mut self,
		params: Params,
		format: &PromptFormat,
		reply_to: Option<MessageKey>,
	) {
		let request = GenerationRequest {
			prompt: format.build(self.history.iter()),
			params,
			stopping_strings: format.stopping_strings().to_vec(),
		};
		self.platform.start_typing(self.channel).await;
		let result = select! {
			() = self.cancel.cancelled() => return,
			result = self.generator.generate(request) => result,
		};
		match result {
			Ok(raw) => {
				let reply = format.clean_reply(&raw);
				if reply.is_empty() {
					warn!("Backend returned an empty reply in channel {}", self.channel);
					self.history.rollback_user();
					return;
				}
				self.history.push(ConversationTurn::bot(reply.clone()));
				self.deliver(&reply, reply_to).await;
			}
			Err(err) => {
				error!("Generation failed in channel {}: {err}", self.channel);
				self.history.rollback_user();
			}
		}
	}

	async fn deliver(&self, text: &str, reply_to: Option<MessageKey>) {
		if self.cancel.is_cancelled() {
			debug!("Dropping reply for channel {} after stop", self.channel);
			return;
		}
		let sent = match reply_to {
			Some(message) => self.platform.send_reply(self.channel, message, text).await,
			None => self.platform.send_message(self.channel, text).await,
		};
		if let Err(err) = sent {
			warn!("Failed to send reply to channel {}: {err}", self.channel);
		}
	}
}
