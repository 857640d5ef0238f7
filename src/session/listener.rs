use std::{
	collections::{HashMap, HashSet},
	sync::Arc,
};

use tokio::{
	select,
	sync::mpsc::{self, UnboundedReceiver, UnboundedSender},
	task::JoinSet,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{
	SessionCommand, SessionOptions, SessionSnapshot,
	filter::ChannelFilter,
	worker::{ChannelWorker, Job},
};
use crate::{
	character::CharacterTemplate,
	config::types::Params,
	platform::{ChannelKey, ChatPlatform, InboundMessage, PlatformEvent},
	prompt::PromptFormat,
	utils::ai::TextGenerator,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(super) enum ListenerExit {
	Cancelled,
	Disconnected,
}

/// Routes platform events into per-channel workers for one session.
pub(super) struct Listener {
	platform: Arc<dyn ChatPlatform>,
	generator: Arc<dyn TextGenerator>,
	template: Arc<CharacterTemplate>,
	format: Arc<PromptFormat>,
	params: Params,
	filter: ChannelFilter,
	/// Channels opened up by someone naming the character.
	invited: HashSet<ChannelKey>,
	starting_channel: Option<String>,
	avatar: Option<Vec<u8>>,
	options: SessionOptions,
	cancel: CancellationToken,
	workers: HashMap<ChannelKey, UnboundedSender<Job>>,
	tasks: JoinSet<()>,
}

impl Listener {
	pub(super) fn new(
		platform: Arc<dyn ChatPlatform>,
		generator: Arc<dyn TextGenerator>,
		template: Arc<CharacterTemplate>,
		avatar: Option<Vec<u8>>,
		snapshot: SessionSnapshot,
		cancel: CancellationToken,
	) -> Self {
		let filter = ChannelFilter::new(
			snapshot.starting_channel.clone(),
			snapshot.whitelist,
			snapshot.blacklist,
		);
		Self {
			platform,
			generator,
			format: Arc::new(PromptFormat::new(&template)),
			template,
			params: snapshot.params,
			filter,
			invited: HashSet::new(),
			starting_channel: snapshot.starting_channel,
			avatar,
			options: snapshot.options,
			cancel,
			workers: HashMap::new(),
			tasks: JoinSet::new(),
		}
	}

	pub(super) async fn run(
		mut self,
		mut events: UnboundedReceiver<PlatformEvent>,
		mut commands: UnboundedReceiver<SessionCommand>,
	) -> ListenerExit {
		self.on_connected().await;
		let exit = loop {
			select! {
				biased;
				() = self.cancel.cancelled() => break ListenerExit::Cancelled,
				Some(command) = commands.recv() => self.handle_command(command).await,
				event = events.recv() => match event {
					Some(event) => self.handle_event(event),
					None => {
						warn!("Discord event stream ended");
						break ListenerExit::Disconnected;
					}
				},
			}
		};
		self.shutdown(exit).await;
		exit
	}

	async fn on_connected(&mut self) {
		if self.options.sync_profile {
			self.sync_profile().await;
		}
		let Some(name) = self.starting_channel.clone() else {
			return;
		};
		match self.platform.find_channel(&name).await {
			Some(channel) => self.greet(channel),
			None => warn!("Starting channel #{name} was not found"),
		}
	}

	async fn sync_profile(&mut self) {
		if let Err(err) = self
			.platform
			.apply_persona(self.template.name(), self.avatar.take())
			.await
		{
			warn!("Failed to update bot profile: {err}");
		}
	}

	async fn handle_command(&mut self, command: SessionCommand) {
		match command {
			SessionCommand::UpdateParams(params) => {
				self.params = params;
				info!("Generation parameters updated: {params}");
			}
			SessionCommand::SwitchCharacter { template, avatar } => {
				self.format = Arc::new(PromptFormat::new(&template));
				self.template = template;
				self.avatar = avatar;
				info!(
					"Switched to {} character {}",
					self.template.mode(),
					self.template.name()
				);
				if self.options.sync_profile {
					self.sync_profile().await;
				}
			}
			SessionCommand::ResetChannel(channel) => {
				if self.workers.contains_key(&channel) {
					self.dispatch(channel, Job::Reset);
				}
			}
		}
	}

	fn handle_event(&mut self, event: PlatformEvent) {
		match event {
			PlatformEvent::Message(message) => self.handle_message(message),
			PlatformEvent::Reset {
				channel,
				channel_name,
			} => {
				if self.serves(channel, &channel_name) {
					self.dispatch(channel, Job::Reset);
					self.greet(channel);
				}
			}
		}
	}

	fn handle_message(&mut self, message: InboundMessage) {
		if message.from_self || message.from_bot {
			return;
		}
		if !self.options.ignore_prefix.is_empty()
			&& message.content.starts_with(&self.options.ignore_prefix)
		{
			return;
		}
		if message.content.trim().is_empty() {
			return;
		}
		if !self.serves(message.channel, &message.channel_name) {
			if !self.mentions_character(&message.content)
				|| !self.filter.admits_mention(&message.channel_name)
			{
				debug!("Ignoring message in #{}", message.channel_name);
				return;
			}
			info!("I was pinged in #{}, I can now talk there", message.channel_name);
			self.invited.insert(message.channel);
		}
		self.dispatch(message.channel, Job::Reply {
			message: message.id,
			author: message.author,
			content: message.content,
			params: self.params,
			format: Arc::clone(&self.format),
		});
	}

	fn serves(&self, channel: ChannelKey, channel_name: &str) -> bool {
		self.invited.contains(&channel) || self.filter.allows(channel_name)
	}

	fn mentions_character(&self, content: &str) -> bool {
		let name = self.template.name().trim().to_lowercase();
		!name.is_empty() && content.to_lowercase().contains(&name)
	}

	fn greet(&mut self, channel: ChannelKey) {
		self.dispatch(channel, Job::Greet {
			greeting: self.template.greeting().map(str::to_owned),
			params: self.params,
			format: Arc::clone(&self.format),
		});
	}

	fn dispatch(&mut self, channel: ChannelKey, job: Job) {
		if !self.workers.contains_key(&channel) {
			let (tx, rx) = mpsc::unbounded_channel();
			let worker = ChannelWorker::new(
				channel,
				self.options.history_limit,
				Arc::clone(&self.platform),
				Arc::clone(&self.generator),
				self.cancel.clone(),
			);
			self.tasks.spawn(worker.run(rx));
			self.workers.insert(channel, tx);
		}
		if let Some(worker) = self.workers.get(&channel)
			&& worker.send(job).is_err()
		{
			warn!("Worker for channel {channel} is gone; it will restart on the next message");
			self.workers.remove(&channel);
		}
	}

	async fn shutdown(&mut self, exit: ListenerExit) {
		self.tasks.abort_all();
		while self.tasks.join_next().await.is_some() {}
		if exit == ListenerExit::Cancelled && !self.options.farewell.is_empty() {
			for channel in self.workers.keys() {
				if let Err(err) = self
					.platform
					.send_message(*channel, &self.options.farewell)
					.await
				{
					warn!("Failed to say goodbye in channel {channel}: {err}");
				}
			}
		}
		self.workers.clear();
	}
}
