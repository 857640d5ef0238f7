use std::sync::Arc;

use tokio::{
	sync::{Mutex, mpsc, watch},
	task::JoinHandle,
};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::{
	SessionCommand, SessionSnapshot, SessionState,
	listener::{Listener, ListenerExit},
};
use crate::{
	character::{CharacterResolver, CharacterTemplate},
	config::types::Params,
	error::{ConfigError, StartError},
	platform::{ChannelKey, ChatPlatform, Connection, Connector},
	utils::ai::TextGenerator,
};

struct ActiveSession {
	commands: mpsc::UnboundedSender<SessionCommand>,
	cancel: CancellationToken,
	listener: JoinHandle<ListenerExit>,
	platform: Arc<dyn ChatPlatform>,
}

/// Starts and stops the bot's Discord session and forwards live updates to it.
pub struct SessionController {
	connector: Arc<dyn Connector>,
	generator: Arc<dyn TextGenerator>,
	resolver: CharacterResolver,
	state: Arc<watch::Sender<SessionState>>,
	active: Mutex<Option<ActiveSession>>,
}

impl SessionController {
	pub fn new(
		connector: Arc<dyn Connector>,
		generator: Arc<dyn TextGenerator>,
		resolver: CharacterResolver,
	) -> Self {
		let (state, _) = watch::channel(SessionState::Stopped);
		Self {
			connector,
			generator,
			resolver,
			state: Arc::new(state),
			active: Mutex::new(None),
		}
	}

	pub fn state(&self) -> SessionState {
		*self.state.borrow()
	}

	pub fn subscribe(&self) -> watch::Receiver<SessionState> {
		self.state.subscribe()
	}

	pub const fn resolver(&self) -> &CharacterResolver {
		&self.resolver
	}

	pub fn is_running(&self) -> bool {
		self.state() == SessionState::Running
	}

	pub async fn start(&self, snapshot: SessionSnapshot) -> Result<(), StartError> {
		let mut active = self.active.lock().await;
		// A session left behind here lost its connection and already reported STOPPED.
		if active.is_some() && self.state() != SessionState::Stopped {
			return Err(StartError::AlreadyRunning);
		}
		if let Some(ended) = active.take() {
			if let Err(err) = ended.listener.await {
				warn!("Session listener ended abnormally: {err}");
			}
			ended.platform.close().await;
		}
		self.state.send_replace(SessionState::Starting);
		match self.open(snapshot).await {
			Ok(session) => {
				*active = Some(session);
				self.state.send_replace(SessionState::Running);
				info!("Bot session is running");
				Ok(())
			}
			Err(err) => {
				self.state.send_replace(SessionState::Stopped);
				Err(err)
			}
		}
	}

	async fn open(&self, snapshot: SessionSnapshot) -> Result<ActiveSession, StartError> {
		let token = snapshot.token.trim().to_owned();
		if token.is_empty() {
			return Err(ConfigError::MissingToken.into());
		}
		let template = Arc::new(self.resolver.resolve_selection(
			snapshot.mode,
			&snapshot.character,
			snapshot.instruction_template.as_deref(),
		)?);
		let avatar = if snapshot.options.sync_profile {
			self.resolver.avatar(template.name())
		} else {
			None
		};
		let Connection { platform, events } = self.connector.connect(&token).await?;
		info!(
			"Connected as {} character {}",
			template.mode(),
			template.name()
		);

		let cancel = CancellationToken::new();
		let (commands, commands_rx) = mpsc::unbounded_channel();
		let listener = Listener::new(
			Arc::clone(&platform),
			Arc::clone(&self.generator),
			template,
			avatar,
			snapshot,
			cancel.clone(),
		);
		let state = Arc::clone(&self.state);
		let listener = tokio::spawn(async move {
			let exit = listener.run(events, commands_rx).await;
			if exit == ListenerExit::Disconnected {
				state.send_replace(SessionState::Stopped);
			}
			exit
		});
		Ok(ActiveSession {
			commands,
			cancel,
			listener,
			platform,
		})
	}

	/// Returns once no further messages can be sent by the stopped session.
	pub async fn stop(&self) {
		let mut active = self.active.lock().await;
		let Some(session) = active.take() else {
			return;
		};
		self.state.send_replace(SessionState::Stopping);
		session.cancel.cancel();
		if let Err(err) = session.listener.await {
			warn!("Session listener ended abnormally: {err}");
		}
		session.platform.close().await;
		self.state.send_replace(SessionState::Stopped);
		info!("Bot session stopped");
	}

	pub async fn update_params(&self, params: Params) -> bool {
		self.send(SessionCommand::UpdateParams(params)).await
	}

	pub async fn switch_character(&self, template: CharacterTemplate) -> bool {
		let avatar = self.resolver.avatar(template.name());
		self.send(SessionCommand::SwitchCharacter {
			template: Arc::new(template),
			avatar,
		})
		.await
	}

	pub async fn reset_channel(&self, channel: ChannelKey) -> bool {
		self.send(SessionCommand::ResetChannel(channel)).await
	}

	async fn send(&self, command: SessionCommand) -> bool {
		self.active
			.lock()
			.await
			.as_ref()
			.is_some_and(|session| session.commands.send(command).is_ok())
	}
}
