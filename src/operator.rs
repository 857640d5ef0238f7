pub mod console;

use std::{
	collections::BTreeSet,
	fmt::Write as _,
	path::PathBuf,
	str::FromStr,
	sync::Arc,
};

use anyhow::{Context as _, Result as AResult};

use crate::{
	config::{
		settings::BotSection,
		types::{BotConfig, GenerationMode, Params, parse_channel_list},
	},
	error::CommandError,
	platform::ChannelKey,
	session::{SessionController, SessionOptions, SessionSnapshot, SessionState},
};

pub const HELP: &str = "\
start | stop | toggle        start or stop the bot
status                       show state, character and sampling parameters
token <value>                set the Discord token
save-token                   write the token file
characters                   list characters for the current mode
character <name>             select a character (applied live when running)
mode chat|instruct           switch generation mode
template <name|none>         instruction template for chat characters in instruct mode
set <param> <value>          temperature, top_p, top_k or repetition_penalty
reset-sliders                restore the simple-1 preset
starting-channel <name|none> channel greeted on start
whitelist <a,b,...>          only answer in these channels (empty clears)
blacklist <a,b,...>          never answer in these channels (empty clears)
forget <channel-id>          clear one channel's conversation
save                         write the settings file
help                         show this list
quit                         stop the bot and exit";

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OperatorCommand {
	Start,
	Stop,
	Toggle,
	Status,
	Token(String),
	SaveToken,
	Characters,
	Character(String),
	Mode(GenerationMode),
	Template(Option<String>),
	Set { name: String, value: String },
	ResetSliders,
	StartingChannel(Option<String>),
	Whitelist(BTreeSet<String>),
	Blacklist(BTreeSet<String>),
	Forget(ChannelKey),
	Save,
	Help,
	Quit,
}

impl FromStr for OperatorCommand {
	type Err = CommandError;

	fn from_str(line: &str) -> Result<Self, Self::Err> {
		let line = line.trim();
		let (word, rest) = line
			.split_once(char::is_whitespace)
			.map_or((line, ""), |(word, rest)| (word, rest.trim()));
		let required = |usage: &'static str| {
			if rest.is_empty() {
				Err(CommandError::Usage(usage))
			} else {
				Ok(rest.to_owned())
			}
		};
		Ok(match word.to_ascii_lowercase().as_str() {
			"start" => Self::Start,
			"stop" => Self::Stop,
			"toggle" => Self::Toggle,
			"status" => Self::Status,
			"token" => Self::Token(required("token <value>")?),
			"save-token" => Self::SaveToken,
			"characters" => Self::Characters,
			"character" => Self::Character(required("character <name>")?),
			"mode" => Self::Mode(required("mode chat|instruct")?.parse()?),
			"template" => {
				let name = required("template <name|none>")?;
				Self::Template((!name.eq_ignore_ascii_case("none")).then_some(name))
			}
			"set" => {
				let args = required("set <param> <value>")?;
				let Some((name, value)) = args.split_once(char::is_whitespace) else {
					return Err(CommandError::Usage("set <param> <value>"));
				};
				Self::Set {
					name: name.to_owned(),
					value: value.trim().to_owned(),
				}
			}
			"reset-sliders" => Self::ResetSliders,
			"starting-channel" => {
				let name = required("starting-channel <name|none>")?;
				let name = name.trim_start_matches('#');
				Self::StartingChannel(
					(!name.eq_ignore_ascii_case("none") && !name.is_empty()).then(|| name.to_owned()),
				)
			}
			"whitelist" => Self::Whitelist(parse_channel_list(rest)),
			"blacklist" => Self::Blacklist(parse_channel_list(rest)),
			"forget" => {
				let raw = required("forget <channel-id>")?;
				Self::Forget(ChannelKey(
					raw.parse()
						.map_err(|_| CommandError::InvalidChannelId(raw.clone()))?,
				))
			}
			"save" => Self::Save,
			"help" | "?" => Self::Help,
			"quit" | "exit" => Self::Quit,
			_ => return Err(CommandError::Unknown(word.to_owned())),
		})
	}
}

/// Owns the bot configuration and applies console commands to it and to the session.
pub struct Operator {
	config: BotConfig,
	settings_path: PathBuf,
	token_path: PathBuf,
	options: SessionOptions,
	controller: Arc<SessionController>,
	characters: Vec<String>,
}

impl Operator {
	pub fn new(config: BotConfig, section: &BotSection, controller: Arc<SessionController>) -> Self {
		let characters = controller.resolver().list(config.character_mode());
		Self {
			config,
			settings_path: section.settings_path.clone(),
			token_path: section.token_path.clone(),
			options: SessionOptions::from(section),
			controller,
			characters,
		}
	}

	#[must_use]
	pub const fn config(&self) -> &BotConfig {
		&self.config
	}

	#[must_use]
	pub fn characters(&self) -> &[String] {
		&self.characters
	}

	pub async fn apply(&mut self, command: OperatorCommand) -> AResult<String> {
		match command {
			OperatorCommand::Start => self.start().await,
			OperatorCommand::Stop => Ok(self.stop().await),
			OperatorCommand::Toggle => {
				if self.controller.is_running() {
					Ok(self.stop().await)
				} else {
					self.start().await
				}
			}
			OperatorCommand::Status => Ok(self.status()),
			OperatorCommand::Token(token) => {
				self.config.token = token.trim().to_owned();
				Ok("Token updated, it is used on the next start".to_owned())
			}
			OperatorCommand::SaveToken => {
				self.config
					.save_token(&self.token_path)
					.context("Failed to save token")?;
				Ok(format!("Token written to {}", self.token_path.display()))
			}
			OperatorCommand::Characters => {
				self.characters = self.controller.resolver().list(self.config.character_mode());
				Ok(self.character_list())
			}
			OperatorCommand::Character(name) => self.select_character(name).await,
			OperatorCommand::Mode(mode) => self.select_mode(mode).await,
			OperatorCommand::Template(template) => self.select_template(template).await,
			OperatorCommand::Set { name, value } => {
				self.config.params.set(&name, &value)?;
				self.push_params().await;
				Ok(format!("Sampling parameters: {}", self.config.params))
			}
			OperatorCommand::ResetSliders => {
				self.config.params = Params::default();
				self.push_params().await;
				Ok(format!("Sampling parameters reset: {}", self.config.params))
			}
			OperatorCommand::StartingChannel(channel) => {
				let reply = channel.as_ref().map_or_else(
					|| "Starting channel cleared".to_owned(),
					|name| format!("Starting channel set to #{name}"),
				);
				self.config.starting_channel = channel;
				Ok(reply)
			}
			OperatorCommand::Whitelist(channels) => {
				self.config.channel_whitelist = channels;
				Ok(format!(
					"Whitelist: {}",
					join_channels(&self.config.channel_whitelist)
				))
			}
			OperatorCommand::Blacklist(channels) => {
				self.config.channel_blacklist = channels;
				Ok(format!(
					"Blacklist: {}",
					join_channels(&self.config.channel_blacklist)
				))
			}
			OperatorCommand::Forget(channel) => {
				if self.controller.reset_channel(channel).await {
					Ok(format!("Forgetting conversation in channel {channel}"))
				} else {
					Ok("Bot is not running".to_owned())
				}
			}
			OperatorCommand::Save => {
				self.config
					.save(&self.settings_path)
					.context("Failed to save settings")?;
				Ok(format!("Settings written to {}", self.settings_path.display()))
			}
			OperatorCommand::Help => Ok(HELP.to_owned()),
			OperatorCommand::Quit => {
				self.controller.stop().await;
				Ok("Goodbye".to_owned())
			}
		}
	}

	async fn start(&mut self) -> AResult<String> {
		self.controller
			.start(SessionSnapshot::new(&self.config, self.options.clone()))
			.await
			.context("Failed to start the bot")?;
		Ok(format!(
			"Bot started as {} character {}",
			self.config.mode, self.config.character
		))
	}

	async fn stop(&self) -> String {
		if self.controller.state() == SessionState::Stopped {
			return "Bot is not running".to_owned();
		}
		self.controller.stop().await;
		"Bot stopped".to_owned()
	}

	async fn select_character(&mut self, name: String) -> AResult<String> {
		let template = self
			.controller
			.resolver()
			.resolve_selection(
				self.config.mode,
				&name,
				self.config.instruction_template.as_deref(),
			)
			.with_context(|| format!("Cannot select {name}"))?;
		let live = self.controller.switch_character(template).await;
		self.config.character = name;
		Ok(if live {
			format!("Switched to {}", self.config.character)
		} else {
			format!("Selected {}", self.config.character)
		})
	}

	async fn select_mode(&mut self, mode: GenerationMode) -> AResult<String> {
		if self.controller.is_running() {
			let template = self
				.controller
				.resolver()
				.resolve_selection(
					mode,
					&self.config.character,
					self.config.instruction_template.as_deref(),
				)
				.with_context(|| {
					format!("{} has no {mode} character, select one first", self.config.character)
				})?;
			self.controller.switch_character(template).await;
		}
		self.config.mode = mode;
		self.characters = self.controller.resolver().list(self.config.character_mode());
		Ok(format!("Mode set to {mode}. {}", self.character_list()))
	}

	async fn select_template(&mut self, template: Option<String>) -> AResult<String> {
		if self.controller.is_running() && self.config.mode == GenerationMode::Instruct {
			let resolved = self
				.controller
				.resolver()
				.resolve_selection(
					GenerationMode::Instruct,
					&self.config.character,
					template.as_deref(),
				)
				.with_context(|| {
					format!("{} cannot be used with that template", self.config.character)
				})?;
			self.controller.switch_character(resolved).await;
		}
		self.config.instruction_template = template;
		self.characters = self.controller.resolver().list(self.config.character_mode());
		Ok(match &self.config.instruction_template {
			Some(name) => format!("Instruction template set to {name}. {}", self.character_list()),
			None => format!("Instruction template cleared. {}", self.character_list()),
		})
	}

	async fn push_params(&self) {
		self.controller.update_params(self.config.params).await;
	}

	fn status(&self) -> String {
		let mut status = format!(
			"state: {}\nmode: {}\ncharacter: {}\nparams: {}\ntoken: {}",
			self.controller.state(),
			self.config.mode,
			self.config.character,
			self.config.params,
			if self.config.has_token() { "set" } else { "missing" },
		);
		if let Some(template) = &self.config.instruction_template {
			let _ = write!(status, "\ninstruction template: {template}");
		}
		if let Some(channel) = &self.config.starting_channel {
			let _ = write!(status, "\nstarting channel: #{channel}");
		}
		if !self.config.channel_whitelist.is_empty() {
			let _ = write!(
				status,
				"\nwhitelist: {}",
				join_channels(&self.config.channel_whitelist)
			);
		}
		if !self.config.channel_blacklist.is_empty() {
			let _ = write!(
				status,
				"\nblacklist: {}",
				join_channels(&self.config.channel_blacklist)
			);
		}
		status
	}

	fn character_list(&self) -> String {
		let store = self.config.character_mode();
		if self.characters.is_empty() {
			format!("No {store} characters found")
		} else {
			format!("{store} characters: {}", self.characters.join(", "))
		}
	}
}

fn join_channels(channels: &BTreeSet<String>) -> String {
	if channels.is_empty() {
		"(none)".to_owned()
	} else {
		channels
			.iter()
			.map(|name| format!("#{name}"))
			.collect::<Vec<_>>()
			.join(", ")
	}
}

#[cfg(test)]
mod tests {
	use std::fs;

	use serenity::async_trait;
	use tempfile::TempDir;

	use super::*;
	use crate::{
		character::CharacterResolver,
		config::types::SIMPLE_1,
		error::{ConnectionError, GenerationError},
		platform::{Connection, Connector},
		utils::ai::{GenerationRequest, TextGenerator},
	};

	struct Offline;

	#[async_trait]
	impl Connector for Offline {
		async fn connect(&self, _token: &str) -> Result<Connection, ConnectionError> {
			Err(ConnectionError::Closed)
		}
	}

	#[async_trait]
	impl TextGenerator for Offline {
		async fn generate(&self, _request: GenerationRequest) -> Result<String, GenerationError> {
			Err(GenerationError::Empty)
		}
	}

	fn operator(dir: &TempDir) -> Operator {
		let chat = dir.path().join("characters");
		let instruct = dir.path().join("instruction-templates");
		fs::create_dir_all(&chat).unwrap();
		fs::create_dir_all(&instruct).unwrap();
		fs::write(chat.join("Chiharu.yaml"), "name: Chiharu\ncontext: A gamer.\n").unwrap();
		fs::write(
			instruct.join("Alpaca.yaml"),
			"user: \"### Instruction:\"\nbot: \"### Response:\"\nturn_template: \"<|user|>\\n<|user-message|>\\n\\n<|bot|>\\n<|bot-message|>\\n\\n\"\ncontext: \"\"\n",
		)
		.unwrap();
		let section = BotSection {
			settings_path: dir.path().join("beeperbot.yaml"),
			token_path: dir.path().join("token.txt"),
			..BotSection::default()
		};
		let controller = Arc::new(SessionController::new(
			Arc::new(Offline),
			Arc::new(Offline),
			CharacterResolver::new(chat, instruct),
		));
		Operator::new(BotConfig::default(), &section, controller)
	}

	#[test]
	fn parses_commands() {
		assert_eq!("  toggle ".parse::<OperatorCommand>().unwrap(), OperatorCommand::Toggle);
		assert_eq!(
			"set top_k 40".parse::<OperatorCommand>().unwrap(),
			OperatorCommand::Set {
				name: "top_k".to_owned(),
				value: "40".to_owned()
			}
		);
		assert_eq!(
			"mode instruct".parse::<OperatorCommand>().unwrap(),
			OperatorCommand::Mode(GenerationMode::Instruct)
		);
		assert_eq!(
			"starting-channel none".parse::<OperatorCommand>().unwrap(),
			OperatorCommand::StartingChannel(None)
		);
		assert_eq!(
			"whitelist #general, memes".parse::<OperatorCommand>().unwrap(),
			OperatorCommand::Whitelist(parse_channel_list("general,memes"))
		);
		assert_eq!(
			"whitelist".parse::<OperatorCommand>().unwrap(),
			OperatorCommand::Whitelist(BTreeSet::new())
		);
		assert_eq!(
			"forget 42".parse::<OperatorCommand>().unwrap(),
			OperatorCommand::Forget(ChannelKey(42))
		);
	}

	#[test]
	fn rejects_bad_commands() {
		assert!(matches!(
			"dance".parse::<OperatorCommand>(),
			Err(CommandError::Unknown(word)) if word == "dance"
		));
		assert!(matches!(
			"set temperature".parse::<OperatorCommand>(),
			Err(CommandError::Usage(_))
		));
		assert!(matches!(
			"mode story".parse::<OperatorCommand>(),
			Err(CommandError::Config(_))
		));
		assert!(matches!(
			"forget general".parse::<OperatorCommand>(),
			Err(CommandError::InvalidChannelId(_))
		));
	}

	#[tokio::test]
	async fn sliders_update_and_reset() {
		let dir = TempDir::new().unwrap();
		let mut operator = operator(&dir);
		operator
			.apply("set temperature 1.2".parse().unwrap())
			.await
			.unwrap();
		assert!((operator.config().params.temperature - 1.2).abs() < f32::EPSILON);
		assert!(
			operator
				.apply("set temperature 9".parse().unwrap())
				.await
				.is_err()
		);
		operator.apply(OperatorCommand::ResetSliders).await.unwrap();
		assert_eq!(operator.config().params, SIMPLE_1);
	}

	#[tokio::test]
	async fn start_without_token_stays_stopped() {
		let dir = TempDir::new().unwrap();
		let mut operator = operator(&dir);
		let err = operator.apply(OperatorCommand::Start).await.unwrap_err();
		assert!(format!("{err:#}").contains("no Discord token"));
		assert_eq!(operator.controller.state(), SessionState::Stopped);
	}

	#[tokio::test]
	async fn character_selection_follows_mode() {
		let dir = TempDir::new().unwrap();
		let mut operator = operator(&dir);
		assert_eq!(operator.characters(), ["Chiharu"]);
		operator
			.apply(OperatorCommand::Character("Chiharu".to_owned()))
			.await
			.unwrap();
		assert_eq!(operator.config().character, "Chiharu");
		assert!(
			operator
				.apply(OperatorCommand::Character("Alpaca".to_owned()))
				.await
				.is_err()
		);
		operator
			.apply(OperatorCommand::Mode(GenerationMode::Instruct))
			.await
			.unwrap();
		assert_eq!(operator.characters(), ["Alpaca"]);
		operator
			.apply(OperatorCommand::Character("Alpaca".to_owned()))
			.await
			.unwrap();
		assert_eq!(operator.config().character, "Alpaca");
	}

	#[tokio::test]
	async fn template_pairs_chat_characters_in_instruct_mode() {
		let dir = TempDir::new().unwrap();
		let mut operator = operator(&dir);
		assert_eq!(
			"template Alpaca".parse::<OperatorCommand>().unwrap(),
			OperatorCommand::Template(Some("Alpaca".to_owned()))
		);
		operator
			.apply("template Alpaca".parse().unwrap())
			.await
			.unwrap();
		operator
			.apply(OperatorCommand::Mode(GenerationMode::Instruct))
			.await
			.unwrap();
		assert_eq!(operator.characters(), ["Chiharu"]);
		operator
			.apply(OperatorCommand::Character("Chiharu".to_owned()))
			.await
			.unwrap();
		assert!(
			operator
				.apply(OperatorCommand::Character("Alpaca".to_owned()))
				.await
				.is_err()
		);
		operator
			.apply("template none".parse().unwrap())
			.await
			.unwrap();
		assert_eq!(operator.config().instruction_template, None);
		assert_eq!(operator.characters(), ["Alpaca"]);
	}

	#[tokio::test]
	async fn save_writes_settings_without_token() {
		let dir = TempDir::new().unwrap();
		let mut operator = operator(&dir);
		operator
			.apply(OperatorCommand::Token("secret".to_owned()))
			.await
			.unwrap();
		operator
			.apply("blacklist spam".parse().unwrap())
			.await
			.unwrap();
		operator.apply(OperatorCommand::Save).await.unwrap();
		operator.apply(OperatorCommand::SaveToken).await.unwrap();
		let saved = BotConfig::load(&dir.path().join("beeperbot.yaml")).unwrap();
		assert_eq!(saved.channel_blacklist, parse_channel_list("spam"));
		assert!(saved.token.is_empty());
		assert_eq!(
			fs::read_to_string(dir.path().join("token.txt")).unwrap(),
			"secret"
		);
	}
}
