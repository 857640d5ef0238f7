mod controller;
mod filter;
pub mod history;
mod listener;
mod worker;

use std::{
	collections::BTreeSet,
	fmt::{self, Display, Formatter},
	sync::Arc,
};

pub use controller::SessionController;
pub use filter::ChannelFilter;

use crate::{
	character::CharacterTemplate,
	config::{
		settings::BotSection,
		types::{BotConfig, GenerationMode, Params},
	},
	platform::ChannelKey,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
	Stopped,
	Starting,
	Running,
	Stopping,
}

impl Display for SessionState {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		f.write_str(match self {
			Self::Stopped => "stopped",
			Self::Starting => "starting",
			Self::Running => "running",
			Self::Stopping => "stopping",
		})
	}
}

/// Session behaviour taken from the process config rather than the operator settings.
#[derive(Clone, Debug)]
pub struct SessionOptions {
	pub history_limit: usize,
	pub ignore_prefix: String,
	pub farewell: String,
	pub sync_profile: bool,
}

impl From<&BotSection> for SessionOptions {
	fn from(section: &BotSection) -> Self {
		Self {
			history_limit: section.history_limit,
			ignore_prefix: section.ignore_prefix.clone(),
			farewell: section.farewell.clone(),
			sync_profile: section.sync_profile,
		}
	}
}

impl Default for SessionOptions {
	fn default() -> Self {
		Self::from(&BotSection::default())
	}
}

/// Everything a session needs, copied out of the operator's config at start.
#[derive(Clone)]
pub struct SessionSnapshot {
	pub token: String,
	pub mode: GenerationMode,
	pub character: String,
	pub instruction_template: Option<String>,
	pub params: Params,
	pub starting_channel: Option<String>,
	pub whitelist: BTreeSet<String>,
	pub blacklist: BTreeSet<String>,
	pub options: SessionOptions,
}

impl SessionSnapshot {
	#[must_use]
	pub fn new(config: &BotConfig, options: SessionOptions) -> Self {
		Self {
			token: config.token.clone(),
			mode: config.mode,
			character: config.character.clone(),
			instruction_template: config.instruction_template.clone(),
			params: config.params,
			starting_channel: config.starting_channel.clone(),
			whitelist: config.channel_whitelist.clone(),
			blacklist: config.channel_blacklist.clone(),
			options,
		}
	}
}

impl fmt::Debug for SessionSnapshot {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		f.debug_struct("SessionSnapshot")
			.field("token", &"<redacted>")
			.field("mode", &self.mode)
			.field("character", &self.character)
			.field("instruction_template", &self.instruction_template)
			.field("params", &self.params)
			.field("starting_channel", &self.starting_channel)
			.field("whitelist", &self.whitelist)
			.field("blacklist", &self.blacklist)
			.field("options", &self.options)
			.finish()
	}
}

/// Live updates sent to a running session.
#[derive(Debug)]
enum SessionCommand {
	UpdateParams(Params),
	SwitchCharacter {
		template: Arc<CharacterTemplate>,
		avatar: Option<Vec<u8>>,
	},
	ResetChannel(ChannelKey),
}
