use std::{
	collections::BTreeSet,
	env,
	fmt::{self, Display, Formatter},
	fs,
	io::ErrorKind,
	path::Path,
	str::FromStr,
};

use serde::{Deserialize, Deserializer, Serialize};
use tracing::{debug, info};

use crate::{config::constants::DEFAULT_CHARACTER, error::ConfigError};

#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum GenerationMode {
	#[default]
	Chat,
	Instruct,
}

impl GenerationMode {
	#[must_use]
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Chat => "chat",
			Self::Instruct => "instruct",
		}
	}
}

impl Display for GenerationMode {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for GenerationMode {
	type Err = ConfigError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.trim().to_ascii_lowercase().as_str() {
			"chat" => Ok(Self::Chat),
			"instruct" => Ok(Self::Instruct),
			other => Err(ConfigError::UnknownMode(other.to_owned())),
		}
	}
}

pub struct Slider {
	pub name: &'static str,
	pub min: f64,
	pub max: f64,
	pub step: f64,
}

impl Slider {
	/// Range-checks `value` and snaps it to the slider's step.
	fn check(&self, value: f64) -> Result<f64, ConfigError> {
		if !(self.min..=self.max).contains(&value) {
			return Err(ConfigError::ParamOutOfRange {
				name: self.name,
				value,
				min: self.min,
				max: self.max,
			});
		}
		Ok(((value / self.step).round() * self.step).clamp(self.min, self.max))
	}
}

#[expect(clippy::as_conversions, clippy::cast_possible_truncation)]
fn narrow(value: f64) -> f32 {
	value as f32
}

pub const SLIDERS: [Slider; 4] = [
	Slider {
		name: "temperature",
		min: 0.01,
		max: 1.99,
		step: 0.01,
	},
	Slider {
		name: "top_p",
		min: 0.0,
		max: 1.0,
		step: 0.01,
	},
	Slider {
		name: "top_k",
		min: 0.0,
		max: 200.0,
		step: 1.0,
	},
	Slider {
		name: "repetition_penalty",
		min: 0.0,
		max: 4096.0,
		step: 0.01,
	},
];

/// Sampling parameters forwarded with every generation request.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
#[serde(default)]
pub struct Params {
	pub repetition_penalty: f32,
	pub temperature: f32,
	pub top_k: i32,
	pub top_p: f32,
}

/// The `simple-1` preset.
pub const SIMPLE_1: Params = Params {
	repetition_penalty: 1.15,
	temperature: 0.7,
	top_k: 20,
	top_p: 0.9,
};

impl Default for Params {
	fn default() -> Self {
		SIMPLE_1
	}
}

impl Params {
	/// Sets one slider from its textual value, rejecting anything outside the slider range.
	pub fn set(&mut self, name: &str, raw: &str) -> Result<(), ConfigError> {
		let slider = SLIDERS
			.iter()
			.find(|slider| slider.name == name)
			.ok_or_else(|| ConfigError::UnknownParam(name.to_owned()))?;
		let invalid = || ConfigError::InvalidParamValue {
			name: slider.name,
			raw: raw.to_owned(),
		};
		if slider.name == "top_k" {
			let value: i32 = raw.trim().parse().map_err(|_| invalid())?;
			slider.check(f64::from(value))?;
			self.top_k = value;
			return Ok(());
		}
		let value: f64 = raw.trim().parse().map_err(|_| invalid())?;
		if !value.is_finite() {
			return Err(invalid());
		}
		let value = narrow(slider.check(value)?);
		match slider.name {
			"temperature" => self.temperature = value,
			"top_p" => self.top_p = value,
			_ => self.repetition_penalty = value,
		}
		Ok(())
	}
}

impl Display for Params {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		write!(
			f,
			"temperature={} top_p={} top_k={} repetition_penalty={}",
			self.temperature, self.top_p, self.top_k, self.repetition_penalty
		)
	}
}

/// Operator-facing bot configuration, persisted as YAML on explicit save.
#[derive(Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct BotConfig {
	pub mode: GenerationMode,
	pub character: String,
	/// Instruction template that `character` speaks through in instruct mode.
	#[serde(deserialize_with = "optional_name")]
	pub instruction_template: Option<String>,
	#[serde(deserialize_with = "optional_channel")]
	pub starting_channel: Option<String>,
	#[serde(deserialize_with = "channel_set")]
	pub channel_whitelist: BTreeSet<String>,
	#[serde(deserialize_with = "channel_set")]
	pub channel_blacklist: BTreeSet<String>,
	pub params: Params,
	#[serde(skip)]
	pub token: String,
}

impl Default for BotConfig {
	fn default() -> Self {
		Self {
			mode: GenerationMode::default(),
			character: DEFAULT_CHARACTER.to_owned(),
			instruction_template: None,
			starting_channel: None,
			channel_whitelist: BTreeSet::new(),
			channel_blacklist: BTreeSet::new(),
			params: Params::default(),
			token: String::new(),
		}
	}
}

impl fmt::Debug for BotConfig {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		f.debug_struct("BotConfig")
			.field("mode", &self.mode)
			.field("character", &self.character)
			.field("instruction_template", &self.instruction_template)
			.field("starting_channel", &self.starting_channel)
			.field("channel_whitelist", &self.channel_whitelist)
			.field("channel_blacklist", &self.channel_blacklist)
			.field("params", &self.params)
			.field("token", &"<redacted>")
			.finish()
	}
}

impl BotConfig {
	/// Loads persisted settings; a missing file yields defaults.
	pub fn load(path: &Path) -> Result<Self, ConfigError> {
		match fs::read_to_string(path) {
			Ok(raw) if raw.trim().is_empty() => Ok(Self::default()),
			Ok(raw) => serde_yaml::from_str(&raw).map_err(|err| ConfigError::Parse {
				path: path.to_path_buf(),
				reason: err.to_string(),
			}),
			Err(err) if err.kind() == ErrorKind::NotFound => {
				debug!("{} not found, starting from defaults", path.display());
				Ok(Self::default())
			}
			Err(source) => Err(ConfigError::Io {
				path: path.to_path_buf(),
				source,
			}),
		}
	}

	pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
		let yaml = serde_yaml::to_string(self).map_err(|err| ConfigError::Parse {
			path: path.to_path_buf(),
			reason: err.to_string(),
		})?;
		fs::write(path, yaml).map_err(|source| ConfigError::Io {
			path: path.to_path_buf(),
			source,
		})?;
		info!("Settings saved to {}", path.display());
		Ok(())
	}

	/// Reads the token file, letting `DISCORD_TOKEN` take precedence.
	pub fn load_token(&mut self, path: &Path) -> Result<(), ConfigError> {
		if let Ok(token) = env::var("DISCORD_TOKEN")
			&& !token.trim().is_empty()
		{
			self.token = token.trim().to_owned();
			return Ok(());
		}
		match fs::read_to_string(path) {
			Ok(token) => {
				self.token = token.trim().to_owned();
				Ok(())
			}
			Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
			Err(source) => Err(ConfigError::Io {
				path: path.to_path_buf(),
				source,
			}),
		}
	}

	pub fn save_token(&self, path: &Path) -> Result<(), ConfigError> {
		fs::write(path, &self.token).map_err(|source| ConfigError::Io {
			path: path.to_path_buf(),
			source,
		})
	}

	#[must_use]
	pub fn has_token(&self) -> bool {
		!self.token.trim().is_empty()
	}

	/// Store that `character` is looked up in. An instruct session with an instruction
	/// template pairs a chat persona with it.
	#[must_use]
	pub const fn character_mode(&self) -> GenerationMode {
		if matches!(self.mode, GenerationMode::Instruct) && self.instruction_template.is_none() {
			GenerationMode::Instruct
		} else {
			GenerationMode::Chat
		}
	}
}

/// Splits a comma separated list of channel names, dropping blanks.
#[must_use]
pub fn parse_channel_list(raw: &str) -> BTreeSet<String> {
	raw.split(',')
		.map(|name| name.trim().trim_start_matches('#'))
		.filter(|name| !name.is_empty())
		.map(str::to_owned)
		.collect()
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ChannelList {
	Joined(String),
	Names(Vec<String>),
}

// Older settings files store channel lists as one comma separated string.
fn channel_set<'de, D>(deserializer: D) -> Result<BTreeSet<String>, D::Error>
where
	D: Deserializer<'de>,
{
	Ok(
		match Option::<ChannelList>::deserialize(deserializer)? {
			None => BTreeSet::new(),
			Some(ChannelList::Joined(raw)) => parse_channel_list(&raw),
			Some(ChannelList::Names(names)) => parse_channel_list(&names.join(",")),
		},
	)
}

fn optional_channel<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
	D: Deserializer<'de>,
{
	Ok(optional_name(deserializer)?
		.map(|name| name.trim_start_matches('#').to_owned())
		.filter(|name| !name.is_empty()))
}

fn optional_name<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
	D: Deserializer<'de>,
{
	Ok(Option::<String>::deserialize(deserializer)?
		.map(|name| name.trim().to_owned())
		.filter(|name| !name.is_empty()))
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn reset_restores_simple_1() {
		let mut params = Params::default();
		params.set("temperature", "1.5").unwrap();
		params.set("top_k", "150").unwrap();
		params.set("repetition_penalty", "3000").unwrap();
		assert_ne!(params, SIMPLE_1);

		params = Params::default();
		assert_eq!(params.temperature, 0.7);
		assert_eq!(params.top_p, 0.9);
		assert_eq!(params.top_k, 20);
		assert_eq!(params.repetition_penalty, 1.15);
	}

	#[test]
	fn sliders_reject_bad_values() {
		let mut params = Params::default();
		assert!(matches!(
			params.set("temperature", "2.5"),
			Err(ConfigError::ParamOutOfRange { name: "temperature", .. })
		));
		assert!(matches!(
			params.set("top_k", "0.5"),
			Err(ConfigError::InvalidParamValue { name: "top_k", .. })
		));
		assert!(matches!(
			params.set("top_p", "NaN"),
			Err(ConfigError::InvalidParamValue { .. })
		));
		assert!(matches!(
			params.set("min_p", "0.1"),
			Err(ConfigError::UnknownParam(_))
		));
		assert_eq!(params, SIMPLE_1);
	}

	#[test]
	fn slider_endpoints_are_accepted() {
		let mut params = Params::default();
		for slider in &SLIDERS {
			params.set(slider.name, &slider.min.to_string()).unwrap();
			params.set(slider.name, &slider.max.to_string()).unwrap();
		}
		assert_eq!(params.temperature, 1.99);
		assert_eq!(params.top_p, 1.0);
		assert_eq!(params.top_k, 200);
		assert_eq!(params.repetition_penalty, 4096.0);

		params.set("temperature", "0.01").unwrap();
		assert_eq!(params.temperature, 0.01);
		assert!(matches!(
			params.set("temperature", "0.0099"),
			Err(ConfigError::ParamOutOfRange { name: "temperature", .. })
		));
	}

	#[test]
	fn values_snap_to_slider_step() {
		let mut params = Params::default();
		params.set("temperature", "0.123").unwrap();
		assert_eq!(params.temperature, 0.12);
		params.set("top_p", "0.456").unwrap();
		assert_eq!(params.top_p, 0.46);
	}

	#[test]
	fn legacy_settings_file_loads() {
		let config: BotConfig = serde_yaml::from_str(
			"mode: instruct\n\
			 character: Alpaca\n\
			 character_path: ''\n\
			 instruction_template: ''\n\
			 starting_channel: ''\n\
			 channel_whitelist: 'general, #bots,'\n\
			 channel_blacklist: ''\n\
			 params:\n  temperature: 0.5\n  top_k: 40\n",
		)
		.unwrap();
		assert_eq!(config.mode, GenerationMode::Instruct);
		assert_eq!(config.character, "Alpaca");
		assert_eq!(config.instruction_template, None);
		assert_eq!(config.character_mode(), GenerationMode::Instruct);
		assert_eq!(config.starting_channel, None);
		assert_eq!(
			config.channel_whitelist.iter().collect::<Vec<_>>(),
			["bots", "general"]
		);
		assert!(config.channel_blacklist.is_empty());
		assert_eq!(config.params.temperature, 0.5);
		assert_eq!(config.params.top_k, 40);
		assert_eq!(config.params.top_p, SIMPLE_1.top_p);
	}

	#[test]
	fn legacy_instruct_settings_pair_persona_with_template() {
		let config: BotConfig = serde_yaml::from_str(
			"mode: instruct\n\
			 character: Chiharu\n\
			 character_path: characters/Chiharu.yaml\n\
			 instruction_template: ' Alpaca '\n",
		)
		.unwrap();
		assert_eq!(config.character, "Chiharu");
		assert_eq!(config.instruction_template.as_deref(), Some("Alpaca"));
		assert_eq!(config.character_mode(), GenerationMode::Chat);
		assert_eq!(
			BotConfig {
				mode: GenerationMode::Chat,
				..config
			}
			.character_mode(),
			GenerationMode::Chat
		);
	}

	#[test]
	fn save_then_load_keeps_settings_but_not_token() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("beeperbot.yaml");
		let mut config = BotConfig {
			mode: GenerationMode::Instruct,
			character: "Vicuna".to_owned(),
			instruction_template: Some("Alpaca".to_owned()),
			starting_channel: Some("general".to_owned()),
			channel_blacklist: parse_channel_list("spam,memes"),
			token: "secret".to_owned(),
			..BotConfig::default()
		};
		config.params.set("top_p", "0.5").unwrap();
		config.save(&path).unwrap();

		let written = fs::read_to_string(&path).unwrap();
		assert!(!written.contains("secret"));

		let loaded = BotConfig::load(&path).unwrap();
		assert_eq!(loaded.token, "");
		assert_eq!(
			loaded,
			BotConfig {
				token: String::new(),
				..config
			}
		);
	}

	#[test]
	fn debug_redacts_token() {
		let config = BotConfig {
			token: "very-secret".to_owned(),
			..BotConfig::default()
		};
		assert!(!format!("{config:?}").contains("very-secret"));
	}

	#[test]
	fn mode_parses_case_insensitively() {
		assert_eq!("Instruct".parse::<GenerationMode>().unwrap(), GenerationMode::Instruct);
		assert!("notebook".parse::<GenerationMode>().is_err());
	}
}
