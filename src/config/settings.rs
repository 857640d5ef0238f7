use std::{
	fs,
	io::ErrorKind,
	path::{Path, PathBuf},
	time::Duration,
};

use serde::Deserialize;

use crate::{
	config::constants::{
		DEFAULT_BACKEND_URL, DEFAULT_CHARACTERS_DIR, DEFAULT_CONNECT_TIMEOUT_SECS,
		DEFAULT_FAREWELL, DEFAULT_HISTORY_LIMIT, DEFAULT_IGNORE_PREFIX, DEFAULT_INSTRUCT_DIR,
		DEFAULT_MAX_NEW_TOKENS, DEFAULT_SETTINGS_PATH, DEFAULT_TOKEN_PATH,
	},
	error::ConfigError,
};

/// Process configuration read from `config.toml`.
#[derive(Deserialize, Default, Clone, Debug)]
#[serde(default)]
pub struct AppConfig {
	pub bot: BotSection,
	pub backend: BackendSection,
}

#[derive(Deserialize, Clone, Debug)]
#[serde(default)]
pub struct BotSection {
	pub log_level: String,
	pub settings_path: PathBuf,
	pub token_path: PathBuf,
	pub characters_dir: PathBuf,
	pub instruct_dir: PathBuf,
	pub history_limit: usize,
	pub connect_timeout_secs: u64,
	pub ignore_prefix: String,
	/// Sent to every active channel on stop; empty disables it.
	pub farewell: String,
	pub sync_profile: bool,
	pub autostart: bool,
}

impl Default for BotSection {
	fn default() -> Self {
		Self {
			log_level: "info".to_owned(),
			settings_path: PathBuf::from(DEFAULT_SETTINGS_PATH),
			token_path: PathBuf::from(DEFAULT_TOKEN_PATH),
			characters_dir: PathBuf::from(DEFAULT_CHARACTERS_DIR),
			instruct_dir: PathBuf::from(DEFAULT_INSTRUCT_DIR),
			history_limit: DEFAULT_HISTORY_LIMIT,
			connect_timeout_secs: DEFAULT_CONNECT_TIMEOUT_SECS,
			ignore_prefix: DEFAULT_IGNORE_PREFIX.to_owned(),
			farewell: DEFAULT_FAREWELL.to_owned(),
			sync_profile: false,
			autostart: false,
		}
	}
}

impl BotSection {
	#[must_use]
	pub const fn connect_timeout(&self) -> Duration {
		Duration::from_secs(self.connect_timeout_secs)
	}
}

#[derive(Deserialize, Clone, Debug)]
#[serde(default)]
pub struct BackendSection {
	pub base_url: String,
	pub max_new_tokens: u32,
	pub timeout_secs: Option<u64>,
}

impl Default for BackendSection {
	fn default() -> Self {
		Self {
			base_url: DEFAULT_BACKEND_URL.to_owned(),
			max_new_tokens: DEFAULT_MAX_NEW_TOKENS,
			timeout_secs: None,
		}
	}
}

impl AppConfig {
	/// Reads the config file. `None` means it does not exist and defaults apply.
	pub fn load(path: &Path) -> Result<Option<Self>, ConfigError> {
		match fs::read_to_string(path) {
			Ok(raw) => toml::from_str(&raw).map(Some).map_err(|err| ConfigError::Parse {
				path: path.to_path_buf(),
				reason: err.to_string(),
			}),
			Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
			Err(source) => Err(ConfigError::Io {
				path: path.to_path_buf(),
				source,
			}),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn partial_file_keeps_defaults() {
		let config: AppConfig = toml::from_str(
			r#"
			[bot]
			history_limit = 8
			farewell = "bye"

			[backend]
			base_url = "http://127.0.0.1:5001"
			"#,
		)
		.unwrap();
		assert_eq!(config.bot.history_limit, 8);
		assert_eq!(config.bot.farewell, "bye");
		assert_eq!(config.bot.ignore_prefix, "//");
		assert_eq!(config.backend.base_url, "http://127.0.0.1:5001");
		assert_eq!(config.backend.max_new_tokens, DEFAULT_MAX_NEW_TOKENS);
		assert!(config.backend.timeout_secs.is_none());
	}

	#[test]
	fn missing_file_is_reported_as_absent() {
		let dir = tempfile::tempdir().unwrap();
		assert!(AppConfig::load(&dir.path().join("nope.toml")).unwrap().is_none());
		let config = AppConfig::default();
		assert_eq!(config.bot.settings_path, PathBuf::from(DEFAULT_SETTINGS_PATH));

		let path = dir.path().join("config.toml");
		fs::write(&path, "[bot]\nautostart = true\n").unwrap();
		let config = AppConfig::load(&path).unwrap().unwrap();
		assert!(config.bot.autostart);
		assert_eq!(config.bot.log_level, "info");
	}

	#[test]
	fn broken_file_reports_path() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("config.toml");
		fs::write(&path, "[bot\nlog_level = 3").unwrap();
		let err = AppConfig::load(&path).unwrap_err();
		assert!(matches!(err, ConfigError::Parse { .. }));
	}
}
