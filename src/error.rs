use std::{io, path::PathBuf, time::Duration};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
	#[error("no Discord token configured")]
	MissingToken,
	#[error("unknown sampling parameter `{0}`")]
	UnknownParam(String),
	#[error("`{name}` must be within {min}..={max}, got {value}")]
	ParamOutOfRange {
		name: &'static str,
		value: f64,
		min: f64,
		max: f64,
	},
	#[error("`{raw}` is not a valid value for `{name}`")]
	InvalidParamValue { name: &'static str, raw: String },
	#[error("unknown generation mode `{0}`, expected `chat` or `instruct`")]
	UnknownMode(String),
	#[error("failed to access {path}")]
	Io {
		path: PathBuf,
		#[source]
		source: io::Error,
	},
	#[error("failed to parse {path}: {reason}")]
	Parse { path: PathBuf, reason: String },
}

#[derive(Debug, Error)]
pub enum TemplateError {
	#[error("no {mode} character named `{name}`")]
	NotFound { mode: &'static str, name: String },
	#[error("instruct character `{name}` is missing `{field}`")]
	Malformed { name: String, field: &'static str },
	#[error("failed to parse character file {path}: {reason}")]
	Parse { path: PathBuf, reason: String },
	#[error("failed to read character file {path}")]
	Io {
		path: PathBuf,
		#[source]
		source: io::Error,
	},
}

#[derive(Debug, Error)]
pub enum ConnectionError {
	#[error(transparent)]
	Discord(#[from] serenity::Error),
	#[error("gateway did not become ready within {0:?}")]
	Timeout(Duration),
	#[error("connection closed before it was ready")]
	Closed,
}

#[derive(Debug, Error)]
pub enum GenerationError {
	#[error("request to generation backend failed")]
	Http(#[from] reqwest::Error),
	#[error("generation backend answered with status {0}")]
	Status(u16),
	#[error("generation backend returned no results")]
	Empty,
}

#[derive(Debug, Error)]
pub enum StartError {
	#[error("bot is already running")]
	AlreadyRunning,
	#[error(transparent)]
	Config(#[from] ConfigError),
	#[error(transparent)]
	Template(#[from] TemplateError),
	#[error(transparent)]
	Connection(#[from] ConnectionError),
}

#[derive(Debug, Error)]
pub enum CommandError {
	#[error("unknown command `{0}`, type `help` for a list")]
	Unknown(String),
	#[error("usage: {0}")]
	Usage(&'static str),
	#[error("`{0}` is not a channel id")]
	InvalidChannelId(String),
	#[error(transparent)]
	Config(#[from] ConfigError),
}
