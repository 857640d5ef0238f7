use std::{
	collections::BTreeSet,
	fs,
	path::{Path, PathBuf},
};

use serde::Deserialize;
use tracing::debug;

use crate::{
	character::{CharacterTemplate, ChatPersona, InstructTemplate},
	config::{constants::AVATAR_EXTENSIONS, types::GenerationMode},
	error::TemplateError,
	prompt::{BOT_MESSAGE_TOKEN, fill_placeholders},
};

const CHAT_EXTENSIONS: [&str; 3] = ["yaml", "yml", "json"];
const INSTRUCT_EXTENSIONS: [&str; 2] = ["yaml", "yml"];

#[derive(Deserialize, Default)]
#[serde(default)]
struct ChatFile {
	#[serde(alias = "char_name")]
	name: Option<String>,
	#[serde(alias = "char_persona")]
	context: Option<String>,
	#[serde(alias = "char_greeting")]
	greeting: Option<String>,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct InstructFile {
	name: Option<String>,
	#[serde(alias = "user")]
	user_string: Option<String>,
	#[serde(alias = "bot")]
	bot_string: Option<String>,
	turn_template: Option<String>,
	context: Option<String>,
}

/// Finds and parses character definitions. Every call reads from disk, so files
/// added after startup are picked up by the next `list` or `resolve`.
#[derive(Clone, Debug)]
pub struct CharacterResolver {
	chat_dir: PathBuf,
	instruct_dir: PathBuf,
}

impl CharacterResolver {
	pub fn new(chat_dir: impl Into<PathBuf>, instruct_dir: impl Into<PathBuf>) -> Self {
		Self {
			chat_dir: chat_dir.into(),
			instruct_dir: instruct_dir.into(),
		}
	}

	pub fn resolve(
		&self,
		mode: GenerationMode,
		name: &str,
	) -> Result<CharacterTemplate, TemplateError> {
		match mode {
			GenerationMode::Chat => self.chat(name).map(CharacterTemplate::Chat),
			GenerationMode::Instruct => self.instruct(name).map(CharacterTemplate::Instruct),
		}
	}

	/// Resolves a mode and character, pairing the chat persona `character` with
	/// `instruction_template` when one is given in instruct mode.
	pub fn resolve_selection(
		&self,
		mode: GenerationMode,
		character: &str,
		instruction_template: Option<&str>,
	) -> Result<CharacterTemplate, TemplateError> {
		match (mode, instruction_template) {
			(GenerationMode::Instruct, Some(template)) => self
				.paired(template, character)
				.map(CharacterTemplate::Instruct),
			_ => self.resolve(mode, character),
		}
	}

	fn chat(&self, name: &str) -> Result<ChatPersona, TemplateError> {
		let path = locate(&self.chat_dir, &CHAT_EXTENSIONS, name)
			.ok_or_else(|| not_found(GenerationMode::Chat, name))?;
		load_chat(&path, name)
	}

	fn instruct(&self, name: &str) -> Result<InstructTemplate, TemplateError> {
		let path = locate(&self.instruct_dir, &INSTRUCT_EXTENSIONS, name)
			.ok_or_else(|| not_found(GenerationMode::Instruct, name))?;
		load_instruct(&path, name)
	}

	/// The persona supplies name and context, the template supplies the turn layout.
	/// Bot turns are labelled with the persona's name.
	fn paired(&self, template: &str, persona: &str) -> Result<InstructTemplate, TemplateError> {
		let persona = self.chat(persona)?;
		let template = self.instruct(template)?;
		let mut context = persona.context;
		if !context.is_empty() && !context.ends_with('\n') {
			context.push('\n');
		}
		Ok(InstructTemplate {
			turn_template: template.turn_template.replace(
				BOT_MESSAGE_TOKEN,
				&format!("{}: {BOT_MESSAGE_TOKEN}", persona.name),
			),
			name: persona.name,
			user_string: template.user_string,
			bot_string: template.bot_string,
			context,
		})
	}

	/// Names of every character available for `mode`, sorted.
	#[must_use]
	pub fn list(&self, mode: GenerationMode) -> Vec<String> {
		let (dir, extensions): (&Path, &[&str]) = match mode {
			GenerationMode::Chat => (&self.chat_dir, &CHAT_EXTENSIONS),
			GenerationMode::Instruct => (&self.instruct_dir, &INSTRUCT_EXTENSIONS),
		};
		let entries = match fs::read_dir(dir) {
			Ok(entries) => entries,
			Err(err) => {
				debug!("Cannot list {}: {err}", dir.display());
				return Vec::new();
			}
		};
		entries
			.filter_map(Result::ok)
			.map(|entry| entry.path())
			.filter(|path| path.is_file() && has_extension(path, extensions))
			.filter_map(|path| path.file_stem()?.to_str().map(str::to_owned))
			.collect::<BTreeSet<_>>()
			.into_iter()
			.collect()
	}

	/// Picture stored next to a chat character under the same name.
	#[must_use]
	pub fn avatar(&self, name: &str) -> Option<Vec<u8>> {
		let path = locate(&self.chat_dir, &AVATAR_EXTENSIONS, name)?;
		fs::read(path).ok()
	}
}

fn not_found(mode: GenerationMode, name: &str) -> TemplateError {
	TemplateError::NotFound {
		mode: mode.as_str(),
		name: name.to_owned(),
	}
}

fn has_extension(path: &Path, extensions: &[&str]) -> bool {
	path.extension()
		.and_then(|ext| ext.to_str())
		.is_some_and(|ext| {
			extensions
				.iter()
				.any(|wanted| ext.eq_ignore_ascii_case(wanted))
		})
}

fn locate(dir: &Path, extensions: &[&str], name: &str) -> Option<PathBuf> {
	if name.is_empty() || name.contains(['/', '\\']) || name.starts_with('.') {
		return None;
	}
	let candidates = fs::read_dir(dir)
		.ok()?
		.filter_map(Result::ok)
		.map(|entry| entry.path())
		.filter(|path| path.is_file() && path.file_stem().is_some_and(|stem| stem == name))
		.collect::<Vec<_>>();
	extensions.iter().find_map(|ext| {
		candidates
			.iter()
			.find(|path| has_extension(path, &[*ext]))
			.cloned()
	})
}

fn read(path: &Path) -> Result<String, TemplateError> {
	fs::read_to_string(path).map_err(|source| TemplateError::Io {
		path: path.to_path_buf(),
		source,
	})
}

fn parse<T>(path: &Path, raw: &str) -> Result<T, TemplateError>
where
	T: for<'de> Deserialize<'de> + Default,
{
	if raw.trim().is_empty() {
		return Ok(T::default());
	}
	let parsed = if has_extension(path, &["json"]) {
		serde_json::from_str(raw).map_err(|err| err.to_string())
	} else {
		serde_yaml::from_str(raw).map_err(|err| err.to_string())
	};
	parsed.map_err(|reason| TemplateError::Parse {
		path: path.to_path_buf(),
		reason,
	})
}

fn load_chat(path: &Path, file_name: &str) -> Result<ChatPersona, TemplateError> {
	let file: ChatFile = parse(path, &read(path)?)?;
	let name = file
		.name
		.filter(|name| !name.trim().is_empty())
		.unwrap_or_else(|| file_name.to_owned());
	let personalize = |text: &str| {
		fill_placeholders(text, &[("{{char}}", name.as_str()), ("{{user}}", "You")])
	};
	Ok(ChatPersona {
		context: personalize(file.context.as_deref().unwrap_or_default()),
		greeting: file
			.greeting
			.as_deref()
			.map(personalize)
			.filter(|greeting| !greeting.trim().is_empty()),
		name,
	})
}

fn load_instruct(path: &Path, file_name: &str) -> Result<InstructTemplate, TemplateError> {
	let file: InstructFile = parse(path, &read(path)?)?;
	let missing = |field| TemplateError::Malformed {
		name: file_name.to_owned(),
		field,
	};
	let user_string = file.user_string.ok_or_else(|| missing("user_string"))?;
	let bot_string = file.bot_string.ok_or_else(|| missing("bot_string"))?;
	let turn_template = file.turn_template.ok_or_else(|| missing("turn_template"))?;
	let context = fill_placeholders(
		file.context.as_deref().unwrap_or_default(),
		&[("USER", user_string.as_str()), ("BOT", bot_string.as_str())],
	);
	Ok(InstructTemplate {
		name: file
			.name
			.filter(|name| !name.trim().is_empty())
			.unwrap_or_else(|| file_name.to_owned()),
		user_string,
		bot_string,
		turn_template,
		context,
	})
}
