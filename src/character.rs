mod resolver;

pub use resolver::CharacterResolver;

use crate::config::types::GenerationMode;

/// Persona from the chat character store.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChatPersona {
	pub name: String,
	pub context: String,
	pub greeting: Option<String>,
}

/// Instruction-following template. `context` already has `USER`/`BOT` substituted,
/// `turn_template` is kept verbatim for per-turn interpolation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InstructTemplate {
	pub name: String,
	pub user_string: String,
	pub bot_string: String,
	pub turn_template: String,
	pub context: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CharacterTemplate {
	Chat(ChatPersona),
	Instruct(InstructTemplate),
}

impl CharacterTemplate {
	#[must_use]
	pub fn name(&self) -> &str {
		match self {
			Self::Chat(persona) => &persona.name,
			Self::Instruct(template) => &template.name,
		}
	}

	#[must_use]
	pub const fn mode(&self) -> GenerationMode {
		match self {
			Self::Chat(_) => GenerationMode::Chat,
			Self::Instruct(_) => GenerationMode::Instruct,
		}
	}

	#[must_use]
	pub fn greeting(&self) -> Option<&str> {
		match self {
			Self::Chat(persona) => persona.greeting.as_deref(),
			Self::Instruct(_) => None,
		}
	}
}
