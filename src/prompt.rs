//! Prompt assembly from a resolved character and a channel's conversation history.
//!
//! A turn template such as `"<|user|><|user-message|>\n\n<|bot|><|bot-message|>\n\n"`
//! is split where the bot side begins. User turns render the first half, bot turns
//! the second, and the prompt ends with the bot half cut right before
//! `<|bot-message|>` so the backend continues in the bot's voice.

use crate::{
	character::{CharacterTemplate, ChatPersona, InstructTemplate},
	session::history::{ConversationTurn, Speaker},
};

pub const USER_TOKEN: &str = "<|user|>";
pub const USER_MESSAGE_TOKEN: &str = "<|user-message|>";
pub const BOT_TOKEN: &str = "<|bot|>";
pub const BOT_MESSAGE_TOKEN: &str = "<|bot-message|>";

pub const CHAT_TURN_TEMPLATE: &str = "<|user-message|>\n<|bot|>: <|bot-message|>\n";
const CHAT_STOPPING_STRING: &str = "\nYou:";

/// Replaces every occurrence of each token in a single left-to-right pass.
/// Text produced by a replacement is never scanned again.
#[must_use]
pub fn fill_placeholders(template: &str, replacements: &[(&str, &str)]) -> String {
	let mut filled = String::with_capacity(template.len());
	let mut rest = template;
	'scan: while !rest.is_empty() {
		for (token, value) in replacements {
			if !token.is_empty()
				&& let Some(tail) = rest.strip_prefix(token)
			{
				filled.push_str(value);
				rest = tail;
				continue 'scan;
			}
		}
		let mut chars = rest.chars();
		if let Some(ch) = chars.next() {
			filled.push(ch);
		}
		rest = chars.as_str();
	}
	filled
}

/// Everything needed to turn a history into backend input for one character.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PromptFormat {
	context: String,
	user_string: String,
	bot_string: String,
	user_part: String,
	bot_part: String,
	stopping_strings: Vec<String>,
	strip_prefix: Option<String>,
}

impl PromptFormat {
	#[must_use]
	pub fn new(template: &CharacterTemplate) -> Self {
		match template {
			CharacterTemplate::Chat(persona) => Self::chat(persona),
			CharacterTemplate::Instruct(template) => Self::instruct(template),
		}
	}

	fn chat(persona: &ChatPersona) -> Self {
		let mut context = persona.context.clone();
		if !context.is_empty() && !context.ends_with('\n') {
			context.push('\n');
		}
		let (user_part, bot_part) = split_turn(CHAT_TURN_TEMPLATE);
		Self {
			context,
			user_string: String::new(),
			bot_string: persona.name.clone(),
			user_part,
			bot_part,
			stopping_strings: vec![CHAT_STOPPING_STRING.to_owned()],
			strip_prefix: Some(format!("{}:", persona.name)),
		}
	}

	fn instruct(template: &InstructTemplate) -> Self {
		let (user_part, bot_part) = split_turn(&template.turn_template);
		let user_marker = template.user_string.trim();
		Self {
			context: template.context.clone(),
			user_string: template.user_string.clone(),
			bot_string: template.bot_string.clone(),
			user_part,
			bot_part,
			stopping_strings: if user_marker.is_empty() {
				Vec::new()
			} else {
				vec![user_marker.to_owned()]
			},
			strip_prefix: None,
		}
	}

	#[must_use]
	pub fn stopping_strings(&self) -> &[String] {
		&self.stopping_strings
	}

	fn render(&self, part: &str, user_message: &str, bot_message: &str) -> String {
		fill_placeholders(
			part,
			&[
				(USER_TOKEN, self.user_string.as_str()),
				(USER_MESSAGE_TOKEN, user_message),
				(BOT_TOKEN, self.bot_string.as_str()),
				(BOT_MESSAGE_TOKEN, bot_message),
			],
		)
	}

	/// Context, then every turn of `history`, then the cue for the next bot message.
	pub fn build<'a>(&self, history: impl IntoIterator<Item = &'a ConversationTurn>) -> String {
		let mut prompt = self.context.clone();
		for turn in history {
			let rendered = match turn.speaker {
				Speaker::User => self.render(&self.user_part, &turn.message, ""),
				Speaker::Bot => self.render(&self.bot_part, "", &turn.message),
			};
			prompt.push_str(&rendered);
		}
		let cue = self
			.bot_part
			.find(BOT_MESSAGE_TOKEN)
			.map_or(self.bot_part.as_str(), |end| {
				self.bot_part.get(..end).unwrap_or_default()
			});
		prompt.push_str(&self.render(cue, "", ""));
		prompt
	}

	/// Trims a raw completion and cuts it where the model starts a new user turn.
	#[must_use]
	pub fn clean_reply(&self, raw: &str) -> String {
		let mut reply = raw;
		for stop in &self.stopping_strings {
			if let Some(end) = reply.find(stop.as_str()) {
				reply = reply.get(..end).unwrap_or(reply);
			}
		}
		let mut reply = reply.trim();
		if let Some(prefix) = &self.strip_prefix
			&& let Some(rest) = reply.strip_prefix(prefix.as_str())
		{
			reply = rest.trim_start();
		}
		reply.to_owned()
	}
}

fn split_turn(turn_template: &str) -> (String, String) {
	let split = [BOT_TOKEN, BOT_MESSAGE_TOKEN]
		.iter()
		.filter_map(|token| turn_template.find(token))
		.min()
		.unwrap_or(turn_template.len());
	let (user_part, bot_part) = turn_template.split_at(split);
	(user_part.to_owned(), bot_part.to_owned())
}
