use std::collections::VecDeque;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Speaker {
	User,
	Bot,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConversationTurn {
	pub speaker: Speaker,
	pub message: String,
}

impl ConversationTurn {
	pub fn user(message: impl Into<String>) -> Self {
		Self {
			speaker: Speaker::User,
			message: message.into(),
		}
	}

	pub fn bot(message: impl Into<String>) -> Self {
		Self {
			speaker: Speaker::Bot,
			message: message.into(),
		}
	}
}

/// One channel's conversation, oldest turn first. Holds at most `limit` turns.
#[derive(Debug)]
pub struct History {
	turns: VecDeque<ConversationTurn>,
	limit: usize,
}

impl History {
	#[must_use]
	pub fn new(limit: usize) -> Self {
		Self {
			turns: VecDeque::new(),
			limit: limit.max(1),
		}
	}

	pub fn push(&mut self, turn: ConversationTurn) {
		while self.turns.len() >= self.limit {
			self.turns.pop_front();
		}
		self.turns.push_back(turn);
	}

	/// Drops the newest turn if it is an unanswered user message.
	pub fn rollback_user(&mut self) -> Option<ConversationTurn> {
		if self
			.turns
			.back()
			.is_some_and(|turn| turn.speaker == Speaker::User)
		{
			self.turns.pop_back()
		} else {
			None
		}
	}

	pub fn clear(&mut self) {
		self.turns.clear();
	}

	pub fn iter(&self) -> impl Iterator<Item = &ConversationTurn> {
		self.turns.iter()
	}

	#[must_use]
	pub fn len(&self) -> usize {
		self.turns.len()
	}

	#[must_use]
	pub fn is_empty(&self) -> bool {
		self.turns.is_empty()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn oldest_turns_fall_off() {
		let mut history = History::new(3);
		for n in 0..5 {
			history.push(ConversationTurn::user(format!("u{n}")));
		}
		let kept: Vec<_> = history.iter().map(|turn| turn.message.as_str()).collect();
		assert_eq!(kept, ["u2", "u3", "u4"]);
	}

	#[test]
	fn rollback_only_removes_pending_user_turn() {
		let mut history = History::new(8);
		history.push(ConversationTurn::user("a: hi"));
		history.push(ConversationTurn::bot("hello"));
		assert!(history.rollback_user().is_none());
		history.push(ConversationTurn::user("a: again"));
		assert_eq!(
			history.rollback_user(),
			Some(ConversationTurn::user("a: again"))
		);
		assert_eq!(history.len(), 2);
		history.clear();
		assert!(history.is_empty());
	}
}
