//! Conversation history owned by one agent instance
//!
//! Every look-back is bounds-checked and returns `Option`.

use parley_llm::{Message, MessageRole};
use serde::{Deserialize, Serialize};

/// Ordered conversation turns
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConversationHistory {
    turns: Vec<Message>,
}

impl ConversationHistory {
    /// Create an empty history
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a turn
    pub fn push(&mut self, message: Message) {
        self.turns.push(message);
    }

    /// Append several turns in order
    pub fn extend(&mut self, messages: impl IntoIterator<Item = Message>) {
        self.turns.extend(messages);
    }

    /// Replace every turn
    pub fn replace(&mut self, messages: Vec<Message>) {
        self.turns = messages;
    }

    /// Latest turn
    #[must_use]
    pub fn last(&self) -> Option<&Message> {
        self.turns.last()
    }

    /// Turn `n` places back from the end; `nth_back(0)` is the latest
    #[must_use]
    pub fn nth_back(&self, n: usize) -> Option<&Message> {
        self.turns.len().checked_sub(n + 1).map(|i| &self.turns[i])
    }

    /// Source of the latest turn that has one
    #[must_use]
    pub fn last_speaker(&self) -> Option<&str> {
        self.turns.iter().rev().find_map(Message::source)
    }

    /// Latest non-empty assistant turn
    #[must_use]
    pub fn last_answer(&self) -> Option<&Message> {
        self.turns
            .iter()
            .rev()
            .find(|m| m.role == MessageRole::Assistant && !m.content.is_empty())
    }

    /// All turns, oldest first
    #[must_use]
    pub fn turns(&self) -> &[Message] {
        &self.turns
    }

    /// Number of turns
    #[must_use]
    pub fn len(&self) -> usize {
        self.turns.len()
    }

    /// Whether there are no turns
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Copy of the turns, for publishing
    #[must_use]
    pub fn to_vec(&self) -> Vec<Message> {
        self.turns.clone()
    }
}

impl From<Vec<Message>> for ConversationHistory {
    fn from(turns: Vec<Message>) -> Self {
        Self { turns }
    }
}
