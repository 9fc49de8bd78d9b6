//! Group chat - a manager hands the floor to one participant at a time
//!
//! ```text
//!                 ┌──────── RequestToSpeak ───────┐
//!                 │                               ▼
//!   task ──► GroupChatManager             participant topic
//!                 ▲                               │
//!                 └──── Chat (group topic) ◄──────┘
//! ```
//!
//! Every participant subscribes to its own topic and to the group topic, so
//! each one keeps a private copy of the shared conversation. The manager
//! checks the termination condition before every selection, asks the
//! override [`SpeakerSelector`] first and the [`SpeakerChooser`] otherwise,
//! and records a [`ChatResult`] when the chat ends.

mod builder;
mod chooser;
mod manager;
mod participant;
mod selector;


pub use builder::{GroupChat, GroupChatHandle};
pub use chooser::{round_robin, ReasonerChooser, RoundRobinChooser, SelectionContext, SpeakerChooser};
pub use manager::GroupChatManager;
pub use participant::{ChatParticipant, UserProxyParticipant};
pub use selector::{FnSelector, HandoffSelector, PlannerSelector, SpeakerSelector};

#[cfg(test)]
pub use chooser::MockSpeakerChooser;

use crate::termination::StopReason;
use chrono::{DateTime, Utc};
use parley_llm::Message;
use serde::{Deserialize, Serialize};

/// Source of the task turn that opens a group chat
pub const TASK_SOURCE: &str = "user";

/// One member of a team
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    /// Name; also the participant's agent type and topic type
    pub name: String,
    /// What the participant does, shown to the reasoner-backed chooser
    #[serde(default)]
    pub description: String,
}

impl Participant {
    /// Create a participant
    #[must_use]
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
        }
    }
}

/// Outcome of one finished group chat session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatResult {
    /// Shared history, task first
    pub messages: Vec<Message>,
    /// Why the chat stopped
    pub stop_reason: StopReason,
    /// When the manager stopped the chat
    pub finished_at: DateTime<Utc>,
}

impl ChatResult {
    /// Names of the speakers, in order, after the task
    #[must_use]
    pub fn speakers(&self) -> Vec<&str> {
        self.messages
            .iter()
            .skip(1)
            .filter_map(|m| m.source())
            .collect()
    }
}
