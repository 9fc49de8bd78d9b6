use crate::topic::{AgentId, TopicId};
use serde::Serialize;
use uuid::Uuid;

/// Events emitted while the runtime delivers messages.
///
/// Events carry identifiers and short descriptions only; conversation
/// content stays with the agents.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RuntimeEvent {
    /// An agent instance was created on first delivery
    AgentCreated {
        /// New instance
        agent: AgentId,
    },
    /// A message was routed to its subscribers
    MessagePublished {
        /// Message id
        message_id: Uuid,
        /// Destination topic
        topic: TopicId,
        /// Payload kind
        kind: &'static str,
        /// Number of deliveries enqueued
        recipients: usize,
    },
    /// A handler finished successfully
    DeliveryCompleted {
        /// Message id
        message_id: Uuid,
        /// Recipient
        agent: AgentId,
    },
    /// A handler failed
    DeliveryFailed {
        /// Message id
        message_id: Uuid,
        /// Recipient
        agent: AgentId,
        /// Error description
        error: String,
        /// Whether the session was stopped
        fatal: bool,
    },
    /// A delivery was not attempted or was abandoned
    DeliverySkipped {
        /// Message id
        message_id: Uuid,
        /// Recipient
        agent: AgentId,
        /// Why it was skipped
        reason: String,
    },
    /// A handoff agent delegated its conversation
    HandoffPerformed {
        /// Session key
        session: String,
        /// Delegating agent
        from: String,
        /// Receiving topic type
        to: String,
        /// Hop count carried by the transfer
        hops: u32,
    },
    /// The group chat manager granted the floor
    SpeakerSelected {
        /// Session key
        session: String,
        /// Chosen participant
        speaker: String,
        /// Selection number, starting at 1
        turn: usize,
        /// Whether the override selector chose
        by_override: bool,
    },
    /// A group chat stopped
    ChatTerminated {
        /// Session key
        session: String,
        /// Stop reason
        reason: String,
    },
    /// No delivery is queued or in flight
    RuntimeIdle,
}

impl RuntimeEvent {
    /// Session key the event belongs to, if any.
    #[must_use]
    pub fn session(&self) -> Option<&str> {
        match self {
            Self::AgentCreated { agent }
            | Self::DeliveryCompleted { agent, .. }
            | Self::DeliveryFailed { agent, .. }
            | Self::DeliverySkipped { agent, .. } => Some(&agent.key),
            Self::MessagePublished { topic, .. } => Some(&topic.source),
            Self::HandoffPerformed { session, .. }
            | Self::SpeakerSelected { session, .. }
            | Self::ChatTerminated { session, .. } => Some(session),
            Self::RuntimeIdle => None,
        }
    }
}
