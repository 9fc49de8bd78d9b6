//! Envelopes and payloads carried by the runtime

use crate::termination::StopReason;
use crate::topic::{AgentId, TopicId};
use parley_llm::Message;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Handoff of a conversation to the agent subscribed to the topic
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transfer {
    /// The whole conversation so far
    pub context: Vec<Message>,
    /// Delegations since the user last spoke
    #[serde(default)]
    pub hops: u32,
}

/// An agent's answer to the user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reply {
    /// Topic type the user should answer back to
    pub reply_to: String,
    /// The whole conversation, ending with the answer
    pub context: Vec<Message>,
}

/// A failed turn, published where its reply would have gone
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    /// Agent whose turn failed
    pub source: String,
    /// Topic type to answer back to
    pub reply_to: String,
    /// What went wrong
    pub error: String,
}

/// Typed message body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "body", rename_all = "snake_case")]
pub enum Payload {
    /// Start a session
    Login,
    /// One plain chat turn
    Chat(Message),
    /// Hand the conversation to another agent
    Transfer(Transfer),
    /// Answer to the user
    Reply(Reply),
    /// Group chat manager grants the floor
    RequestToSpeak,
    /// A turn failed
    Diagnostic(Diagnostic),
    /// Group chat ended
    Terminated(StopReason),
}

impl Payload {
    /// Short name of the variant, for logs and events
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Login => "login",
            Self::Chat(_) => "chat",
            Self::Transfer(_) => "transfer",
            Self::Reply(_) => "reply",
            Self::RequestToSpeak => "request_to_speak",
            Self::Diagnostic(_) => "diagnostic",
            Self::Terminated(_) => "terminated",
        }
    }
}

/// A published message as seen by its recipients
#[derive(Debug, Clone)]
pub struct Envelope {
    /// Unique message id
    pub id: Uuid,
    /// Publishing agent; `None` for messages from outside the runtime
    pub sender: Option<AgentId>,
    /// Destination topic
    pub topic: TopicId,
    /// Message body
    pub payload: Payload,
    /// Token of the top-level request this message belongs to
    pub cancellation: CancellationToken,
}

impl Envelope {
    pub(crate) fn new(
        sender: Option<AgentId>,
        topic: TopicId,
        payload: Payload,
        cancellation: CancellationToken,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            sender,
            topic,
            payload,
            cancellation,
        }
    }

    /// Session key of the topic
    #[must_use]
    pub fn session(&self) -> &str {
        &self.topic.source
    }

    /// Agent type of the sender, if any
    #[must_use]
    pub fn sender_type(&self) -> Option<&str> {
        self.sender.as_ref().map(|id| id.agent_type.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_serialization() {
        let payload = Payload::Transfer(Transfer {
            context: vec![Message::user("I want a refund").from_source("User")],
            hops: 1,
        });
        let json = serde_json::to_string(&payload).unwrap();
        assert!(json.contains("\"type\":\"transfer\""));
        assert!(json.contains("I want a refund"));

        let parsed: Payload = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, payload);
        assert_eq!(parsed.kind(), "transfer");
    }

    #[test]
    fn test_unit_payload_serialization() {
        let json = serde_json::to_string(&Payload::RequestToSpeak).unwrap();
        assert_eq!(json, r#"{"type":"request_to_speak"}"#);
    }

    #[test]
    fn test_envelope_session() {
        let envelope = Envelope::new(
            Some(AgentId::new("triage", "s1")),
            TopicId::new("User", "s1"),
            Payload::Login,
            CancellationToken::new(),
        );
        assert_eq!(envelope.session(), "s1");
        assert_eq!(envelope.sender_type(), Some("triage"));
    }
}
