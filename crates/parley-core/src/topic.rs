//! Topic model
//!
//! A topic is a named channel instance `(type, source)`. The source is the
//! session key, so every agent that receives a message on `(t, s)` is the
//! instance keyed by `s` of its agent type.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A channel instance: topic type plus session key
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TopicId {
    /// Topic type, e.g. `"SalesAgent"` or `"group_chat"`
    pub topic_type: String,
    /// Session key
    pub source: String,
}

impl TopicId {
    /// Create a topic id
    #[must_use]
    pub fn new(topic_type: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            topic_type: topic_type.into(),
            source: source.into(),
        }
    }
}

impl fmt::Display for TopicId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.topic_type, self.source)
    }
}

/// Registered agent type tag
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AgentType(String);

impl AgentType {
    /// Create an agent type tag
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Returns the tag
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AgentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AgentType {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for AgentType {
    fn from(name: String) -> Self {
        Self(name)
    }
}

/// One agent instance: agent type plus session key
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AgentId {
    /// Agent type tag
    pub agent_type: AgentType,
    /// Session key
    pub key: String,
}

impl AgentId {
    /// Create an agent id
    #[must_use]
    pub fn new(agent_type: impl Into<AgentType>, key: impl Into<String>) -> Self {
        Self {
            agent_type: agent_type.into(),
            key: key.into(),
        }
    }
}

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.agent_type, self.key)
    }
}

/// Routes a topic type to an agent type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscription {
    /// Topic type this subscription listens on
    pub topic_type: String,
    /// Agent type that receives the messages
    pub agent_type: AgentType,
}

impl Subscription {
    /// Create a subscription
    #[must_use]
    pub fn new(topic_type: impl Into<String>, agent_type: impl Into<AgentType>) -> Self {
        Self {
            topic_type: topic_type.into(),
            agent_type: agent_type.into(),
        }
    }

    /// Whether a message on `topic` is delivered through this subscription
    #[must_use]
    pub fn matches(&self, topic: &TopicId) -> bool {
        self.topic_type == topic.topic_type
    }

    /// Recipient instance for a message on `topic`
    #[must_use]
    pub fn recipient(&self, topic: &TopicId) -> AgentId {
        AgentId::new(self.agent_type.clone(), topic.source.clone())
    }
}
