//! Reasoner trait
//!
//! A reasoner turns an agent's conversation into its next step. The
//! orchestration core treats it as opaque: it only sees the `Decision`.

use crate::error::Result;
use crate::message::Message;
use crate::tools::{ToolCall, ToolDefinition};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Everything a reasoner may look at when deciding
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DecisionRequest {
    /// Name of the deciding agent
    pub agent: String,
    /// Instructions prepended to the conversation
    pub system_prompt: String,
    /// Conversation so far, oldest first
    pub history: Vec<Message>,
    /// Ordinary tools the agent may call
    pub tools: Vec<ToolDefinition>,
    /// Delegate tools, each of which hands control to another agent
    pub delegate_tools: Vec<ToolDefinition>,
    /// Topic types the agent may delegate to
    pub delegate_targets: Vec<String>,
}

impl DecisionRequest {
    /// Create a request for `agent`
    #[must_use]
    pub fn new(agent: impl Into<String>, system_prompt: impl Into<String>) -> Self {
        Self {
            agent: agent.into(),
            system_prompt: system_prompt.into(),
            ..Self::default()
        }
    }

    /// Set the conversation
    #[must_use]
    pub fn with_history(mut self, history: Vec<Message>) -> Self {
        self.history = history;
        self
    }

    /// Set the ordinary tools
    #[must_use]
    pub fn with_tools(mut self, tools: Vec<ToolDefinition>) -> Self {
        self.tools = tools;
        self
    }

    /// Set the delegate tools and the topics they may reach
    #[must_use]
    pub fn with_delegates(mut self, tools: Vec<ToolDefinition>, targets: Vec<String>) -> Self {
        self.delegate_tools = tools;
        self.delegate_targets = targets;
        self
    }

    /// Latest turn of the conversation
    #[must_use]
    pub fn last_message(&self) -> Option<&Message> {
        self.history.last()
    }
}

/// The next step an agent takes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Decision {
    /// Answer the user (or the group) with text
    Reply(String),
    /// Run one or more ordinary tools, then decide again
    ToolCalls(Vec<ToolCall>),
    /// Hand control to another agent through a delegate tool
    Delegate(ToolCall),
}

/// Discriminant of a [`Decision`], used in logs and events
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecisionKind {
    /// Text reply
    Reply,
    /// Tool calls
    ToolCalls,
    /// Delegation
    Delegate,
}

impl DecisionKind {
    /// Returns the string representation
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Reply => "reply",
            Self::ToolCalls => "tool_calls",
            Self::Delegate => "delegate",
        }
    }
}

impl Decision {
    /// Create a text reply
    #[must_use]
    pub fn reply(text: impl Into<String>) -> Self {
        Self::Reply(text.into())
    }

    /// Create a single tool call decision
    #[must_use]
    pub fn call(name: impl Into<String>, arguments: serde_json::Value) -> Self {
        Self::ToolCalls(vec![ToolCall::new(name, arguments)])
    }

    /// Create a delegation through the named delegate tool
    #[must_use]
    pub fn delegate(tool: impl Into<String>) -> Self {
        Self::Delegate(ToolCall::new(tool, serde_json::json!({})))
    }

    /// Discriminant
    #[must_use]
    pub fn kind(&self) -> DecisionKind {
        match self {
            Self::Reply(_) => DecisionKind::Reply,
            Self::ToolCalls(_) => DecisionKind::ToolCalls,
            Self::Delegate(_) => DecisionKind::Delegate,
        }
    }
}

/// The reasoning capability behind every agent
#[async_trait::async_trait]
pub trait Reasoner: Send + Sync {
    /// Reasoner name (for logging)
    fn name(&self) -> &str;

    /// Decide the next step. Implementations should return
    /// [`Error::Cancelled`](crate::Error::Cancelled) once `cancel` fires.
    async fn decide(&self, request: DecisionRequest, cancel: &CancellationToken)
        -> Result<Decision>;
}

/// Reasoner shared between agent instances
pub type SharedReasoner = Arc<dyn Reasoner>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decision_kind() {
        assert_eq!(Decision::reply("hi").kind(), DecisionKind::Reply);
        assert_eq!(
            Decision::call("look_up_item", serde_json::json!({"search_query": "boots"})).kind(),
            DecisionKind::ToolCalls
        );
        assert_eq!(
            Decision::delegate("transfer_to_issues_and_repairs").kind(),
            DecisionKind::Delegate
        );
        assert_eq!(DecisionKind::ToolCalls.as_str(), "tool_calls");
    }

    #[test]
    fn test_request_builder() {
        let request = DecisionRequest::new("TriageAgent", "Route the user")
            .with_history(vec![Message::user("my order is broken")])
            .with_delegates(
                vec![ToolDefinition::new(
                    "transfer_to_sales_agent",
                    "",
                    serde_json::json!({}),
                )],
                vec!["SalesAgent".into()],
            );

        assert_eq!(request.agent, "TriageAgent");
        assert_eq!(request.last_message().unwrap().content, "my order is broken");
        assert_eq!(request.delegate_targets, vec!["SalesAgent".to_string()]);
        assert!(request.tools.is_empty());
    }
}
