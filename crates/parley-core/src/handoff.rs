//! Handoff - agents that pass a conversation, with its full context, to
//! one another
//!
//! ```text
//!   User ──Transfer──► TriageAgent ──Transfer(hops+1)──► IssuesAndRepairsAgent
//!    ▲                                                          │
//!    └───────────────────────────Reply──────────────────────────┘
//! ```
//!
//! One generic [`HandoffAgent`] is parameterized by a
//! [`HandoffAgentConfig`]; the [`HandoffRoster`] installs a set of them
//! together with the [`UserAgent`] and an optional [`HumanAgent`].

mod agent;
mod human;
pub(crate) mod roster;
mod user;

#[cfg(test)]
mod tests;

pub use agent::HandoffAgent;
pub use human::HumanAgent;
pub use roster::HandoffRoster;
pub use user::UserAgent;

use crate::decision::Phase;
use serde::{Deserialize, Serialize};

/// Where a handoff agent is in its conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HandoffState {
    /// No conversation received yet
    #[default]
    Idle,
    /// Waiting for the reasoner
    AwaitingDecision,
    /// Running tool calls
    ExecutingTool,
    /// Answered; the user speaks next
    AwaitingUser,
    /// Handed the conversation to another agent
    Delegated,
    /// Gave up after its iteration bound
    Terminated,
}

impl From<Phase> for HandoffState {
    fn from(phase: Phase) -> Self {
        match phase {
            Phase::AwaitingDecision => Self::AwaitingDecision,
            Phase::ExecutingTool => Self::ExecutingTool,
        }
    }
}

/// A delegate tool and the topic type it hands control to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelegateSpec {
    /// Tool name offered to the reasoner, e.g. `transfer_to_sales_agent`
    pub tool: String,
    /// When the reasoner should use it
    #[serde(default)]
    pub description: String,
    /// Topic type of the receiving agent
    pub target: String,
}

/// Configuration record of one handoff agent
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HandoffAgentConfig {
    /// Agent name; also its agent type and topic type
    pub name: String,
    /// What the agent handles
    #[serde(default)]
    pub description: String,
    /// Instructions for the reasoner
    #[serde(default)]
    pub system_prompt: String,
    /// Registry tools the agent may call
    #[serde(default)]
    pub tools: Vec<String>,
    /// Agents it may hand control to
    #[serde(default)]
    pub delegates: Vec<DelegateSpec>,
    /// A coordinator may always hand control back to the user
    #[serde(default)]
    pub coordinator: bool,
    /// Overrides the roster's user topic
    #[serde(default)]
    pub user_topic: Option<String>,
    /// Overrides the roster's iteration bound
    #[serde(default)]
    pub max_iterations: Option<usize>,
    /// Overrides the roster's hop bound
    #[serde(default)]
    pub max_hops: Option<u32>,
}

impl HandoffAgentConfig {
    /// Create a record with a name and system prompt
    #[must_use]
    pub fn new(name: impl Into<String>, system_prompt: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            system_prompt: system_prompt.into(),
            tools: Vec::new(),
            delegates: Vec::new(),
            coordinator: false,
            user_topic: None,
            max_iterations: None,
            max_hops: None,
        }
    }

    /// Set the description
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Set the registry tools
    #[must_use]
    pub fn with_tools<I, S>(mut self, tools: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tools = tools.into_iter().map(Into::into).collect();
        self
    }

    /// Add a delegate tool
    #[must_use]
    pub fn with_delegate(
        mut self,
        tool: impl Into<String>,
        description: impl Into<String>,
        target: impl Into<String>,
    ) -> Self {
        self.delegates.push(DelegateSpec {
            tool: tool.into(),
            description: description.into(),
            target: target.into(),
        });
        self
    }

    /// Mark the agent as a coordinator
    #[must_use]
    pub fn as_coordinator(mut self) -> Self {
        self.coordinator = true;
        self
    }

    /// Override the iteration bound
    #[must_use]
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = Some(max_iterations);
        self
    }

    /// Override the hop bound
    #[must_use]
    pub fn with_max_hops(mut self, max_hops: u32) -> Self {
        self.max_hops = Some(max_hops);
        self
    }

    /// Topic types this agent may hand control to
    #[must_use]
    pub fn delegate_targets(&self, user_topic: &str) -> Vec<String> {
        let mut targets: Vec<String> = Vec::new();
        for spec in &self.delegates {
            if !targets.contains(&spec.target) {
                targets.push(spec.target.clone());
            }
        }
        if self.coordinator && !targets.iter().any(|t| t == user_topic) {
            targets.push(user_topic.to_string());
        }
        targets
    }
}
