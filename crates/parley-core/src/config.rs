//! Configuration records
//!
//! All records deserialize from partial input; missing fields take their
//! defaults.

use crate::termination::Termination;
use parley_llm::RetryConfig;
use serde::{Deserialize, Serialize};

/// Default topic type of the user agent
pub const DEFAULT_USER_TOPIC: &str = "User";

/// Prompt used by the reasoner-backed speaker chooser
pub const DEFAULT_SELECTOR_PROMPT: &str = "Select an agent to perform task.

{roles}

Current conversation context:
{history}

Read the above conversation, then select an agent from {participants} to perform the next task.
Only select one agent.";

/// Runtime settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Buffered events before slow subscribers lag
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            event_capacity: default_event_capacity(),
        }
    }
}

/// Limits shared by the agents of a handoff roster
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HandoffConfig {
    /// Decisions an agent may take for one incoming transfer
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,
    /// Delegations allowed before the user speaks again
    #[serde(default = "default_max_hops")]
    pub max_hops: u32,
    /// Topic type of the user agent
    #[serde(default = "default_user_topic")]
    pub user_topic: String,
}

impl Default for HandoffConfig {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            max_hops: default_max_hops(),
            user_topic: default_user_topic(),
        }
    }
}

/// Group chat settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupChatConfig {
    /// Hard bound on speaker selections
    #[serde(default = "default_max_turns")]
    pub max_turns: usize,
    /// Whether the previous speaker may be chosen again
    #[serde(default)]
    pub allow_repeated_speaker: bool,
    /// Stop condition evaluated before every selection
    #[serde(default)]
    pub termination: Option<Termination>,
    /// Prompt template for the reasoner-backed chooser
    #[serde(default = "default_selector_prompt")]
    pub selector_prompt: String,
    /// Attempts the reasoner-backed chooser gets before round-robin
    #[serde(default = "default_selector_attempts")]
    pub selector_max_attempts: u32,
    /// Decisions a participant may take per turn
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,
}

impl Default for GroupChatConfig {
    fn default() -> Self {
        Self {
            max_turns: default_max_turns(),
            allow_repeated_speaker: false,
            termination: None,
            selector_prompt: default_selector_prompt(),
            selector_max_attempts: default_selector_attempts(),
            max_iterations: default_max_iterations(),
        }
    }
}

impl GroupChatConfig {
    /// Set the stop condition
    #[must_use]
    pub fn with_termination(mut self, termination: Termination) -> Self {
        self.termination = Some(termination);
        self
    }

    /// Set the hard turn bound
    #[must_use]
    pub fn with_max_turns(mut self, max_turns: usize) -> Self {
        self.max_turns = max_turns;
        self
    }

    /// Allow or forbid consecutive turns by the same speaker
    #[must_use]
    pub fn with_repeated_speaker(mut self, allow: bool) -> Self {
        self.allow_repeated_speaker = allow;
        self
    }
}

/// Retry policies for the external capabilities
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrySettings {
    /// Reasoner retries
    #[serde(default)]
    pub reasoner: RetryConfig,
    /// Tool retries (timeouts only)
    #[serde(default = "default_tool_retry")]
    pub tools: RetryConfig,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            reasoner: RetryConfig::default(),
            tools: default_tool_retry(),
        }
    }
}

fn default_event_capacity() -> usize {
    256
}

fn default_max_iterations() -> usize {
    10
}

fn default_max_hops() -> u32 {
    8
}

fn default_user_topic() -> String {
    DEFAULT_USER_TOPIC.to_string()
}

fn default_max_turns() -> usize {
    20
}

fn default_selector_prompt() -> String {
    DEFAULT_SELECTOR_PROMPT.to_string()
}

fn default_selector_attempts() -> u32 {
    3
}

fn default_tool_retry() -> RetryConfig {
    RetryConfig::default().with_max_attempts(1)
}
