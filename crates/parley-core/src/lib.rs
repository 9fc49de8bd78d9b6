//! Parley Core - Multi-Agent Orchestration
//!
//! This crate provides the orchestration runtime for Parley agents,
//! including:
//! - Runtime: topic publish/subscribe with per-session agent instances
//! - Handoff: agents that pass the conversation along with delegate tools
//! - Group chat: a manager that hands the floor to one participant at a time
//! - Termination: composable stop conditions
//! - Events: a broadcast bus of runtime events for observers

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod agent;
pub mod config;
pub mod console;
pub mod decision;
pub mod error;
pub mod event_bus;
pub mod group;
pub mod handoff;
pub mod history;
pub mod message;
pub mod runtime;
pub mod termination;
pub mod topic;

pub use agent::{Agent, AgentFactory, ClosureAgent, MessageContext};
pub use config::{
    GroupChatConfig, HandoffConfig, RetrySettings, RuntimeConfig, DEFAULT_SELECTOR_PROMPT,
    DEFAULT_USER_TOPIC,
};
pub use console::{ScriptedConsole, SharedConsole, UserConsole};
pub use decision::{DecisionLoop, Outcome, Phase};
pub use error::{format_error_for_chat, format_error_for_cli, Error, Result, UserFriendlyError};
pub use event_bus::{EventBus, EventStream, RuntimeEvent};
pub use group::{
    ChatParticipant, ChatResult, FnSelector, GroupChat, GroupChatHandle, GroupChatManager,
    HandoffSelector, Participant, PlannerSelector, ReasonerChooser, RoundRobinChooser,
    SelectionContext, SpeakerChooser, SpeakerSelector, UserProxyParticipant, TASK_SOURCE,
};
pub use handoff::{
    DelegateSpec, HandoffAgent, HandoffAgentConfig, HandoffRoster, HandoffState, HumanAgent,
    UserAgent,
};
pub use history::ConversationHistory;
pub use message::{Diagnostic, Envelope, Payload, Reply, Transfer};
pub use runtime::Runtime;
pub use termination::{StopReason, Termination};
pub use topic::{AgentId, AgentType, Subscription, TopicId};
