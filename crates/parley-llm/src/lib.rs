//! Parley LLM - Reasoning Capability Abstraction
//!
//! This crate defines the boundary between Parley agents and whatever
//! produces their decisions:
//! - Message: chat turns exchanged between agents
//! - Tools: tool schemas and tool calls
//! - Reasoner: the `decide` capability (reply, tool calls, or delegation)
//! - Mock: scripted and closure-backed reasoners for tests and demos
//! - Retry: exponential backoff for transient reasoning failures

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod message;
pub mod mock;
pub mod reasoner;
pub mod retry;
pub mod tools;

pub use error::{Error, Result};
pub use message::{Message, MessageRole};
pub use mock::{FnReasoner, MockReasoner};
pub use reasoner::{Decision, DecisionKind, DecisionRequest, Reasoner, SharedReasoner};
pub use retry::{retry_with_backoff, RetryConfig, RetryError, RetryingReasoner};
pub use tools::{ToolCall, ToolDefinition};
