//! Parley Tools - Tool Registry and Execution Engine
//!
//! This crate provides the tool capability for Parley agents:
//! - Registry: tool registration, lookup, and per-agent subsets
//! - Runner: execution with validation, timeout, retry, and cancellation
//! - Builtins: closure tools, delegate (transfer) tools, and demo tools

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod builtins;
pub mod error;
pub mod registry;
pub mod runner;

pub use builtins::{transfer_tool, FunctionTool};
pub use error::{Error, Result};
pub use registry::{Tool, ToolCategory, ToolDefinition, ToolRegistry, ToolResult};
pub use runner::{ExecutionOptions, ExecutionResult, RunnerConfig, ToolRunner};
