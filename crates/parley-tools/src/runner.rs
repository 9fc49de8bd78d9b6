//! Runner - Tool execution engine
//!
//! This module provides the execution engine for tools, including:
//! - Input validation
//! - Timeout handling and retry of transient failures
//! - Cooperative cancellation through the request's token

use crate::error::{Error, Result};
use crate::registry::{ToolRegistry, ToolResult};
use parley_llm::{retry_with_backoff, RetryConfig, ToolCall};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, instrument, warn};

/// Configuration for the tool runner
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// Default timeout for tool execution
    pub default_timeout: Duration,
    /// Maximum timeout allowed
    pub max_timeout: Duration,
    /// Retry policy for timeouts and other transient failures
    pub retry: RetryConfig,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            default_timeout: Duration::from_secs(30),
            max_timeout: Duration::from_secs(300),
            retry: RetryConfig::default().with_max_attempts(1),
        }
    }
}

impl RunnerConfig {
    /// Create a new configuration with default timeout
    #[must_use]
    pub fn new(default_timeout: Duration) -> Self {
        Self {
            default_timeout,
            ..Default::default()
        }
    }

    /// Set the default timeout
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    /// Set the maximum timeout
    #[must_use]
    pub fn with_max_timeout(mut self, max_timeout: Duration) -> Self {
        self.max_timeout = max_timeout;
        self
    }

    /// Set the retry policy
    #[must_use]
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }
}

/// Options for a single tool execution
#[derive(Debug, Clone, Default)]
pub struct ExecutionOptions {
    /// Custom timeout for this execution
    pub timeout: Option<Duration>,
    /// Skip validation
    pub skip_validation: bool,
}

impl ExecutionOptions {
    /// Create options with a specific timeout
    #[must_use]
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            timeout: Some(timeout),
            ..Default::default()
        }
    }
}

/// Tool execution result with additional metadata
#[derive(Debug)]
pub struct ExecutionResult {
    /// The tool result
    pub result: ToolResult,
    /// Tool name
    pub tool_name: String,
    /// Number of attempts made
    pub attempts: u32,
}

/// Tool runner shared by every agent of a runtime
#[derive(Clone)]
pub struct ToolRunner {
    registry: Arc<ToolRegistry>,
    config: RunnerConfig,
}

impl ToolRunner {
    /// Create a new tool runner
    #[must_use]
    pub fn new(registry: Arc<ToolRegistry>, config: RunnerConfig) -> Self {
        Self { registry, config }
    }

    /// Create with default configuration
    #[must_use]
    pub fn with_defaults(registry: Arc<ToolRegistry>) -> Self {
        Self::new(registry, RunnerConfig::default())
    }

    /// Get the registry
    #[must_use]
    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// Get the configuration
    #[must_use]
    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    /// Execute a tool by name
    pub async fn execute(
        &self,
        tool_name: &str,
        input: serde_json::Value,
        cancel: &CancellationToken,
    ) -> Result<ExecutionResult> {
        self.execute_with_options(tool_name, input, ExecutionOptions::default(), cancel)
            .await
    }

    /// Execute a reasoner-requested tool call
    pub async fn execute_call(
        &self,
        call: &ToolCall,
        cancel: &CancellationToken,
    ) -> Result<ExecutionResult> {
        let input = call
            .arguments_value()
            .map_err(|e| Error::InvalidInput(e.to_string()))?;
        self.execute(&call.name, input, cancel).await
    }

    /// Execute a tool with custom options.
    ///
    /// A tool that returns an error produces a failed [`ToolResult`]; timeouts
    /// (after retries) and cancellation are returned as errors.
    #[instrument(skip(self, input, options, cancel), fields(tool = %tool_name))]
    pub async fn execute_with_options(
        &self,
        tool_name: &str,
        input: serde_json::Value,
        options: ExecutionOptions,
        cancel: &CancellationToken,
    ) -> Result<ExecutionResult> {
        let tool = self
            .registry
            .get(tool_name)
            .ok_or_else(|| Error::NotFound(tool_name.to_string()))?;

        if !tool.definition().enabled {
            return Err(Error::Disabled(tool_name.to_string()));
        }

        if !options.skip_validation {
            tool.validate_input(&input)?;
        }

        let execution_timeout = options
            .timeout
            .unwrap_or(self.config.default_timeout)
            .min(self.config.max_timeout);

        let start = Instant::now();
        let mut attempts = 0;
        debug!(tool = %tool_name, timeout_ms = %execution_timeout.as_millis(), "Executing tool");

        let outcome = retry_with_backoff(
            &self.config.retry,
            cancel,
            || {
                attempts += 1;
                let tool = Arc::clone(&tool);
                let input = input.clone();
                async move {
                    tokio::select! {
                        _ = cancel.cancelled() => Err(Error::Cancelled),
                        result = timeout(execution_timeout, tool.execute(input, cancel)) => match result {
                            Ok(outcome) => outcome,
                            Err(_) => Err(Error::Timeout(execution_timeout.as_millis() as u64)),
                        },
                    }
                }
            },
            Error::is_transient,
        )
        .await;

        let duration = start.elapsed().as_millis() as u64;
        let result = match outcome {
            Ok(result) => result,
            Err(e) if e.cancelled || matches!(e.last_error, Error::Cancelled) => {
                debug!(tool = %tool_name, "Tool execution cancelled");
                return Err(Error::Cancelled);
            }
            Err(e) if matches!(e.last_error, Error::Timeout(_)) => {
                warn!(tool = %tool_name, attempts = e.attempts, "Tool execution timed out");
                return Err(e.last_error);
            }
            Err(e) => {
                error!(tool = %tool_name, error = %e.last_error, "Tool execution failed");
                ToolResult::failure(e.last_error.to_string(), duration)
            }
        };

        debug!(
            tool = %tool_name,
            success = %result.success,
            duration_ms = %result.duration_ms,
            "Tool execution completed"
        );

        Ok(ExecutionResult {
            result,
            tool_name: tool_name.to_string(),
            attempts,
        })
    }

}
