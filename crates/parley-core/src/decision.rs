//! Decide-act loop shared by handoff agents and group chat participants
//!
//! ```text
//!   ┌──────────────► decide(history) ───────────────┐
//!   │                    │          │               │
//!   │               ToolCalls    Delegate         Reply
//!   │                    │          │               │
//!   └── append calls+results   resolve target   append answer
//!                               append transfer
//! ```
//!
//! The loop only mutates the history it is handed. Callers run it on a
//! working copy and decide what to commit.

use crate::error::{Error, Result};
use crate::history::ConversationHistory;
use parley_llm::{Decision, DecisionRequest, Message, SharedReasoner, ToolCall, ToolDefinition};
use parley_tools::builtins::delegate_target;
use parley_tools::ToolRunner;
use std::collections::HashSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};

/// Where the loop is, reported to the owning agent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Waiting for the reasoner
    AwaitingDecision,
    /// Running tool calls
    ExecutingTool,
}

/// How a run of the loop ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The agent answered
    Reply(String),
    /// The agent handed control to `target`
    Delegated {
        /// Topic type receiving the conversation
        target: String,
    },
    /// The iteration bound was reached without an answer
    Exhausted,
}

/// Reasoner, tools and delegates of one agent
pub struct DecisionLoop {
    name: String,
    system_prompt: String,
    reasoner: SharedReasoner,
    runner: ToolRunner,
    tools: Vec<ToolDefinition>,
    delegate_tools: Vec<ToolDefinition>,
    delegate_targets: Vec<String>,
    max_iterations: usize,
}

impl DecisionLoop {
    /// Create a loop with no tools and no delegates
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        system_prompt: impl Into<String>,
        reasoner: SharedReasoner,
        runner: ToolRunner,
    ) -> Self {
        Self {
            name: name.into(),
            system_prompt: system_prompt.into(),
            reasoner,
            runner,
            tools: Vec::new(),
            delegate_tools: Vec::new(),
            delegate_targets: Vec::new(),
            max_iterations: 10,
        }
    }

    /// Offer the named registry tools
    pub fn with_tools<S: AsRef<str>>(mut self, names: &[S]) -> Result<Self> {
        self.tools = self.subset(names)?;
        Ok(self)
    }

    /// Offer the named delegate tools, which may reach `targets`
    pub fn with_delegates<S: AsRef<str>>(mut self, names: &[S], targets: Vec<String>) -> Result<Self> {
        self.delegate_tools = self.subset(names)?;
        self.delegate_targets = targets;
        Ok(self)
    }

    /// Bound the decisions taken per run
    #[must_use]
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations.max(1);
        self
    }

    /// Agent name
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Topic types this agent may hand control to
    #[must_use]
    pub fn delegate_targets(&self) -> &[String] {
        &self.delegate_targets
    }

    /// Decide and act until the agent replies, delegates, or runs out of
    /// iterations. Tool results are appended only after every call of a
    /// decision finished; cancellation appends nothing further.
    #[instrument(skip(self, history, cancel, on_phase), fields(agent = %self.name))]
    pub async fn run<F>(
        &self,
        history: &mut ConversationHistory,
        cancel: &CancellationToken,
        mut on_phase: F,
    ) -> Result<Outcome>
    where
        F: FnMut(Phase) + Send,
    {
        for iteration in 1..=self.max_iterations {
            on_phase(Phase::AwaitingDecision);
            if cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }

            let request = DecisionRequest::new(&self.name, &self.system_prompt)
                .with_history(history.to_vec())
                .with_tools(self.tools.clone())
                .with_delegates(self.delegate_tools.clone(), self.delegate_targets.clone());
            let decision = self.reasoner.decide(request, cancel).await?;
            debug!(iteration, decision = decision.kind().as_str(), "Decision received");

            match decision {
                Decision::Reply(text) => {
                    history.push(Message::assistant(text.clone()).from_source(&self.name));
                    return Ok(Outcome::Reply(text));
                }
                Decision::ToolCalls(calls) => {
                    on_phase(Phase::ExecutingTool);
                    let turns = self.execute_tools(calls, cancel).await?;
                    history.extend(turns);
                }
                Decision::Delegate(call) => {
                    let target = self.resolve_delegate(&call, cancel).await?;
                    let call_id = call.id.clone();
                    history.push(
                        Message::tool_calls(vec![call])
                            .from_source(&self.name)
                            .with_handoff(&target),
                    );
                    history.push(
                        Message::tool_response(
                            call_id,
                            format!("Transferred to {}. Adopt persona immediately.", target),
                        )
                        .from_source(&self.name),
                    );
                    return Ok(Outcome::Delegated { target });
                }
            }
        }

        warn!(max_iterations = self.max_iterations, "Iteration bound reached without a reply");
        Ok(Outcome::Exhausted)
    }

    async fn execute_tools(
        &self,
        calls: Vec<ToolCall>,
        cancel: &CancellationToken,
    ) -> Result<Vec<Message>> {
        if calls.is_empty() {
            return Err(Error::Protocol(format!(
                "{} requested an empty tool call list",
                self.name
            )));
        }
        let offered: HashSet<&str> = self.tools.iter().map(|t| t.name.as_str()).collect();
        if let Some(unknown) = calls.iter().find(|c| !offered.contains(c.name.as_str())) {
            return Err(Error::Protocol(format!(
                "{} requested tool '{}' it was not given",
                self.name, unknown.name
            )));
        }

        let mut results = Vec::with_capacity(calls.len());
        for call in &calls {
            let content = match self.runner.execute_call(call, cancel).await {
                Ok(execution) => execution.result.content(),
                Err(parley_tools::Error::Cancelled) => return Err(Error::Cancelled),
                Err(e) => {
                    warn!(tool = %call.name, error = %e, "Tool call failed");
                    format!("Error: {}", e)
                }
            };
            results.push(Message::tool_response(&call.id, content).from_source(&self.name));
        }
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        let mut turns = Vec::with_capacity(results.len() + 1);
        turns.push(Message::tool_calls(calls).from_source(&self.name));
        turns.extend(results);
        Ok(turns)
    }

    async fn resolve_delegate(&self, call: &ToolCall, cancel: &CancellationToken) -> Result<String> {
        if !self.delegate_tools.iter().any(|t| t.name == call.name) {
            return Err(Error::Protocol(format!(
                "{} delegated through unknown tool '{}'",
                self.name, call.name
            )));
        }
        let execution = self
            .runner
            .execute_call(call, cancel)
            .await
            .map_err(|e| match e {
                parley_tools::Error::Cancelled => Error::Cancelled,
                other => Error::Protocol(format!("delegate tool '{}' failed: {}", call.name, other)),
            })?;
        let target = delegate_target(&execution.result).ok_or_else(|| {
            Error::Protocol(format!(
                "delegate tool '{}' did not return a topic type",
                call.name
            ))
        })?;
        if !self.delegate_targets.iter().any(|t| t == target) {
            return Err(Error::Protocol(format!(
                "{} may not delegate to '{}'",
                self.name, target
            )));
        }
        debug!(target, "Delegate resolved");
        Ok(target.to_string())
    }

    fn subset<S: AsRef<str>>(&self, names: &[S]) -> Result<Vec<ToolDefinition>> {
        self.runner.registry().subset(names).map_err(|e| {
            Error::Configuration(format!("tools of agent '{}': {}", self.name, e))
        })
    }
}
