//! Scripted reasoners for tests and offline demos
//!
//! `MockReasoner` replays a queue of decisions and records every request it
//! receives. `FnReasoner` wraps a closure, which is how rule-based demo
//! agents are built.

use crate::error::{Error, Result};
use crate::reasoner::{Decision, DecisionRequest, Reasoner};

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// A reasoner that returns queued decisions, then a default reply
#[derive(Clone)]
pub struct MockReasoner {
    name: String,
    responses: Arc<Mutex<VecDeque<Result<Decision>>>>,
    requests: Arc<Mutex<Vec<DecisionRequest>>>,
    default_reply: String,
    latency: Option<Duration>,
}

impl Default for MockReasoner {
    fn default() -> Self {
        Self::new()
    }
}

impl MockReasoner {
    /// Create a new mock reasoner
    #[must_use]
    pub fn new() -> Self {
        Self {
            name: "mock".to_string(),
            responses: Arc::new(Mutex::new(VecDeque::new())),
            requests: Arc::new(Mutex::new(Vec::new())),
            default_reply: "mock response".to_string(),
            latency: None,
        }
    }

    /// Create a mock reasoner preloaded with decisions
    #[must_use]
    pub fn scripted(decisions: impl IntoIterator<Item = Decision>) -> Self {
        let reasoner = Self::new();
        for decision in decisions {
            reasoner.push(decision);
        }
        reasoner
    }

    /// Set the reasoner name
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Set the reply used once the queue is empty
    #[must_use]
    pub fn with_default_reply(mut self, reply: impl Into<String>) -> Self {
        self.default_reply = reply.into();
        self
    }

    /// Wait this long before answering (cancellable)
    #[must_use]
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Queue a decision
    pub fn push(&self, decision: Decision) {
        self.responses
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_back(Ok(decision));
    }

    /// Queue a failure
    pub fn push_error(&self, error: Error) {
        self.responses
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_back(Err(error));
    }

    /// Requests received so far
    #[must_use]
    pub fn requests(&self) -> Vec<DecisionRequest> {
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Number of queued decisions not yet consumed
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.responses
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }
}

#[async_trait::async_trait]
impl Reasoner for MockReasoner {
    fn name(&self) -> &str {
        &self.name
    }

    async fn decide(
        &self,
        request: DecisionRequest,
        cancel: &CancellationToken,
    ) -> Result<Decision> {
        if let Some(latency) = self.latency {
            tokio::select! {
                _ = cancel.cancelled() => return Err(Error::Cancelled),
                _ = tokio::time::sleep(latency) => {}
            }
        }
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(request);

        let mut responses = self.responses.lock().unwrap_or_else(|e| e.into_inner());
        match responses.pop_front() {
            Some(response) => response,
            None => Ok(Decision::Reply(self.default_reply.clone())),
        }
    }
}

type DecideFn = dyn Fn(&DecisionRequest) -> Result<Decision> + Send + Sync;

/// A reasoner backed by a synchronous closure
#[derive(Clone)]
pub struct FnReasoner {
    name: String,
    decide: Arc<DecideFn>,
}

impl FnReasoner {
    /// Wrap a closure
    pub fn new<F>(name: impl Into<String>, decide: F) -> Self
    where
        F: Fn(&DecisionRequest) -> Result<Decision> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            decide: Arc::new(decide),
        }
    }
}

impl std::fmt::Debug for FnReasoner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnReasoner").field("name", &self.name).finish()
    }
}

#[async_trait::async_trait]
impl Reasoner for FnReasoner {
    fn name(&self) -> &str {
        &self.name
    }

    async fn decide(
        &self,
        request: DecisionRequest,
        cancel: &CancellationToken,
    ) -> Result<Decision> {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        (self.decide)(&request)
    }
}
