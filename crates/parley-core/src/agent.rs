//! Agent capability
//!
//! Every agent type registered with the [`Runtime`](crate::Runtime) is a
//! factory producing [`Agent`] instances, one per session. Handlers never
//! publish directly: they queue messages on their [`MessageContext`] and the
//! runtime routes the queue, in order, once the handler returns `Ok`.

use crate::error::{Error, Result};
use crate::event_bus::{EventBus, RuntimeEvent};
use crate::message::{Envelope, Payload};
use crate::topic::{AgentId, TopicId};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Message handler of one agent instance
#[async_trait::async_trait]
pub trait Agent: Send {
    /// Handle one delivered message
    async fn on_message(&mut self, envelope: &Envelope, ctx: &mut MessageContext) -> Result<()>;
}

/// Builds the instance for an agent id on its first message
pub type AgentFactory = Arc<dyn Fn(&AgentId) -> Box<dyn Agent> + Send + Sync>;

/// A message queued by a handler
#[derive(Debug, Clone)]
pub(crate) struct Outgoing {
    pub(crate) topic: TopicId,
    pub(crate) payload: Payload,
}

/// Handler-side view of the runtime for one delivery
pub struct MessageContext {
    agent_id: AgentId,
    cancellation: CancellationToken,
    events: EventBus,
    outbox: Vec<Outgoing>,
}

impl MessageContext {
    pub(crate) fn new(agent_id: AgentId, cancellation: CancellationToken, events: EventBus) -> Self {
        Self {
            agent_id,
            cancellation,
            events,
            outbox: Vec::new(),
        }
    }

    /// Id of the handling instance
    #[must_use]
    pub fn agent_id(&self) -> &AgentId {
        &self.agent_id
    }

    /// Session key of the handling instance
    #[must_use]
    pub fn session(&self) -> &str {
        &self.agent_id.key
    }

    /// Token of the request being handled
    #[must_use]
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }

    /// `Err(Cancelled)` once the request's token fired
    pub fn check_cancelled(&self) -> Result<()> {
        if self.cancellation.is_cancelled() {
            return Err(Error::Cancelled);
        }
        Ok(())
    }

    /// Queue `payload` for `(topic_type, session)`
    pub fn publish(&mut self, payload: Payload, topic_type: &str) {
        let topic = TopicId::new(topic_type, self.session());
        self.publish_to(payload, topic);
    }

    /// Queue `payload` for an explicit topic
    pub fn publish_to(&mut self, payload: Payload, topic: TopicId) {
        self.outbox.push(Outgoing { topic, payload });
    }

    /// Report an event right away
    pub fn emit(&self, event: RuntimeEvent) {
        self.events.publish(event);
    }

    /// Queued messages, oldest first
    #[must_use]
    pub fn pending(&self) -> usize {
        self.outbox.len()
    }

    pub(crate) fn into_outbox(self) -> Vec<Outgoing> {
        self.outbox
    }
}

type Handler = dyn for<'a> FnMut(
        &'a Envelope,
        &'a mut MessageContext,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>>
    + Send;

/// Agent backed by a closure, for small relays and tests
pub struct ClosureAgent {
    handler: Box<Handler>,
}

impl ClosureAgent {
    /// Wrap a handler closure
    pub fn new<F>(handler: F) -> Self
    where
        F: for<'a> FnMut(
                &'a Envelope,
                &'a mut MessageContext,
            ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>>
            + Send
            + 'static,
    {
        Self {
            handler: Box::new(handler),
        }
    }
}

#[async_trait::async_trait]
impl Agent for ClosureAgent {
    async fn on_message(&mut self, envelope: &Envelope, ctx: &mut MessageContext) -> Result<()> {
        (self.handler)(envelope, ctx).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_publish_stays_in_session() {
        let mut ctx = MessageContext::new(
            AgentId::new("triage", "s9"),
            CancellationToken::new(),
            EventBus::default(),
        );
        ctx.publish(Payload::Login, "User");
        ctx.publish_to(Payload::RequestToSpeak, TopicId::new("planner", "other"));

        assert_eq!(ctx.pending(), 2);
        let outbox = ctx.into_outbox();
        assert_eq!(outbox[0].topic, TopicId::new("User", "s9"));
        assert_eq!(outbox[1].topic.source, "other");
    }

    #[test]
    fn test_check_cancelled() {
        let token = CancellationToken::new();
        let ctx = MessageContext::new(AgentId::new("a", "s"), token.clone(), EventBus::default());
        assert!(ctx.check_cancelled().is_ok());
        token.cancel();
        assert!(matches!(ctx.check_cancelled(), Err(Error::Cancelled)));
    }
}
