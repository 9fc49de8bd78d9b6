//! Runtime - topic-based message bus
//!
//! ```text
//!  publish(payload, topic) ──► subscription table ──► Delivery per recipient
//!                                                        │
//!                               ┌────────────────────────┘
//!                               ▼
//!             per-session FIFO queue ──► session worker ──► Agent::on_message
//!                                                              │
//!                         outbox routed in order on Ok ◄───────┘
//! ```
//!
//! Deliveries of one session run strictly one at a time; sessions are
//! drained by separate worker tasks. Agent instances are created lazily,
//! one per `(agent type, session)`, and dropped when the runtime stops.

mod registry;
mod worker;


use crate::agent::{Agent, AgentFactory};
use crate::config::RuntimeConfig;
use crate::error::{handle_lock_poison, Error, Result};
use crate::event_bus::{EventBus, EventStream, RuntimeEvent};
use crate::message::{Envelope, Payload};
use crate::topic::{AgentId, AgentType, Subscription, TopicId};
use registry::Registry;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

type Instance = Arc<tokio::sync::Mutex<Box<dyn Agent>>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Setup,
    Running,
    Stopped,
}

pub(crate) struct Delivery {
    envelope: Arc<Envelope>,
    recipient: AgentId,
}

struct State {
    phase: Phase,
    registry: Registry,
    buffered: Vec<Envelope>,
    workers: HashMap<String, mpsc::UnboundedSender<Delivery>>,
    handles: Vec<JoinHandle<()>>,
    failed_sessions: HashSet<String>,
    fatal: Option<Error>,
}

pub(crate) struct Inner {
    events: EventBus,
    root: CancellationToken,
    state: Mutex<State>,
    instances: Mutex<HashMap<AgentId, Instance>>,
    pending: watch::Sender<usize>,
}

/// Topic-based publish/subscribe runtime
#[derive(Clone)]
pub struct Runtime {
    inner: Arc<Inner>,
}

impl Runtime {
    /// Create a runtime in its setup phase
    #[must_use]
    pub fn new(config: RuntimeConfig) -> Self {
        let (pending, _) = watch::channel(0);
        let inner = Inner {
            events: EventBus::new(config.event_capacity),
            root: CancellationToken::new(),
            state: Mutex::new(State {
                phase: Phase::Setup,
                registry: Registry::default(),
                buffered: Vec::new(),
                workers: HashMap::new(),
                handles: Vec::new(),
                failed_sessions: HashSet::new(),
                fatal: None,
            }),
            instances: Mutex::new(HashMap::new()),
            pending,
        };
        Self {
            inner: Arc::new(inner),
        }
    }

    /// Register a factory under a unique agent type
    pub fn register<F>(&self, agent_type: impl Into<AgentType>, factory: F) -> Result<AgentType>
    where
        F: Fn(&AgentId) -> Box<dyn Agent> + Send + Sync + 'static,
    {
        self.register_factory(agent_type.into(), Arc::new(factory))
    }

    /// Register a shared factory under a unique agent type
    pub fn register_factory(
        &self,
        agent_type: AgentType,
        factory: AgentFactory,
    ) -> Result<AgentType> {
        let mut state = self.setup_state("register an agent type")?;
        state.registry.register(agent_type.clone(), factory)?;
        debug!(agent_type = %agent_type, "Agent type registered");
        Ok(agent_type)
    }

    /// Deliver messages on `subscription.topic_type` to `subscription.agent_type`
    pub fn add_subscription(&self, subscription: Subscription) -> Result<()> {
        let mut state = self.setup_state("add a subscription")?;
        debug!(
            topic_type = %subscription.topic_type,
            agent_type = %subscription.agent_type,
            "Subscription added"
        );
        state.registry.add_subscription(subscription)
    }

    /// Shorthand for [`add_subscription`](Self::add_subscription)
    pub fn subscribe(
        &self,
        topic_type: impl Into<String>,
        agent_type: impl Into<AgentType>,
    ) -> Result<()> {
        self.add_subscription(Subscription::new(topic_type, agent_type))
    }

    /// Whether any agent type listens on `topic_type`
    #[must_use]
    pub fn has_subscribers(&self, topic_type: &str) -> bool {
        self.inner.state().registry.has_subscribers(topic_type)
    }

    /// Stream of every runtime event published from now on
    #[must_use]
    pub fn events(&self) -> EventStream {
        self.inner.events.subscribe()
    }

    /// Stream of the events of one session
    #[must_use]
    pub fn session_events(&self, session: impl Into<String>) -> EventStream {
        self.inner.events.subscribe_session(session)
    }

    /// Publish from outside the runtime under a fresh child of the root token
    pub fn publish(&self, payload: Payload, topic: TopicId) -> Uuid {
        let token = self.inner.root.child_token();
        self.publish_with_token(payload, topic, token)
    }

    /// Publish from outside the runtime under the caller's token
    pub fn publish_with_token(
        &self,
        payload: Payload,
        topic: TopicId,
        cancellation: CancellationToken,
    ) -> Uuid {
        let envelope = Envelope::new(None, topic, payload, cancellation);
        let id = envelope.id;
        self.inner.route(envelope);
        id
    }

    /// Validate the setup and start draining. Must run inside a Tokio runtime.
    pub fn start(&self) -> Result<()> {
        let mut state = self.setup_state("start the runtime")?;
        state.registry.validate()?;
        state.phase = Phase::Running;
        info!(
            agent_types = state.registry.agent_types().len(),
            buffered = state.buffered.len(),
            "Runtime started"
        );
        let buffered = std::mem::take(&mut state.buffered);
        for envelope in buffered {
            self.inner.dispatch(&mut state, envelope);
        }
        Ok(())
    }

    /// Wait until nothing is queued or in flight, then stop.
    ///
    /// Returns the first fatal error any session hit.
    pub async fn stop_when_idle(&self) -> Result<()> {
        if self.inner.lock_state()?.phase == Phase::Setup {
            return Err(Error::Configuration(
                "runtime was never started".to_string(),
            ));
        }

        let mut pending = self.inner.pending.subscribe();
        tokio::select! {
            _ = self.inner.root.cancelled() => {
                debug!("Runtime stopped before becoming idle");
            }
            idle = pending.wait_for(|count| *count == 0) => {
                if idle.is_ok() {
                    info!("Runtime idle");
                    self.inner.events.publish(RuntimeEvent::RuntimeIdle);
                }
            }
        }

        self.shutdown().await;
        match self.inner.lock_state()?.fatal.take() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    /// Cancel every outstanding request and stop without draining
    pub async fn stop(&self) {
        info!("Runtime stop requested");
        self.shutdown().await;
    }

    fn setup_state(&self, action: &str) -> Result<MutexGuard<'_, State>> {
        let state = self.inner.lock_state()?;
        if state.phase != Phase::Setup {
            return Err(Error::Configuration(format!(
                "cannot {} after the runtime started",
                action
            )));
        }
        Ok(state)
    }

    async fn shutdown(&self) {
        self.inner.root.cancel();
        let handles = {
            let mut state = self.inner.state();
            state.phase = Phase::Stopped;
            state.buffered.clear();
            state.workers.clear();
            std::mem::take(&mut state.handles)
        };
        for handle in handles {
            if let Err(e) = handle.await {
                warn!(error = %e, "Session worker ended abnormally");
            }
        }
        let dropped = {
            let mut instances = self
                .inner
                .instances
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            let count = instances.len();
            instances.clear();
            count
        };
        info!(instances = dropped, "Runtime stopped");
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new(RuntimeConfig::default())
    }
}

impl Inner {
    fn lock_state(&self) -> Result<MutexGuard<'_, State>> {
        self.state.lock().map_err(handle_lock_poison)
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn route(self: &Arc<Self>, envelope: Envelope) {
        let mut state = self.state();
        match state.phase {
            Phase::Setup => state.buffered.push(envelope),
            Phase::Running => self.dispatch(&mut state, envelope),
            Phase::Stopped => {
                warn!(topic = %envelope.topic, kind = envelope.payload.kind(), "Runtime stopped, message dropped");
            }
        }
    }

    fn dispatch(self: &Arc<Self>, state: &mut State, envelope: Envelope) {
        let recipients = state
            .registry
            .recipients(&envelope.topic, envelope.sender.as_ref());
        self.events.publish(RuntimeEvent::MessagePublished {
            message_id: envelope.id,
            topic: envelope.topic.clone(),
            kind: envelope.payload.kind(),
            recipients: recipients.len(),
        });

        if recipients.is_empty() {
            if state.registry.has_subscribers(&envelope.topic.topic_type) {
                debug!(topic = %envelope.topic, "Only the sender subscribes, nothing to deliver");
            } else {
                warn!(
                    topic = %envelope.topic,
                    kind = envelope.payload.kind(),
                    "No subscribers, message dropped"
                );
            }
            return;
        }

        debug!(
            topic = %envelope.topic,
            kind = envelope.payload.kind(),
            recipients = recipients.len(),
            "Message published"
        );
        let session = envelope.topic.source.clone();
        let envelope = Arc::new(envelope);
        let queue = self.session_queue(state, session);
        self.pending.send_modify(|count| *count += recipients.len());
        for recipient in recipients {
            let delivery = Delivery {
                envelope: Arc::clone(&envelope),
                recipient,
            };
            if queue.send(delivery).is_err() {
                self.finish_delivery();
            }
        }
    }

    fn session_queue(
        self: &Arc<Self>,
        state: &mut State,
        session: String,
    ) -> mpsc::UnboundedSender<Delivery> {
        if let Some(queue) = state.workers.get(&session) {
            return queue.clone();
        }
        let (queue, receiver) = mpsc::unbounded_channel();
        let handle = tokio::spawn(worker::run(Arc::clone(self), session.clone(), receiver));
        state.handles.push(handle);
        state.workers.insert(session, queue.clone());
        queue
    }

    fn finish_delivery(&self) {
        self.pending
            .send_modify(|count| *count = count.saturating_sub(1));
    }

    fn is_failed(&self, session: &str) -> bool {
        self.state().failed_sessions.contains(session)
    }

    fn fail_session(&self, session: &str, error: Error) {
        let mut state = self.state();
        state.failed_sessions.insert(session.to_string());
        if state.fatal.is_none() {
            state.fatal = Some(error);
        }
    }

    fn instance(&self, id: &AgentId) -> Option<Instance> {
        let mut instances = self.instances.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(existing) = instances.get(id) {
            return Some(Arc::clone(existing));
        }
        let factory = self.state().registry.factory(&id.agent_type)?;
        let instance: Instance = Arc::new(tokio::sync::Mutex::new(factory(id)));
        instances.insert(id.clone(), Arc::clone(&instance));
        debug!(agent = %id, "Agent instance created");
        self.events
            .publish(RuntimeEvent::AgentCreated { agent: id.clone() });
        Some(instance)
    }
}
