//! Runtime events
//!
//! The runtime and the agents it hosts report what they do here so that the
//! CLI, tests and any other observer can follow a session without touching
//! agent state. Events go out on a bounded broadcast channel sized by
//! `RuntimeConfig::event_capacity`; a stream that falls behind loses the
//! oldest events and counts them instead of slowing the runtime down.

/// Event type definitions.
pub mod types;

pub use types::RuntimeEvent;


use tokio::sync::broadcast::{self, error::RecvError, error::TryRecvError};
use tracing::trace;

/// Publishing side of the runtime events
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<RuntimeEvent>,
}

impl EventBus {
    /// Bus holding at most `capacity` unread events per stream
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Every future event of every session
    #[must_use]
    pub fn subscribe(&self) -> EventStream {
        EventStream {
            receiver: self.sender.subscribe(),
            session: None,
            missed: 0,
        }
    }

    /// Future events of `session`, plus runtime-wide ones such as
    /// [`RuntimeEvent::RuntimeIdle`]
    #[must_use]
    pub fn subscribe_session(&self, session: impl Into<String>) -> EventStream {
        EventStream {
            receiver: self.sender.subscribe(),
            session: Some(session.into()),
            missed: 0,
        }
    }

    /// Number of streams that will see `event`
    pub fn publish(&self, event: RuntimeEvent) -> usize {
        match self.sender.send(event) {
            Ok(streams) => streams,
            Err(broadcast::error::SendError(event)) => {
                trace!(?event, "No event streams open");
                0
            }
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

/// Receiving side of the runtime events, optionally narrowed to one session
#[derive(Debug)]
pub struct EventStream {
    receiver: broadcast::Receiver<RuntimeEvent>,
    session: Option<String>,
    missed: u64,
}

impl EventStream {
    /// Next matching event; `None` once the runtime is gone
    pub async fn recv(&mut self) -> Option<RuntimeEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) if self.wants(&event) => return Some(event),
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => self.missed += skipped,
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Next matching event already published, without waiting
    pub fn try_recv(&mut self) -> Option<RuntimeEvent> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) if self.wants(&event) => return Some(event),
                Ok(_) => {}
                Err(TryRecvError::Lagged(skipped)) => self.missed += skipped,
                Err(TryRecvError::Empty | TryRecvError::Closed) => return None,
            }
        }
    }

    /// Events this stream lost by falling behind, matching or not
    #[must_use]
    pub fn missed(&self) -> u64 {
        self.missed
    }

    /// Session this stream is narrowed to
    #[must_use]
    pub fn session(&self) -> Option<&str> {
        self.session.as_deref()
    }

    fn wants(&self, event: &RuntimeEvent) -> bool {
        match (&self.session, event.session()) {
            (Some(wanted), Some(session)) => wanted == session,
            _ => true,
        }
    }
}
