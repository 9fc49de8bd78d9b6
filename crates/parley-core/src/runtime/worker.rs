//! Session worker: drains one session's queue, one delivery at a time

use super::{Delivery, Inner};
use crate::agent::MessageContext;
use crate::event_bus::RuntimeEvent;
use crate::message::Envelope;
use crate::topic::AgentId;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinError;
use tracing::{debug, error, instrument};

pub(super) async fn run(
    inner: Arc<Inner>,
    session: String,
    mut queue: mpsc::UnboundedReceiver<Delivery>,
) {
    debug!(session = %session, "Session worker started");
    loop {
        let delivery = tokio::select! {
            biased;
            _ = inner.root.cancelled() => break,
            next = queue.recv() => match next {
                Some(delivery) => delivery,
                None => break,
            },
        };
        inner.deliver(delivery).await;
        inner.finish_delivery();
    }
    debug!(session = %session, "Session worker stopped");
}

impl Inner {
    #[instrument(
        skip(self, delivery),
        fields(agent = %delivery.recipient, message = %delivery.envelope.id)
    )]
    async fn deliver(self: &Arc<Self>, delivery: Delivery) {
        let Delivery {
            envelope,
            recipient,
        } = delivery;

        if self.is_failed(envelope.session()) {
            self.skip(&envelope, &recipient, "session stopped after a fatal error");
            return;
        }
        if envelope.cancellation.is_cancelled() {
            self.skip(&envelope, &recipient, "request cancelled");
            return;
        }

        let Some(instance) = self.instance(&recipient) else {
            error!(agent = %recipient, "No factory for agent type");
            self.events.publish(RuntimeEvent::DeliveryFailed {
                message_id: envelope.id,
                agent: recipient,
                error: "no factory for agent type".to_string(),
                fatal: false,
            });
            return;
        };

        debug!(kind = envelope.payload.kind(), "Delivering message");
        let mut ctx = MessageContext::new(
            recipient.clone(),
            envelope.cancellation.clone(),
            self.events.clone(),
        );
        // The handler runs on its own task so a panic stays inside it
        let handler = tokio::spawn({
            let envelope = Arc::clone(&envelope);
            async move {
                let mut agent = instance.lock_owned().await;
                let result = agent.on_message(&envelope, &mut ctx).await;
                (result, ctx)
            }
        });
        let (result, ctx) = match handler.await {
            Ok(finished) => finished,
            Err(e) => {
                let description = handler_crash(e);
                error!(agent = %recipient, error = %description, "Handler crashed");
                self.events.publish(RuntimeEvent::DeliveryFailed {
                    message_id: envelope.id,
                    agent: recipient,
                    error: description,
                    fatal: false,
                });
                return;
            }
        };

        match result {
            Ok(()) => {
                for outgoing in ctx.into_outbox() {
                    self.route(Envelope::new(
                        Some(recipient.clone()),
                        outgoing.topic,
                        outgoing.payload,
                        envelope.cancellation.clone(),
                    ));
                }
                self.events.publish(RuntimeEvent::DeliveryCompleted {
                    message_id: envelope.id,
                    agent: recipient,
                });
            }
            Err(e) if e.is_cancelled() => {
                debug!(agent = %recipient, "Handler cancelled");
                self.skip(&envelope, &recipient, "cancelled while handling");
            }
            Err(e) => {
                let fatal = e.is_fatal();
                let description = e.to_string();
                error!(agent = %recipient, error = %description, fatal, "Delivery failed");
                if fatal {
                    self.fail_session(envelope.session(), e);
                }
                self.events.publish(RuntimeEvent::DeliveryFailed {
                    message_id: envelope.id,
                    agent: recipient,
                    error: description,
                    fatal,
                });
            }
        }
    }

    fn skip(&self, envelope: &Envelope, recipient: &AgentId, reason: &str) {
        debug!(agent = %recipient, reason, "Delivery skipped");
        self.events.publish(RuntimeEvent::DeliverySkipped {
            message_id: envelope.id,
            agent: recipient.clone(),
            reason: reason.to_string(),
        });
    }
}

fn handler_crash(error: JoinError) -> String {
    if !error.is_panic() {
        return format!("handler aborted: {}", error);
    }
    let panic = error.into_panic();
    let message = panic
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "non-string payload".to_string());
    format!("handler panicked: {}", message)
}
