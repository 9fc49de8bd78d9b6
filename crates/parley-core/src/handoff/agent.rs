use super::HandoffState;
use crate::agent::{Agent, MessageContext};
use crate::decision::{DecisionLoop, Outcome};
use crate::error::{Error, Result};
use crate::event_bus::RuntimeEvent;
use crate::history::ConversationHistory;
use crate::message::{Diagnostic, Envelope, Payload, Reply, Transfer};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Generic handoff agent: runs its decide-act loop on every transfer it
/// receives and answers the user, delegates, or reports a failed turn
pub struct HandoffAgent {
    decision: Arc<DecisionLoop>,
    user_topic: String,
    max_hops: u32,
    history: ConversationHistory,
    state: HandoffState,
}

impl HandoffAgent {
    /// Create an instance
    #[must_use]
    pub fn new(decision: Arc<DecisionLoop>, user_topic: impl Into<String>, max_hops: u32) -> Self {
        Self {
            decision,
            user_topic: user_topic.into(),
            max_hops,
            history: ConversationHistory::new(),
            state: HandoffState::Idle,
        }
    }

    /// Current state
    #[must_use]
    pub fn state(&self) -> HandoffState {
        self.state
    }

    /// Conversation as this agent last committed it
    #[must_use]
    pub fn history(&self) -> &ConversationHistory {
        &self.history
    }

    fn name(&self) -> &str {
        self.decision.name()
    }

    fn reply_to_user(&mut self, ctx: &mut MessageContext) {
        let reply = Reply {
            reply_to: self.name().to_string(),
            context: self.history.to_vec(),
        };
        ctx.publish(Payload::Reply(reply), &self.user_topic);
        self.state = HandoffState::AwaitingUser;
    }

    fn report(&mut self, error: String, ctx: &mut MessageContext) {
        let diagnostic = Diagnostic {
            source: self.name().to_string(),
            reply_to: self.name().to_string(),
            error,
        };
        ctx.publish(Payload::Diagnostic(diagnostic), &self.user_topic);
    }

    async fn handle_transfer(&mut self, transfer: &Transfer, ctx: &mut MessageContext) -> Result<()> {
        ctx.check_cancelled()?;
        debug!(
            agent = %self.name(),
            turns = transfer.context.len(),
            hops = transfer.hops,
            "Transfer received"
        );

        let mut working = ConversationHistory::from(transfer.context.clone());
        let decision = Arc::clone(&self.decision);
        let state = &mut self.state;
        let outcome = decision
            .run(&mut working, ctx.cancellation(), |phase| *state = phase.into())
            .await;

        match outcome {
            Ok(Outcome::Reply(_)) => {
                self.history = working;
                self.reply_to_user(ctx);
            }
            Ok(Outcome::Delegated { target }) if target == self.user_topic => {
                self.history = working;
                self.reply_to_user(ctx);
            }
            Ok(Outcome::Delegated { target }) => {
                let hops = transfer.hops + 1;
                if hops > self.max_hops {
                    self.state = HandoffState::Terminated;
                    return Err(Error::Protocol(format!(
                        "{} exceeded {} delegations handing off to {}",
                        self.name(),
                        self.max_hops,
                        target
                    )));
                }
                self.history = working;
                info!(from = %self.name(), to = %target, hops, "Handing off conversation");
                ctx.publish(
                    Payload::Transfer(Transfer {
                        context: self.history.to_vec(),
                        hops,
                    }),
                    &target,
                );
                ctx.emit(RuntimeEvent::HandoffPerformed {
                    session: ctx.session().to_string(),
                    from: self.name().to_string(),
                    to: target,
                    hops,
                });
                self.state = HandoffState::Delegated;
            }
            Ok(Outcome::Exhausted) => {
                self.history = working;
                warn!(agent = %self.name(), "Giving up on this conversation");
                self.report(
                    format!("{} could not finish the request", self.name()),
                    ctx,
                );
                self.state = HandoffState::Terminated;
            }
            Err(e) if e.is_capability() => {
                self.history = ConversationHistory::from(transfer.context.clone());
                warn!(agent = %self.name(), error = %e, "Turn failed");
                self.report(e.to_string(), ctx);
                self.state = HandoffState::AwaitingUser;
            }
            Err(e) => {
                self.state = HandoffState::Idle;
                return Err(e);
            }
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl Agent for HandoffAgent {
    async fn on_message(&mut self, envelope: &Envelope, ctx: &mut MessageContext) -> Result<()> {
        match &envelope.payload {
            Payload::Transfer(transfer) => self.handle_transfer(transfer, ctx).await,
            other => Err(Error::Protocol(format!(
                "{} cannot handle {} messages",
                self.name(),
                other.kind()
            ))),
        }
    }
}
