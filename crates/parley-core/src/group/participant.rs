use crate::agent::{Agent, MessageContext};
use crate::console::SharedConsole;
use crate::decision::{DecisionLoop, Outcome};
use crate::error::{Error, Result};
use crate::history::ConversationHistory;
use crate::message::{Diagnostic, Envelope, Payload};
use parley_llm::Message;
use std::sync::Arc;
use tracing::{debug, warn};

/// Reasoning participant.
///
/// Keeps its own copy of every group turn and runs the decide-act loop when
/// the manager hands it the floor. A delegation becomes a group turn with
/// `handoff_to` set.
pub struct ChatParticipant {
    decision: Arc<DecisionLoop>,
    group_topic: String,
    history: ConversationHistory,
}

impl ChatParticipant {
    /// Create a participant publishing to `group_topic`
    #[must_use]
    pub fn new(decision: Arc<DecisionLoop>, group_topic: impl Into<String>) -> Self {
        Self {
            decision,
            group_topic: group_topic.into(),
            history: ConversationHistory::new(),
        }
    }

    /// Private copy of the conversation
    #[must_use]
    pub fn history(&self) -> &ConversationHistory {
        &self.history
    }

    fn name(&self) -> &str {
        self.decision.name()
    }

    fn fail_turn(&self, error: String, ctx: &mut MessageContext) {
        ctx.publish(
            Payload::Diagnostic(Diagnostic {
                source: self.name().to_string(),
                reply_to: self.name().to_string(),
                error,
            }),
            &self.group_topic,
        );
    }

    async fn speak(&mut self, ctx: &mut MessageContext) -> Result<()> {
        ctx.check_cancelled()?;

        let mut working = self.history.clone();
        let persona = working.len();
        working.push(
            Message::user(format!(
                "Transferred to {}, adopt the persona immediately.",
                self.name()
            ))
            .from_source("system"),
        );

        let outcome = self
            .decision
            .run(&mut working, ctx.cancellation(), |_| {})
            .await;
        let produced: Vec<Message> = working.turns().iter().skip(persona + 1).cloned().collect();

        match outcome {
            Ok(Outcome::Reply(text)) => {
                self.history.extend(produced);
                let turn = Message::assistant(text).from_source(self.name());
                ctx.publish(Payload::Chat(turn), &self.group_topic);
            }
            Ok(Outcome::Delegated { target }) => {
                self.history.extend(produced);
                debug!(from = %self.name(), to = %target, "Handing off the floor");
                let turn = Message::assistant(format!("Transferred to {}.", target))
                    .from_source(self.name())
                    .with_handoff(target);
                ctx.publish(Payload::Chat(turn), &self.group_topic);
            }
            Ok(Outcome::Exhausted) => {
                self.history.extend(produced);
                self.fail_turn(format!("{} could not finish its turn", self.name()), ctx);
            }
            Err(e) if e.is_capability() => {
                warn!(participant = %self.name(), error = %e, "Turn failed");
                self.fail_turn(e.to_string(), ctx);
            }
            Err(e) => return Err(e),
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl Agent for ChatParticipant {
    async fn on_message(&mut self, envelope: &Envelope, ctx: &mut MessageContext) -> Result<()> {
        match &envelope.payload {
            Payload::Chat(message) => {
                self.history.push(message.clone());
                Ok(())
            }
            Payload::RequestToSpeak => self.speak(ctx).await,
            Payload::Diagnostic(_) => Ok(()),
            Payload::Terminated(reason) => {
                debug!(participant = %self.name(), reason = %reason, "Chat finished");
                Ok(())
            }
            other => Err(Error::Protocol(format!(
                "{} cannot handle {} messages",
                self.name(),
                other.kind()
            ))),
        }
    }
}

/// Participant whose turns are typed at a console
pub struct UserProxyParticipant {
    name: String,
    group_topic: String,
    console: SharedConsole,
}

impl UserProxyParticipant {
    /// Create a proxy named `name`
    #[must_use]
    pub fn new(name: impl Into<String>, group_topic: impl Into<String>, console: SharedConsole) -> Self {
        Self {
            name: name.into(),
            group_topic: group_topic.into(),
            console,
        }
    }

    async fn speak(&self, ctx: &mut MessageContext) -> Result<()> {
        let prompt = format!("{}: ", self.name);
        let answer = self.console.read(&prompt, ctx.cancellation()).await;
        ctx.check_cancelled()?;

        match answer {
            Some(text) => {
                let turn = Message::user(text).from_source(&self.name);
                ctx.publish(Payload::Chat(turn), &self.group_topic);
            }
            None => {
                ctx.publish(
                    Payload::Diagnostic(Diagnostic {
                        source: self.name.clone(),
                        reply_to: self.name.clone(),
                        error: format!("no input from {}", self.name),
                    }),
                    &self.group_topic,
                );
            }
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl Agent for UserProxyParticipant {
    async fn on_message(&mut self, envelope: &Envelope, ctx: &mut MessageContext) -> Result<()> {
        match &envelope.payload {
            Payload::Chat(message) => {
                let speaker = message.source().unwrap_or(message.role.as_str());
                self.console.display(speaker, &message.content);
                Ok(())
            }
            Payload::RequestToSpeak => self.speak(ctx).await,
            Payload::Diagnostic(diagnostic) => {
                self.console
                    .display(&diagnostic.source, &format!("Error: {}", diagnostic.error));
                Ok(())
            }
            Payload::Terminated(reason) => {
                self.console.display("system", &reason.to_string());
                Ok(())
            }
            other => Err(Error::Protocol(format!(
                "{} cannot handle {} messages",
                self.name,
                other.kind()
            ))),
        }
    }
}
