use super::chooser::{SelectionContext, SpeakerChooser};
use super::selector::SpeakerSelector;
use super::{ChatResult, Participant};
use crate::agent::{Agent, MessageContext};
use crate::error::{handle_lock_poison, Error, Result};
use crate::event_bus::RuntimeEvent;
use crate::history::ConversationHistory;
use crate::message::{Envelope, Payload};
use crate::termination::{StopReason, Termination};
use parley_llm::Message;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::{debug, info, instrument, warn};

/// Finished chats by session key
pub(crate) type ResultStore = Arc<Mutex<HashMap<String, ChatResult>>>;

/// Team layout shared by every manager instance of one group chat
pub(crate) struct Team {
    pub(crate) group_topic: String,
    pub(crate) participants: Vec<Participant>,
    pub(crate) termination: Option<Termination>,
    pub(crate) selector: Option<Arc<dyn SpeakerSelector>>,
    pub(crate) chooser: Arc<dyn SpeakerChooser>,
    pub(crate) allow_repeated_speaker: bool,
    pub(crate) max_turns: usize,
    pub(crate) results: ResultStore,
}

/// Runs the speaker selection loop of one session
pub struct GroupChatManager {
    team: Arc<Team>,
    history: ConversationHistory,
    awaiting: Option<String>,
    previous: Option<String>,
    last_chosen: Option<String>,
    turns: usize,
    finished: bool,
}

impl GroupChatManager {
    pub(crate) fn new(team: Arc<Team>) -> Self {
        Self {
            team,
            history: ConversationHistory::new(),
            awaiting: None,
            previous: None,
            last_chosen: None,
            turns: 0,
            finished: false,
        }
    }

    /// Shared history so far
    #[must_use]
    pub fn history(&self) -> &ConversationHistory {
        &self.history
    }

    /// Speaker whose reply is pending
    #[must_use]
    pub fn awaiting(&self) -> Option<&str> {
        self.awaiting.as_deref()
    }

    fn is_participant(&self, name: &str) -> bool {
        self.team.participants.iter().any(|p| p.name == name)
    }

    fn eligible(&self) -> Vec<String> {
        let names = self.team.participants.iter().map(|p| &p.name);
        if self.team.allow_repeated_speaker || self.team.participants.len() == 1 {
            return names.cloned().collect();
        }
        names
            .filter(|name| self.previous.as_ref() != Some(*name))
            .cloned()
            .collect()
    }

    async fn handle_chat(
        &mut self,
        envelope: &Envelope,
        message: &Message,
        ctx: &mut MessageContext,
    ) -> Result<()> {
        let sender = envelope.sender_type();
        let awaiting = self.awaiting.clone();
        match (awaiting.as_deref(), sender) {
            (Some(expected), Some(sender)) if expected == sender => {
                self.awaiting = None;
                self.previous = Some(sender.to_string());
                self.history.push(message.clone().from_source(sender));
                self.step(ctx).await
            }
            (Some(expected), _) => Err(Error::Protocol(format!(
                "expected a reply from {}, got one from {}",
                expected,
                sender.unwrap_or("outside the runtime")
            ))),
            (None, Some(sender)) if self.is_participant(sender) => Err(Error::Protocol(format!(
                "{} spoke without being asked",
                sender
            ))),
            (None, _) if self.finished => {
                warn!(session = %ctx.session(), "Task for a finished chat ignored");
                Ok(())
            }
            (None, _) => {
                info!(session = %ctx.session(), "Group chat started");
                self.history.push(message.clone());
                self.step(ctx).await
            }
        }
    }

    fn handle_failed_turn(&mut self, source: &str, error: &str) -> Result<()> {
        if self.awaiting.as_deref() != Some(source) {
            return Err(Error::Protocol(format!(
                "diagnostic from {} while waiting for {}",
                source,
                self.awaiting.as_deref().unwrap_or("nobody")
            )));
        }
        warn!(speaker = %source, error = %error, "Turn failed");
        self.awaiting = None;
        self.previous = Some(source.to_string());
        Ok(())
    }

    /// Check termination, then hand the floor to the next speaker
    async fn step(&mut self, ctx: &mut MessageContext) -> Result<()> {
        if let Some(reason) = self
            .team
            .termination
            .as_ref()
            .and_then(|t| t.evaluate(self.history.turns()))
        {
            return self.finish(reason, ctx);
        }
        self.select_next(ctx).await
    }

    #[instrument(skip(self, ctx), fields(session = %ctx.session(), turn = self.turns + 1))]
    async fn select_next(&mut self, ctx: &mut MessageContext) -> Result<()> {
        if self.turns >= self.team.max_turns {
            let reason = StopReason::MaxTurns {
                limit: self.team.max_turns,
            };
            return self.finish(reason, ctx);
        }

        let (speaker, by_override) = self.select(ctx).await?;
        ctx.check_cancelled()?;
        self.turns += 1;
        if !by_override {
            self.last_chosen = Some(speaker.clone());
        }
        debug!(speaker = %speaker, by_override, "Speaker selected");
        ctx.publish(Payload::RequestToSpeak, &speaker);
        ctx.emit(RuntimeEvent::SpeakerSelected {
            session: ctx.session().to_string(),
            speaker: speaker.clone(),
            turn: self.turns,
            by_override,
        });
        self.awaiting = Some(speaker);
        Ok(())
    }

    async fn select(&self, ctx: &MessageContext) -> Result<(String, bool)> {
        if let Some(selector) = &self.team.selector {
            if let Some(name) = selector.select(&self.history, &self.team.participants) {
                if !self.is_participant(&name) {
                    return Err(Error::Protocol(format!(
                        "selector named '{}', which is not a participant",
                        name
                    )));
                }
                return Ok((name, true));
            }
        }

        let context = SelectionContext {
            history: self.history.to_vec(),
            participants: self.team.participants.clone(),
            eligible: self.eligible(),
            previous: self.previous.clone(),
            last_chosen: self.last_chosen.clone(),
        };
        let name = match self.team.chooser.choose(&context, ctx.cancellation()).await {
            Ok(name) if context.eligible.contains(&name) => name,
            Ok(name) => {
                warn!(speaker = %name, "Chooser picked an ineligible speaker");
                context.round_robin()
            }
            Err(e) if e.is_cancelled() => return Err(e),
            Err(e) => {
                warn!(error = %e, "Chooser failed");
                context.round_robin()
            }
        };
        Ok((name, false))
    }

    fn finish(&mut self, reason: StopReason, ctx: &mut MessageContext) -> Result<()> {
        info!(
            session = %ctx.session(),
            turns = self.turns,
            reason = %reason,
            "Group chat finished"
        );
        self.finished = true;
        ctx.publish(Payload::Terminated(reason.clone()), &self.team.group_topic);
        ctx.emit(RuntimeEvent::ChatTerminated {
            session: ctx.session().to_string(),
            reason: reason.to_string(),
        });

        let result = ChatResult {
            messages: self.history.to_vec(),
            stop_reason: reason,
            finished_at: chrono::Utc::now(),
        };
        self.team
            .results
            .lock()
            .map_err(handle_lock_poison)?
            .insert(ctx.session().to_string(), result);
        Ok(())
    }
}

#[async_trait::async_trait]
impl Agent for GroupChatManager {
    async fn on_message(&mut self, envelope: &Envelope, ctx: &mut MessageContext) -> Result<()> {
        match &envelope.payload {
            Payload::Chat(message) => self.handle_chat(envelope, message, ctx).await,
            Payload::Diagnostic(diagnostic) => {
                self.handle_failed_turn(&diagnostic.source, &diagnostic.error)?;
                self.select_next(ctx).await
            }
            other => Err(Error::Protocol(format!(
                "group chat manager cannot handle {} messages",
                other.kind()
            ))),
        }
    }
}
