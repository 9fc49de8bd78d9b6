use crate::agent::{Agent, MessageContext};
use crate::console::SharedConsole;
use crate::error::{Error, Result};
use crate::message::{Diagnostic, Envelope, Payload, Reply, Transfer};
use parley_llm::Message;
use tracing::warn;

/// Escalation target answered by a person instead of a reasoner
pub struct HumanAgent {
    name: String,
    user_topic: String,
    console: SharedConsole,
}

impl HumanAgent {
    /// Create a human agent replying to `user_topic`
    #[must_use]
    pub fn new(name: impl Into<String>, user_topic: impl Into<String>, console: SharedConsole) -> Self {
        Self {
            name: name.into(),
            user_topic: user_topic.into(),
            console,
        }
    }

    async fn handle_transfer(&self, transfer: &Transfer, ctx: &mut MessageContext) -> Result<()> {
        if let Some(last) = transfer.context.last() {
            let speaker = last.source().unwrap_or("conversation");
            self.console.display(speaker, &last.content);
        }

        let prompt = format!("{} (human): ", self.name);
        let Some(answer) = self.console.read(&prompt, ctx.cancellation()).await else {
            ctx.check_cancelled()?;
            warn!(agent = %self.name, "No human answer");
            ctx.publish(
                Payload::Diagnostic(Diagnostic {
                    source: self.name.clone(),
                    reply_to: self.name.clone(),
                    error: "no human agent answered".to_string(),
                }),
                &self.user_topic,
            );
            return Ok(());
        };
        ctx.check_cancelled()?;

        let mut context = transfer.context.clone();
        context.push(Message::assistant(answer).from_source(&self.name));
        ctx.publish(
            Payload::Reply(Reply {
                reply_to: self.name.clone(),
                context,
            }),
            &self.user_topic,
        );
        Ok(())
    }
}

#[async_trait::async_trait]
impl Agent for HumanAgent {
    async fn on_message(&mut self, envelope: &Envelope, ctx: &mut MessageContext) -> Result<()> {
        match &envelope.payload {
            Payload::Transfer(transfer) => self.handle_transfer(transfer, ctx).await,
            other => Err(Error::Protocol(format!(
                "{} cannot handle {} messages",
                self.name,
                other.kind()
            ))),
        }
    }
}
