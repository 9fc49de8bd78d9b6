use crate::agent::{Agent, MessageContext};
use crate::console::SharedConsole;
use crate::error::{Error, Result};
use crate::history::ConversationHistory;
use crate::message::{Diagnostic, Envelope, Payload, Reply, Transfer};
use parley_llm::Message;
use tracing::{debug, info};

/// Proxy for the person at the console.
///
/// Starts a session on `Login`, shows every answer, and sends the next
/// input back to whichever agent answered. Delegation hops reset here.
pub struct UserAgent {
    name: String,
    entry_topic: String,
    console: SharedConsole,
    context: ConversationHistory,
}

impl UserAgent {
    /// Create a user agent that opens sessions with `entry_topic`
    #[must_use]
    pub fn new(name: impl Into<String>, entry_topic: impl Into<String>, console: SharedConsole) -> Self {
        Self {
            name: name.into(),
            entry_topic: entry_topic.into(),
            console,
            context: ConversationHistory::new(),
        }
    }

    /// Read the next input and send the context to `topic_type`
    async fn ask_and_send(&mut self, topic_type: &str, ctx: &mut MessageContext) -> Result<()> {
        let prompt = format!("{}: ", self.name);
        let Some(input) = self.console.read(&prompt, ctx.cancellation()).await else {
            info!(session = %ctx.session(), "User ended the session");
            return Ok(());
        };
        ctx.check_cancelled()?;

        self.context
            .push(Message::user(input).from_source(&self.name));
        ctx.publish(
            Payload::Transfer(Transfer {
                context: self.context.to_vec(),
                hops: 0,
            }),
            topic_type,
        );
        Ok(())
    }

    fn show_reply(&self, reply: &Reply) {
        let context = ConversationHistory::from(reply.context.clone());
        if let Some(answer) = context.last_answer() {
            let speaker = answer.source().unwrap_or(&reply.reply_to);
            self.console.display(speaker, &answer.content);
        }
    }

    fn show_diagnostic(&self, diagnostic: &Diagnostic) {
        self.console
            .display(&diagnostic.source, &format!("Error: {}", diagnostic.error));
    }
}

#[async_trait::async_trait]
impl Agent for UserAgent {
    async fn on_message(&mut self, envelope: &Envelope, ctx: &mut MessageContext) -> Result<()> {
        match &envelope.payload {
            Payload::Login => {
                debug!(session = %ctx.session(), "User logged in");
                let entry = self.entry_topic.clone();
                self.ask_and_send(&entry, ctx).await
            }
            Payload::Reply(reply) => {
                self.show_reply(reply);
                self.context.replace(reply.context.clone());
                self.ask_and_send(&reply.reply_to, ctx).await
            }
            Payload::Diagnostic(diagnostic) => {
                self.show_diagnostic(diagnostic);
                self.ask_and_send(&diagnostic.reply_to, ctx).await
            }
            other => Err(Error::Protocol(format!(
                "{} cannot handle {} messages",
                self.name,
                other.kind()
            ))),
        }
    }
}
