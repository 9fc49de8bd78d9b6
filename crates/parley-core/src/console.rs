//! Console capability used by user and human proxy agents

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};
use tokio_util::sync::CancellationToken;

/// Where proxy agents show turns and read answers
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait UserConsole: Send + Sync {
    /// Show a turn to the person at the console
    fn display(&self, speaker: &str, text: &str);

    /// Read the next answer; `None` ends the session
    async fn read(&self, prompt: &str, cancel: &CancellationToken) -> Option<String>;
}

/// Console shared between agent instances
pub type SharedConsole = Arc<dyn UserConsole>;

/// Console that answers from a script and records what it was shown
#[derive(Debug, Clone, Default)]
pub struct ScriptedConsole {
    inputs: Arc<Mutex<VecDeque<String>>>,
    displayed: Arc<Mutex<Vec<(String, String)>>>,
}

impl ScriptedConsole {
    /// Create a console that answers with `inputs`, in order
    pub fn new<I, S>(inputs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            inputs: Arc::new(Mutex::new(inputs.into_iter().map(Into::into).collect())),
            displayed: Arc::default(),
        }
    }

    /// Queue another answer
    pub fn push_input(&self, input: impl Into<String>) {
        self.inputs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(input.into());
    }

    /// Everything displayed so far as `(speaker, text)`
    #[must_use]
    pub fn displayed(&self) -> Vec<(String, String)> {
        self.displayed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Answers not yet consumed
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.inputs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

#[async_trait::async_trait]
impl UserConsole for ScriptedConsole {
    fn display(&self, speaker: &str, text: &str) {
        self.displayed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((speaker.to_string(), text.to_string()));
    }

    async fn read(&self, _prompt: &str, cancel: &CancellationToken) -> Option<String> {
        if cancel.is_cancelled() {
            return None;
        }
        self.inputs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_scripted_console() {
        let console = ScriptedConsole::new(["I want a refund"]);
        let cancel = CancellationToken::new();

        console.display("TriageAgent", "How can I help?");
        assert_eq!(
            console.read("User: ", &cancel).await.as_deref(),
            Some("I want a refund")
        );
        assert_eq!(console.read("User: ", &cancel).await, None);
        assert_eq!(
            console.displayed(),
            vec![("TriageAgent".to_string(), "How can I help?".to_string())]
        );
    }

    #[tokio::test]
    async fn test_cancelled_read() {
        let console = ScriptedConsole::new(["unused"]);
        let cancel = CancellationToken::new();
        cancel.cancel();
        assert_eq!(console.read("User: ", &cancel).await, None);
        assert_eq!(console.remaining(), 1);
    }
}
