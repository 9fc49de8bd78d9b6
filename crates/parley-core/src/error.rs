//! Error types for parley-core
//!
//! Errors are classified for the runtime: fatal ones stop a session,
//! capability ones fail a single turn, cancellation unwinds quietly.

use thiserror::Error;

/// Core error type
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid setup (registration, subscriptions, team layout)
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A message or decision broke the protocol between agents
    #[error("protocol error: {0}")]
    Protocol(String),

    /// A collaborator failed for this turn
    #[error("capability error: {0}")]
    Capability(String),

    /// Work was cancelled through its token
    #[error("cancelled")]
    Cancelled,

    /// Reasoning error
    #[error("reasoner error: {0}")]
    Llm(#[from] parley_llm::Error),

    /// Tool error
    #[error("tool error: {0}")]
    Tool(#[from] parley_tools::Error),

    /// Internal error
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Whether the error must stop the session it happened in
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Protocol(_) | Self::Configuration(_))
    }

    /// Whether the error is a cancellation, directly or from a collaborator
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(
            self,
            Self::Cancelled
                | Self::Llm(parley_llm::Error::Cancelled)
                | Self::Tool(parley_tools::Error::Cancelled)
        )
    }

    /// Whether a collaborator failed and the turn can be reported and skipped
    #[must_use]
    pub fn is_capability(&self) -> bool {
        !self.is_cancelled()
            && matches!(
                self,
                Self::Capability(_) | Self::Llm(_) | Self::Tool(_)
            )
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

pub(crate) fn handle_lock_poison<T>(e: std::sync::PoisonError<T>) -> Error {
    Error::Internal(format!("Lock poisoned: {}", e))
}

/// Trait for user-friendly error messages
pub trait UserFriendlyError {
    /// Get a user-friendly error message
    fn user_message(&self) -> String;

    /// Get a suggestion for how to fix the error
    fn suggestion(&self) -> Option<String>;
}

impl UserFriendlyError for Error {
    fn user_message(&self) -> String {
        match self {
            Error::Configuration(msg) => format!("⚙️ Configuration error: {}", msg),
            Error::Protocol(msg) => format!("🔀 Agents broke protocol: {}", msg),
            Error::Capability(msg) => format!("⚡ A step failed: {}", msg),
            Error::Cancelled => "🛑 The request was cancelled.".to_string(),
            Error::Llm(e) => format!("🤖 Reasoner error: {}", e),
            Error::Tool(e) => format!("🔧 Tool error: {}", e),
            Error::Internal(msg) => format!("❌ Internal error: {}", msg),
        }
    }

    fn suggestion(&self) -> Option<String> {
        match self {
            Error::Configuration(_) => Some(
                "💡 Check the agent and team settings in config/default.toml or PARLEY_* variables."
                    .to_string(),
            ),
            Error::Protocol(_) => Some(
                "💡 Check the delegate targets, tool lists and hop limits of the agents involved."
                    .to_string(),
            ),
            Error::Llm(e) if e.is_transient() => {
                Some("💡 Wait a moment and send the message again.".to_string())
            }
            Error::Tool(_) => Some("💡 Check the tool parameters and try again.".to_string()),
            _ => None,
        }
    }
}

/// Format an error for display in the CLI
pub fn format_error_for_cli(error: &Error) -> String {
    let mut output = String::new();

    output.push_str(&error.user_message());
    output.push_str("\n\n");

    if let Some(suggestion) = error.suggestion() {
        output.push_str(&suggestion);
        output.push('\n');
    }

    output
}

/// Format an error for display in a chat turn
pub fn format_error_for_chat(error: &Error) -> String {
    let mut output = error.user_message();

    if let Some(suggestion) = error.suggestion() {
        output.push_str("\n\n");
        output.push_str(&suggestion);
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        assert!(Error::Protocol("bad".into()).is_fatal());
        assert!(Error::Configuration("bad".into()).is_fatal());
        assert!(!Error::Capability("down".into()).is_fatal());

        assert!(Error::Cancelled.is_cancelled());
        assert!(Error::Llm(parley_llm::Error::Cancelled).is_cancelled());
        assert!(Error::Tool(parley_tools::Error::Cancelled).is_cancelled());

        assert!(Error::Llm(parley_llm::Error::RateLimit).is_capability());
        assert!(Error::Tool(parley_tools::Error::Timeout(100)).is_capability());
        assert!(!Error::Tool(parley_tools::Error::Cancelled).is_capability());
        assert!(!Error::Protocol("bad".into()).is_capability());
    }

    #[test]
    fn test_protocol_message() {
        let error = Error::Protocol("unknown delegate 'transfer_to_moon'".to_string());
        let msg = error.user_message();
        assert!(msg.contains("transfer_to_moon"));
        assert!(error.suggestion().unwrap().contains("delegate targets"));
    }

    #[test]
    fn test_format_error_for_cli() {
        let error = Error::Configuration("agent type 'Sales' registered twice".to_string());
        let output = format_error_for_cli(&error);
        assert!(output.contains("Sales"));
        assert!(output.contains("config/default.toml"));
    }

    #[test]
    fn test_format_error_for_chat() {
        let error = Error::Llm(parley_llm::Error::RateLimit);
        let output = format_error_for_chat(&error);
        assert!(output.contains("rate limit"));
        assert!(output.contains("Wait a moment"));

        let cancelled = format_error_for_chat(&Error::Cancelled);
        assert_eq!(cancelled, "🛑 The request was cancelled.");
    }
}
