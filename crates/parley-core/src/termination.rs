//! Termination conditions
//!
//! A [`Termination`] is a predicate over the accumulated conversation. Every
//! built-in condition is monotonic: once it holds for a history it holds for
//! every extension of that history, and `&` / `|` preserve this.
//!
//! ```text
//! let stop = Termination::handoff("user") | Termination::text_mention("TERMINATE");
//! ```

use parley_llm::Message;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{BitAnd, BitOr};

/// Composable stop condition for group chats
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Termination {
    /// Stop once the history holds at least this many messages
    MaxMessages(usize),
    /// Stop once any message contains the text
    TextMention(String),
    /// Stop once any message hands control to the target
    Handoff(String),
    /// Stop once any of the named sources has spoken
    SourceMatch(Vec<String>),
    /// Stop when both conditions hold
    And(Box<Termination>, Box<Termination>),
    /// Stop when either condition holds
    Or(Box<Termination>, Box<Termination>),
}

impl Termination {
    /// `MaxMessages(limit)`
    #[must_use]
    pub fn max_messages(limit: usize) -> Self {
        Self::MaxMessages(limit)
    }

    /// `TextMention(text)`
    #[must_use]
    pub fn text_mention(text: impl Into<String>) -> Self {
        Self::TextMention(text.into())
    }

    /// `Handoff(target)`
    #[must_use]
    pub fn handoff(target: impl Into<String>) -> Self {
        Self::Handoff(target.into())
    }

    /// `SourceMatch(sources)`
    #[must_use]
    pub fn source_match<I, S>(sources: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::SourceMatch(sources.into_iter().map(Into::into).collect())
    }

    /// Evaluate against the full history; `Some` means stop
    #[must_use]
    pub fn evaluate(&self, history: &[Message]) -> Option<StopReason> {
        match self {
            Self::MaxMessages(limit) => {
                (history.len() >= *limit).then_some(StopReason::MaxMessages { limit: *limit })
            }
            Self::TextMention(text) => history
                .iter()
                .any(|message| message.mentions(text))
                .then(|| StopReason::TextMention { text: text.clone() }),
            Self::Handoff(target) => history
                .iter()
                .any(|message| message.handoff_to.as_deref() == Some(target.as_str()))
                .then(|| StopReason::Handoff {
                    target: target.clone(),
                }),
            Self::SourceMatch(sources) => history
                .iter()
                .filter_map(Message::source)
                .find(|source| sources.iter().any(|s| s == source))
                .map(|source| StopReason::SourceMatch {
                    source: source.to_string(),
                }),
            Self::And(left, right) => {
                let left = left.evaluate(history)?;
                let right = right.evaluate(history)?;
                Some(StopReason::all(left, right))
            }
            Self::Or(left, right) => left
                .evaluate(history)
                .or_else(|| right.evaluate(history)),
        }
    }
}

impl BitAnd for Termination {
    type Output = Termination;

    fn bitand(self, rhs: Self) -> Self::Output {
        Termination::And(Box::new(self), Box::new(rhs))
    }
}

impl BitOr for Termination {
    type Output = Termination;

    fn bitor(self, rhs: Self) -> Self::Output {
        Termination::Or(Box::new(self), Box::new(rhs))
    }
}

/// Why a group chat stopped
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum StopReason {
    /// Message count reached
    MaxMessages {
        /// Configured limit
        limit: usize,
    },
    /// Text was mentioned
    TextMention {
        /// Matched text
        text: String,
    },
    /// Control was handed to the target
    Handoff {
        /// Handoff target
        target: String,
    },
    /// A watched source spoke
    SourceMatch {
        /// Matching source
        source: String,
    },
    /// Every part of a conjunction held
    All {
        /// Reasons of the parts
        reasons: Vec<StopReason>,
    },
    /// The manager's hard turn bound was reached
    MaxTurns {
        /// Configured bound
        limit: usize,
    },
}

impl StopReason {
    fn all(left: StopReason, right: StopReason) -> Self {
        let mut reasons = Vec::new();
        for reason in [left, right] {
            match reason {
                StopReason::All { reasons: nested } => reasons.extend(nested),
                other => reasons.push(other),
            }
        }
        StopReason::All { reasons }
    }
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MaxMessages { limit } => write!(f, "maximum of {} messages reached", limit),
            Self::TextMention { text } => write!(f, "text '{}' mentioned", text),
            Self::Handoff { target } => write!(f, "handoff to {}", target),
            Self::SourceMatch { source } => write!(f, "{} spoke", source),
            Self::All { reasons } => {
                let parts: Vec<String> = reasons.iter().map(ToString::to_string).collect();
                f.write_str(&parts.join(" and "))
            }
            Self::MaxTurns { limit } => write!(f, "maximum of {} turns reached", limit),
        }
    }
}

#[cfg(test)]
mod tests;
