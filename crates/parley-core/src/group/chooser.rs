//! Default speaker choosers

use super::Participant;
use crate::config::DEFAULT_SELECTOR_PROMPT;
use crate::error::{Error, Result};
use parley_llm::{Decision, DecisionRequest, Message, SharedReasoner};
use regex::Regex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};

/// What a chooser sees when the override selector defers
#[derive(Debug, Clone, PartialEq)]
pub struct SelectionContext {
    /// Shared history, task first
    pub history: Vec<Message>,
    /// Every participant, in registration order
    pub participants: Vec<Participant>,
    /// Names that may speak next, in registration order; never empty
    pub eligible: Vec<String>,
    /// Last participant selected, if any
    pub previous: Option<String>,
    /// Last participant picked by a chooser rather than the override selector
    pub last_chosen: Option<String>,
}

impl SelectionContext {
    /// Round-robin pick for this context.
    ///
    /// The cursor is the last chooser pick, so an override that keeps
    /// reclaiming the floor does not starve the participants after it.
    #[must_use]
    pub fn round_robin(&self) -> String {
        let cursor = self.last_chosen.as_deref().or(self.previous.as_deref());
        round_robin(&self.participants, cursor, &self.eligible)
    }
}

/// Picks the next speaker among the eligible participants
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait SpeakerChooser: Send + Sync {
    /// Name of the next speaker
    async fn choose(&self, context: &SelectionContext, cancel: &CancellationToken) -> Result<String>;
}

/// Next eligible participant after `previous` in registration order; the
/// first eligible one when nobody has spoken
#[must_use]
pub fn round_robin(participants: &[Participant], previous: Option<&str>, eligible: &[String]) -> String {
    let start = previous
        .and_then(|name| participants.iter().position(|p| p.name == name))
        .map_or(0, |i| i + 1);
    let count = participants.len();
    (0..count)
        .map(|offset| &participants[(start + offset) % count].name)
        .find(|name| eligible.contains(*name))
        .or_else(|| eligible.first())
        .cloned()
        .unwrap_or_default()
}

/// Chooser that never consults anyone
#[derive(Debug, Clone, Copy, Default)]
pub struct RoundRobinChooser;

#[async_trait::async_trait]
impl SpeakerChooser for RoundRobinChooser {
    async fn choose(&self, context: &SelectionContext, _cancel: &CancellationToken) -> Result<String> {
        Ok(context.round_robin())
    }
}

/// Asks a reasoner to name the next speaker.
///
/// The answer must mention exactly one eligible participant. After
/// `max_attempts` unusable answers the chooser falls back to round-robin.
pub struct ReasonerChooser {
    reasoner: SharedReasoner,
    prompt: String,
    max_attempts: u32,
}

impl ReasonerChooser {
    /// Create a chooser with the default prompt and three attempts
    #[must_use]
    pub fn new(reasoner: SharedReasoner) -> Self {
        Self {
            reasoner,
            prompt: DEFAULT_SELECTOR_PROMPT.to_string(),
            max_attempts: 3,
        }
    }

    /// Set the prompt template (`{roles}`, `{history}`, `{participants}`)
    #[must_use]
    pub fn with_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = prompt.into();
        self
    }

    /// Set the attempts before falling back to round-robin
    #[must_use]
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    /// Render the prompt for `context`
    #[must_use]
    pub fn render(&self, context: &SelectionContext) -> String {
        let roles = context
            .participants
            .iter()
            .filter(|p| context.eligible.contains(&p.name))
            .map(|p| format!("{}: {}", p.name, p.description))
            .collect::<Vec<_>>()
            .join("\n");
        let history = context
            .history
            .iter()
            .map(|m| format!("{}: {}", m.source().unwrap_or(m.role.as_str()), m.content))
            .collect::<Vec<_>>()
            .join("\n");
        let participants = format!("[{}]", context.eligible.join(", "));

        self.prompt
            .replace("{roles}", &roles)
            .replace("{history}", &history)
            .replace("{participants}", &participants)
    }

    /// The single eligible name mentioned in `answer`, if exactly one is
    fn mentioned(answer: &str, eligible: &[String]) -> Result<Option<String>> {
        let mut found = None;
        for name in eligible {
            let pattern = Regex::new(&format!(r"\b{}\b", regex::escape(name)))
                .map_err(|e| Error::Internal(format!("speaker pattern: {}", e)))?;
            if pattern.is_match(answer) {
                if found.is_some() {
                    return Ok(None);
                }
                found = Some(name.clone());
            }
        }
        Ok(found)
    }
}

#[async_trait::async_trait]
impl SpeakerChooser for ReasonerChooser {
    #[instrument(skip_all, fields(eligible = context.eligible.len()))]
    async fn choose(&self, context: &SelectionContext, cancel: &CancellationToken) -> Result<String> {
        if let [only] = context.eligible.as_slice() {
            return Ok(only.clone());
        }

        let mut request = DecisionRequest::new("selector", self.render(context));
        for attempt in 1..=self.max_attempts {
            let decision = self.reasoner.decide(request.clone(), cancel).await?;
            let answer = match decision {
                Decision::Reply(answer) => answer,
                other => {
                    warn!(attempt, decision = other.kind().as_str(), "Selector answered without text");
                    continue;
                }
            };
            if let Some(name) = Self::mentioned(&answer, &context.eligible)? {
                debug!(attempt, speaker = %name, "Speaker chosen by reasoner");
                return Ok(name);
            }
            warn!(attempt, answer = %answer, "Selector answer named no single participant");
            request.history.push(Message::assistant(answer));
            request.history.push(Message::user(format!(
                "Name exactly one agent from [{}].",
                context.eligible.join(", ")
            )));
        }

        let fallback = context.round_robin();
        warn!(speaker = %fallback, "Falling back to round-robin");
        Ok(fallback)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parley_llm::MockReasoner;
    use std::sync::Arc;

    fn participants() -> Vec<Participant> {
        vec![
            Participant::new("PlanningAgent", "Plans tasks"),
            Participant::new("WebSearchAgent", "Searches for information"),
            Participant::new("DataAnalystAgent", "Performs calculations"),
        ]
    }

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn context(previous: Option<&str>, eligible: &[&str]) -> SelectionContext {
        SelectionContext {
            history: vec![Message::user("Who scored most?").from_source("user")],
            participants: participants(),
            eligible: names(eligible),
            previous: previous.map(str::to_string),
            last_chosen: None,
        }
    }

    #[test]
    fn test_round_robin_cycles_once_per_round() {
        let team = participants();
        let all = names(&["PlanningAgent", "WebSearchAgent", "DataAnalystAgent"]);
        let mut previous: Option<String> = None;
        let mut spoken = Vec::new();
        for _ in 0..6 {
            let eligible: Vec<String> = all
                .iter()
                .filter(|n| Some(*n) != previous.as_ref())
                .cloned()
                .collect();
            let next = round_robin(&team, previous.as_deref(), &eligible);
            spoken.push(next.clone());
            previous = Some(next);
        }
        assert_eq!(spoken[..3], all[..]);
        assert_eq!(spoken[3..], all[..]);
    }

    #[test]
    fn test_round_robin_skips_ineligible() {
        let team = participants();
        let next = round_robin(&team, Some("PlanningAgent"), &names(&["PlanningAgent", "DataAnalystAgent"]));
        assert_eq!(next, "DataAnalystAgent");
        let next = round_robin(&team, Some("unknown"), &names(&["DataAnalystAgent"]));
        assert_eq!(next, "DataAnalystAgent");
    }

    #[test]
    fn test_round_robin_resumes_after_last_pick() {
        // Planner holds the floor through an override after every turn
        let mut context = context(Some("PlanningAgent"), &["WebSearchAgent", "DataAnalystAgent"]);
        assert_eq!(context.round_robin(), "WebSearchAgent");

        context.last_chosen = Some("WebSearchAgent".to_string());
        assert_eq!(context.round_robin(), "DataAnalystAgent");

        context.last_chosen = Some("DataAnalystAgent".to_string());
        assert_eq!(context.round_robin(), "WebSearchAgent");
    }

    #[test]
    fn test_render_prompt() {
        let chooser = ReasonerChooser::new(Arc::new(MockReasoner::new()));
        let prompt = chooser.render(&context(None, &["WebSearchAgent", "DataAnalystAgent"]));
        assert!(prompt.contains("WebSearchAgent: Searches for information"));
        assert!(!prompt.contains("PlanningAgent: Plans tasks"));
        assert!(prompt.contains("user: Who scored most?"));
        assert!(prompt.contains("[WebSearchAgent, DataAnalystAgent]"));
    }

    #[tokio::test]
    async fn test_reasoner_choice_accepted() {
        let reasoner = MockReasoner::scripted([Decision::reply("DataAnalystAgent should go next.")]);
        let chooser = ReasonerChooser::new(Arc::new(reasoner.clone()));
        let name = chooser
            .choose(
                &context(Some("PlanningAgent"), &["WebSearchAgent", "DataAnalystAgent"]),
                &CancellationToken::new(),
            )
            .await
            .unwrap();
        assert_eq!(name, "DataAnalystAgent");
        assert_eq!(reasoner.requests().len(), 1);
    }

    #[tokio::test]
    async fn test_ambiguous_answers_fall_back_to_round_robin() {
        let reasoner = MockReasoner::scripted([
            Decision::reply("WebSearchAgent or DataAnalystAgent"),
            Decision::reply("nobody"),
        ]);
        let chooser = ReasonerChooser::new(Arc::new(reasoner.clone())).with_max_attempts(2);
        let name = chooser
            .choose(
                &context(Some("PlanningAgent"), &["WebSearchAgent", "DataAnalystAgent"]),
                &CancellationToken::new(),
            )
            .await
            .unwrap();
        assert_eq!(name, "WebSearchAgent");

        let requests = reasoner.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[1].history.len(), 2);
    }

    #[tokio::test]
    async fn test_single_eligible_skips_reasoner() {
        let reasoner = MockReasoner::new();
        let chooser = ReasonerChooser::new(Arc::new(reasoner.clone()));
        let name = chooser
            .choose(&context(None, &["WebSearchAgent"]), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(name, "WebSearchAgent");
        assert!(reasoner.requests().is_empty());
    }

    #[tokio::test]
    async fn test_reasoner_failure_propagates() {
        let reasoner = MockReasoner::new();
        reasoner.push_error(parley_llm::Error::Network("connection reset".into()));
        let chooser = ReasonerChooser::new(Arc::new(reasoner));
        let err = chooser
            .choose(
                &context(None, &["WebSearchAgent", "DataAnalystAgent"]),
                &CancellationToken::new(),
            )
            .await
            .unwrap_err();
        assert!(err.is_capability());
    }
}
