//! Deterministic override selectors
//!
//! A selector sees the shared history and either names the next speaker or
//! returns `None` to let the chooser decide. Look-backs are guarded, so a
//! short history simply yields `None` or the planner.

use super::Participant;
use crate::history::ConversationHistory;
use std::sync::Arc;

/// Override consulted before the chooser
pub trait SpeakerSelector: Send + Sync {
    /// Next speaker, or `None` to defer to the chooser
    fn select(&self, history: &ConversationHistory, participants: &[Participant]) -> Option<String>;
}

/// Returns to the planner after every other turn.
///
/// With an approver, planner turns are followed by the approver until the
/// approver answers with the approval keyword; the planner's next turn then
/// goes to the chooser.
#[derive(Debug, Clone)]
pub struct PlannerSelector {
    planner: String,
    approver: Option<String>,
    keyword: String,
}

impl PlannerSelector {
    /// Create a selector centered on `planner`
    #[must_use]
    pub fn new(planner: impl Into<String>) -> Self {
        Self {
            planner: planner.into(),
            approver: None,
            keyword: "APPROVE".to_string(),
        }
    }

    /// Insert `approver` after planner turns
    #[must_use]
    pub fn with_approver(mut self, approver: impl Into<String>) -> Self {
        self.approver = Some(approver.into());
        self
    }

    /// Word that counts as approval (case-insensitive)
    #[must_use]
    pub fn with_keyword(mut self, keyword: impl Into<String>) -> Self {
        self.keyword = keyword.into();
        self
    }

    fn approves(&self, content: &str) -> bool {
        content.to_uppercase().contains(&self.keyword.to_uppercase())
    }
}

impl SpeakerSelector for PlannerSelector {
    fn select(&self, history: &ConversationHistory, _participants: &[Participant]) -> Option<String> {
        let last = history.last()?;
        let source = last.source().unwrap_or_default();

        let Some(approver) = &self.approver else {
            return (source != self.planner).then(|| self.planner.clone());
        };

        if source == self.planner {
            let approved = history
                .nth_back(1)
                .and_then(|m| m.source())
                .is_some_and(|s| s == approver.as_str())
                && self.approves(&last.content);
            return (!approved).then(|| approver.clone());
        }
        if source == approver.as_str() {
            return (!self.approves(&last.content)).then(|| self.planner.clone());
        }
        Some(self.planner.clone())
    }
}

/// Swarm-style routing: the target of the most recent handoff speaks; without
/// one, the last participant to speak keeps the floor
#[derive(Debug, Clone, Copy, Default)]
pub struct HandoffSelector;

impl SpeakerSelector for HandoffSelector {
    fn select(&self, history: &ConversationHistory, participants: &[Participant]) -> Option<String> {
        let is_participant = |name: &str| participants.iter().any(|p| p.name == name);

        for turn in history.turns().iter().rev() {
            if let Some(target) = turn.handoff_to.as_deref() {
                // Handoffs outside the team end the chat through termination
                return is_participant(target).then(|| target.to_string());
            }
            if let Some(source) = turn.source().filter(|&s| is_participant(s)) {
                return Some(source.to_string());
            }
        }
        None
    }
}

type SelectFn = dyn Fn(&ConversationHistory, &[Participant]) -> Option<String> + Send + Sync;

/// Selector backed by a closure
#[derive(Clone)]
pub struct FnSelector {
    select: Arc<SelectFn>,
}

impl FnSelector {
    /// Wrap a closure
    pub fn new<F>(select: F) -> Self
    where
        F: Fn(&ConversationHistory, &[Participant]) -> Option<String> + Send + Sync + 'static,
    {
        Self {
            select: Arc::new(select),
        }
    }
}

impl std::fmt::Debug for FnSelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnSelector").finish_non_exhaustive()
    }
}

impl SpeakerSelector for FnSelector {
    fn select(&self, history: &ConversationHistory, participants: &[Participant]) -> Option<String> {
        (self.select)(history, participants)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parley_llm::Message;

    fn team() -> Vec<Participant> {
        ["PlanningAgent", "WebSearchAgent", "DataAnalystAgent", "UserProxyAgent"]
            .into_iter()
            .map(|n| Participant::new(n, ""))
            .collect()
    }

    fn turn(source: &str, content: &str) -> Message {
        Message::assistant(content).from_source(source)
    }

    fn history(turns: &[(&str, &str)]) -> ConversationHistory {
        turns.iter().map(|(s, c)| turn(s, c)).collect::<Vec<_>>().into()
    }

    #[test]
    fn test_planner_returns_after_other_turns() {
        let selector = PlannerSelector::new("PlanningAgent");
        assert_eq!(selector.select(&ConversationHistory::new(), &team()), None);

        let h = history(&[("user", "task")]);
        assert_eq!(selector.select(&h, &team()).as_deref(), Some("PlanningAgent"));

        let h = history(&[("user", "task"), ("PlanningAgent", "1. WebSearchAgent : search")]);
        assert_eq!(selector.select(&h, &team()), None);

        let h = history(&[("user", "task"), ("PlanningAgent", "plan"), ("WebSearchAgent", "found")]);
        assert_eq!(selector.select(&h, &team()).as_deref(), Some("PlanningAgent"));
    }

    #[test]
    fn test_approval_flow() {
        let selector = PlannerSelector::new("PlanningAgent").with_approver("UserProxyAgent");

        // A single planner turn has no turn before it to look at
        let h = history(&[("PlanningAgent", "plan")]);
        assert_eq!(selector.select(&h, &team()).as_deref(), Some("UserProxyAgent"));

        let h = history(&[("user", "task"), ("PlanningAgent", "plan")]);
        assert_eq!(selector.select(&h, &team()).as_deref(), Some("UserProxyAgent"));

        let h = history(&[("PlanningAgent", "plan"), ("UserProxyAgent", "no, search first")]);
        assert_eq!(selector.select(&h, &team()).as_deref(), Some("PlanningAgent"));

        let h = history(&[("PlanningAgent", "plan"), ("UserProxyAgent", "approve")]);
        assert_eq!(selector.select(&h, &team()), None);

        let h = history(&[
            ("PlanningAgent", "plan"),
            ("UserProxyAgent", "approve"),
            ("PlanningAgent", "Approved, starting."),
        ]);
        assert_eq!(selector.select(&h, &team()), None);
    }

    #[test]
    fn test_handoff_selector_follows_latest_handoff() {
        let team: Vec<Participant> = ["travel_agent", "flights_refunder"]
            .into_iter()
            .map(|n| Participant::new(n, ""))
            .collect();
        let selector = HandoffSelector;

        let h = history(&[("user", "I need to refund my flight.")]);
        assert_eq!(selector.select(&h, &team), None);

        let mut h = h;
        h.push(turn("travel_agent", "Transferred to flights_refunder.").with_handoff("flights_refunder"));
        assert_eq!(selector.select(&h, &team).as_deref(), Some("flights_refunder"));

        h.push(turn("flights_refunder", "What is the flight number?"));
        assert_eq!(selector.select(&h, &team).as_deref(), Some("flights_refunder"));

        h.push(turn("flights_refunder", "Transferred to user.").with_handoff("user"));
        assert_eq!(selector.select(&h, &team), None);
    }

    #[test]
    fn test_fn_selector() {
        let selector = FnSelector::new(|history, participants| {
            (history.len() > 1).then(|| participants[0].name.clone())
        });
        assert_eq!(selector.select(&history(&[("user", "task")]), &team()), None);
        assert_eq!(
            selector
                .select(&history(&[("user", "task"), ("WebSearchAgent", "x")]), &team())
                .as_deref(),
            Some("PlanningAgent")
        );
    }
}
