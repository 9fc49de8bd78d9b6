//! Keyword rules standing in for a model in the offline demos
//!
//! Each demo agent is an `FnReasoner` over these helpers. They only read the
//! request's history; the orchestration does the rest.

use parley_core::{RetrySettings, TASK_SOURCE};
use parley_llm::{
    Decision, DecisionRequest, FnReasoner, Message, MessageRole, RetryingReasoner, SharedReasoner,
};
use std::sync::Arc;

/// Source of the persona note a group participant sees before its turn
const NOTE_SOURCE: &str = "system";

/// Wrap a rule as a reasoner with the configured retry policy
pub fn reasoner<F>(name: &str, retry: &RetrySettings, rule: F) -> SharedReasoner
where
    F: Fn(&DecisionRequest) -> Decision + Send + Sync + 'static,
{
    let inner = FnReasoner::new(name, move |request: &DecisionRequest| Ok(rule(request)));
    Arc::new(RetryingReasoner::new(inner, retry.reasoner.clone()))
}

/// Latest turn other than a persona note
pub fn last_turn(request: &DecisionRequest) -> Option<&Message> {
    request
        .history
        .iter()
        .rev()
        .find(|m| m.source() != Some(NOTE_SOURCE))
}

/// Latest turn typed by a person
pub fn last_user_text(request: &DecisionRequest) -> &str {
    request
        .history
        .iter()
        .rev()
        .find(|m| m.role == MessageRole::User && m.source() != Some(NOTE_SOURCE))
        .map_or("", |m| m.content.as_str())
}

/// The task that opened a group chat
pub fn task_text(request: &DecisionRequest) -> &str {
    request
        .history
        .iter()
        .find(|m| m.source() == Some(TASK_SOURCE))
        .map_or("", |m| m.content.as_str())
}

/// Tool name and output answered by the latest turn, if it is a tool result
pub fn last_tool_result(request: &DecisionRequest) -> Option<(&str, &str)> {
    let last = last_turn(request)?;
    if last.role != MessageRole::Tool {
        return None;
    }
    let id = last.tool_call_id.as_deref()?;
    let call = request
        .history
        .iter()
        .rev()
        .flat_map(|m| m.tool_calls.iter())
        .find(|c| c.id == id)?;
    Some((call.name.as_str(), last.content.as_str()))
}

/// Outputs of every call of `tool`, oldest first
pub fn tool_outputs<'a>(request: &'a DecisionRequest, tool: &str) -> Vec<&'a str> {
    let ids: Vec<&str> = request
        .history
        .iter()
        .flat_map(|m| m.tool_calls.iter())
        .filter(|c| c.name == tool)
        .map(|c| c.id.as_str())
        .collect();
    request
        .history
        .iter()
        .filter(|m| m.role == MessageRole::Tool)
        .filter(|m| m.tool_call_id.as_deref().is_some_and(|id| ids.contains(&id)))
        .map(|m| m.content.as_str())
        .collect()
}

/// Latest answer `name` gave the group
pub fn answer_of<'a>(request: &'a DecisionRequest, name: &str) -> Option<&'a str> {
    request
        .history
        .iter()
        .rev()
        .find(|m| {
            m.source() == Some(name)
                && m.role == MessageRole::Assistant
                && m.tool_calls.is_empty()
                && m.handoff_to.is_none()
        })
        .map(|m| m.content.as_str())
}

/// Whether the latest non-note turn is this agent's own answer
pub fn just_answered(request: &DecisionRequest) -> bool {
    last_turn(request).is_some_and(|m| {
        m.source() == Some(request.agent.as_str())
            && m.role == MessageRole::Assistant
            && m.tool_calls.is_empty()
    })
}

/// Case-insensitive keyword match
pub fn mentions_any(text: &str, words: &[&str]) -> bool {
    let lower = text.to_lowercase();
    words.iter().any(|w| lower.contains(w))
}

/// Words that look like identifiers, e.g. `CA981`
pub fn identifier(text: &str) -> Option<&str> {
    text.split(|c: char| !c.is_ascii_alphanumeric())
        .find(|word| {
            word.len() >= 4
                && word.chars().any(|c| c.is_ascii_digit())
                && word.chars().any(|c| c.is_ascii_uppercase())
        })
}

/// Numbers in `text`, in order
pub fn numbers(text: &str) -> Vec<f64> {
    text.split(|c: char| !(c.is_ascii_digit() || c == '.'))
        .map(|word| word.trim_matches('.'))
        .filter(|word| !word.is_empty())
        .filter_map(|word| word.parse().ok())
        .collect()
}
