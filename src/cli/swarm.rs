//! `parley swarm` - a travel desk where the last handoff decides who speaks
//!
//! Every line typed at the prompt starts a chat that runs until an agent
//! hands control back to the user.

use super::rules::{
    identifier, just_answered, last_tool_result, last_user_text, mentions_any, reasoner,
    tool_outputs,
};
use super::spawn_event_logger;
use crate::config::AppConfig;
use crate::console::StdinConsole;
use anyhow::{Context, Result};
use parley_core::{
    ChatResult, GroupChat, HandoffAgentConfig, HandoffSelector, Runtime, Termination, UserConsole,
};
use parley_llm::{Decision, DecisionRequest, MessageRole};
use parley_tools::builtins::register_travel_tools;
use parley_tools::ToolRegistry;
use tokio_util::sync::CancellationToken;
use tracing::info;

const GROUP_TOPIC: &str = "travel_desk";
const SESSION: &str = "cli";
const USER: &str = "user";
const TRAVEL_AGENT: &str = "travel_agent";
const REFUNDER: &str = "flights_refunder";

fn travel_agent() -> HandoffAgentConfig {
    HandoffAgentConfig::new(
        TRAVEL_AGENT,
        "You are a travel agent. The flights_refunder is in charge of refunding flights. \
         If you need information from the user, you must first send your message, then you \
         can handoff to the user. Use TERMINATE when the travel planning is complete.",
    )
    .with_description("Finds flights and prices")
    .with_tools(["query_flight", "query_price"])
    .with_delegate(
        "transfer_to_flights_refunder",
        "Hand off to the flights refunder.",
        REFUNDER,
    )
    .with_delegate("transfer_to_user", "Hand off to the user.", USER)
}

fn flights_refunder() -> HandoffAgentConfig {
    HandoffAgentConfig::new(
        REFUNDER,
        "You are an agent specialized in refunding flights. You only need flight reference \
         numbers to refund a flight. You have the ability to refund a flight using the \
         refund_flight tool. If you need information from the user, you must first send your \
         message, then you can handoff to the user. When the transaction is complete, handoff \
         to the travel agent to finalize.",
    )
    .with_description("Refunds flights")
    .with_tools(["refund_flight"])
    .with_delegate(
        "transfer_to_travel_agent",
        "Hand off to the travel agent.",
        TRAVEL_AGENT,
    )
    .with_delegate("transfer_to_user", "Hand off to the user.", USER)
}

/// First `YYYY-MM-DD` looking word
fn travel_date(text: &str) -> Option<&str> {
    text.split_whitespace()
        .map(|word| word.trim_matches(|c: char| !c.is_ascii_alphanumeric()))
        .find(|word| {
            word.len() == 10
                && word.matches('-').count() == 2
                && word.chars().all(|c| c.is_ascii_digit() || c == '-')
        })
}

fn travel_rule(request: &DecisionRequest) -> Decision {
    if just_answered(request) {
        return Decision::delegate("transfer_to_user");
    }
    match last_tool_result(request) {
        Some(("query_flight", flight)) => {
            let airplane = flight.split_once(": ").map_or(flight, |(_, plane)| plane);
            return Decision::call("query_price", serde_json::json!({ "airplane": airplane }));
        }
        Some(("query_price", price)) => {
            let flight = tool_outputs(request, "query_flight")
                .last()
                .copied()
                .unwrap_or_default();
            return Decision::reply(format!("Found your flight: {}. {}.", flight, price));
        }
        _ => {}
    }

    let text = last_user_text(request);
    if mentions_any(text, &["refund", "cancel"]) {
        return Decision::delegate("transfer_to_flights_refunder");
    }
    match travel_date(text) {
        Some(date) => Decision::call("query_flight", serde_json::json!({ "date": date })),
        None => Decision::reply("When would you like to fly? Please give a date like 2025-05-01."),
    }
}

fn refunder_rule(request: &DecisionRequest) -> Decision {
    if just_answered(request) {
        return Decision::delegate("transfer_to_user");
    }
    if let Some(("refund_flight", status)) = last_tool_result(request) {
        return Decision::reply(format!("{}. Anything else I can do?", status));
    }
    match identifier(last_user_text(request)) {
        Some(flight_id) => {
            Decision::call("refund_flight", serde_json::json!({ "flight_id": flight_id }))
        }
        None => Decision::reply("Which flight should I refund? Please give me the flight number."),
    }
}

/// Run one chat for `task` on a fresh runtime
pub(crate) async fn run_session(config: &AppConfig, task: &str) -> Result<Option<ChatResult>> {
    let mut tools = ToolRegistry::new();
    register_travel_tools(&mut tools);

    let mut group_config = config.group.clone();
    group_config.termination =
        Some(Termination::handoff(USER) | Termination::max_messages(25));

    let retry = &config.retry;
    let runtime = Runtime::new(config.runtime.clone());
    let handle = GroupChat::new(GROUP_TOPIC, group_config)
        .with_tools(tools)
        .with_runner_config(config.runner_config())
        .with_agent(travel_agent(), reasoner(TRAVEL_AGENT, retry, travel_rule))
        .with_agent(flights_refunder(), reasoner(REFUNDER, retry, refunder_rule))
        .with_selector(HandoffSelector)
        .install(&runtime)
        .context("Failed to set up the travel desk")?;
    spawn_event_logger(runtime.session_events(SESSION));

    runtime.start()?;
    handle.start(&runtime, SESSION, task);
    tokio::select! {
        result = runtime.stop_when_idle() => result.context("Travel desk chat failed")?,
        _ = tokio::signal::ctrl_c() => runtime.stop().await,
    }
    Ok(handle.result(SESSION))
}

pub async fn run(config: &AppConfig) -> Result<()> {
    let console = StdinConsole::new();
    let cancel = CancellationToken::new();
    println!("Travel desk. Press Enter on an empty line to leave.");

    while let Some(task) = console.read("User: ", &cancel).await {
        let Some(result) = run_session(config, &task).await? else {
            info!("Chat stopped before finishing");
            break;
        };
        for message in result.messages.iter().skip(1) {
            if message.role == MessageRole::Assistant && message.handoff_to.is_none() {
                let speaker = message.source().unwrap_or(message.role.as_str());
                console.display(speaker, &message.content);
            }
        }
    }
    Ok(())
}
