//! `parley handoff` - the ACME support desk
//!
//! Triage routes the customer to sales or to issues and repairs; either can
//! send the customer back, and triage can escalate to a human at the
//! console.

use super::rules::{last_tool_result, last_turn, last_user_text, mentions_any, reasoner};
use super::spawn_event_logger;
use crate::config::AppConfig;
use crate::console::StdinConsole;
use anyhow::{Context, Result};
use parley_core::{
    HandoffAgentConfig, HandoffRoster, Payload, RetrySettings, Runtime, SharedConsole, TopicId,
};
use parley_llm::{Decision, DecisionRequest, MessageRole};
use parley_tools::builtins::{register_support_tools, DEMO_ITEM_ID};
use parley_tools::ToolRegistry;
use std::sync::Arc;
use tracing::info;

const SESSION: &str = "cli";
const REFUND_WORDS: &[&str] = &["refund", "repair", "broken", "issue", "return"];
const SALES_WORDS: &[&str] = &["buy", "order", "purchase", "price"];
const HUMAN_WORDS: &[&str] = &["human", "person", "manager"];
const DEFAULT_PRODUCT: &str = "ACME rocket skates";

pub(crate) fn triage() -> HandoffAgentConfig {
    HandoffAgentConfig::new(
        "TriageAgent",
        "You are a customer service bot for ACME Inc. Introduce yourself. Always be very brief. \
         Gather information to direct the customer to the right department. \
         But make your questions subtle and natural.",
    )
    .with_description("Routes customers to the right department")
    .with_delegate(
        "transfer_to_sales_agent",
        "Use for anything sales or buying related.",
        "SalesAgent",
    )
    .with_delegate(
        "transfer_to_issues_and_repairs",
        "Use for issues, repairs, or refunds.",
        "IssuesAndRepairsAgent",
    )
    .with_delegate(
        "escalate_to_human",
        "Only call this if explicitly asked to.",
        "HumanAgent",
    )
}

pub(crate) fn sales() -> HandoffAgentConfig {
    HandoffAgentConfig::new(
        "SalesAgent",
        "You are a sales agent for ACME Inc. Always answer in a sentence or less. \
         Follow the following routine with the user: \
         1. Ask them about any problems in their life related to catching roadrunners. \
         2. Casually mention one of ACME's crazy made-up products can help. \
         3. Once they're bought in, drop a ridiculous price. \
         4. Only after everything, and if the user says yes, tell them a crazy caveat \
         and execute their order.",
    )
    .with_description("Sells ACME products")
    .with_tools(["execute_order"])
    .with_delegate(
        "transfer_back_to_triage",
        "Call this if the user brings up a topic outside of your purview, \
         including escalating to human.",
        "TriageAgent",
    )
}

pub(crate) fn issues_and_repairs() -> HandoffAgentConfig {
    HandoffAgentConfig::new(
        "IssuesAndRepairsAgent",
        "You are a customer support agent for ACME Inc. Always answer in a sentence or less. \
         Follow the following routine with the user: \
         1. First, ask probing questions and understand the user's problem deeper. \
         2. Propose a fix (make one up). \
         3. ONLY if not satisfied, offer a refund. \
         4. If accepted, search for the ID and then execute refund.",
    )
    .with_description("Handles issues, repairs and refunds")
    .with_tools(["look_up_item", "execute_refund"])
    .with_delegate(
        "transfer_back_to_triage",
        "Call this if the user brings up a topic outside of your purview, \
         including escalating to human.",
        "TriageAgent",
    )
}

fn fresh_user_turn(request: &DecisionRequest) -> bool {
    last_turn(request).is_some_and(|m| m.role == MessageRole::User)
}

fn triage_rule(request: &DecisionRequest) -> Decision {
    let text = last_user_text(request);
    if mentions_any(text, HUMAN_WORDS) {
        Decision::delegate("escalate_to_human")
    } else if mentions_any(text, REFUND_WORDS) {
        Decision::delegate("transfer_to_issues_and_repairs")
    } else if mentions_any(text, SALES_WORDS) {
        Decision::delegate("transfer_to_sales_agent")
    } else if fresh_user_turn(request) {
        Decision::reply("Hi, I'm the ACME triage bot. Are you looking to buy something, or is something broken?")
    } else {
        Decision::reply("Back with triage. What else can I do for you?")
    }
}

fn sales_rule(request: &DecisionRequest) -> Decision {
    if let Some(("execute_order", status)) = last_tool_result(request) {
        return Decision::reply(format!(
            "Order status: {}. Caveat: the skates only work downhill.",
            status
        ));
    }
    let text = last_user_text(request);
    if mentions_any(text, REFUND_WORDS) || mentions_any(text, HUMAN_WORDS) {
        return Decision::delegate("transfer_back_to_triage");
    }
    if mentions_any(text, &["yes", "sure", "ok"]) || mentions_any(text, SALES_WORDS) {
        let product = text
            .split_once("buy ")
            .map(|(_, rest)| rest.trim_end_matches(['.', '!', '?']).trim())
            .filter(|p| !p.is_empty())
            .unwrap_or(DEFAULT_PRODUCT);
        return Decision::call(
            "execute_order",
            serde_json::json!({"product": product, "price": 999}),
        );
    }
    Decision::reply("Roadrunner trouble? Our rocket skates are a steal at $999. Want a pair?")
}

fn issues_rule(request: &DecisionRequest) -> Decision {
    match last_tool_result(request) {
        Some(("look_up_item", item)) => {
            return Decision::call(
                "execute_refund",
                serde_json::json!({"item_id": item, "reason": last_user_text(request)}),
            );
        }
        Some(("execute_refund", _)) => {
            return Decision::reply(format!(
                "Your refund for {} has been processed.",
                DEMO_ITEM_ID
            ));
        }
        _ => {}
    }

    let text = last_user_text(request);
    if mentions_any(text, &["thank", "bye"]) {
        Decision::reply("You're welcome. Anything else broken?")
    } else if mentions_any(text, SALES_WORDS) && !mentions_any(text, REFUND_WORDS) {
        Decision::delegate("transfer_back_to_triage")
    } else if mentions_any(text, HUMAN_WORDS) {
        Decision::delegate("transfer_back_to_triage")
    } else {
        Decision::call("look_up_item", serde_json::json!({"search_query": text}))
    }
}

/// Build the support desk on `runtime`
pub(crate) fn install(
    runtime: &Runtime,
    config: &AppConfig,
    console: SharedConsole,
    confirm_orders: bool,
) -> Result<()> {
    let mut tools = ToolRegistry::new();
    register_support_tools(
        &mut tools,
        Arc::new(move |product: &str, price: u64| {
            info!(product, price, confirmed = confirm_orders, "Order requested");
            confirm_orders
        }),
    );

    let retry: &RetrySettings = &config.retry;
    HandoffRoster::new(config.handoff.clone())
        .with_tools(tools)
        .with_runner_config(config.runner_config())
        .with_agent(triage(), reasoner("TriageAgent", retry, triage_rule))
        .with_agent(sales(), reasoner("SalesAgent", retry, sales_rule))
        .with_agent(
            issues_and_repairs(),
            reasoner("IssuesAndRepairsAgent", retry, issues_rule),
        )
        .with_user("TriageAgent", Arc::clone(&console))
        .with_human("HumanAgent", console)
        .install(runtime)
        .context("Failed to set up the support desk")?;
    Ok(())
}

pub async fn run(config: &AppConfig, confirm_orders: bool) -> Result<()> {
    let runtime = Runtime::new(config.runtime.clone());
    install(&runtime, config, Arc::new(StdinConsole::new()), confirm_orders)?;
    spawn_event_logger(runtime.session_events(SESSION));

    println!("ACME support desk. Press Enter on an empty line to leave.");
    runtime.start()?;
    runtime.publish(
        Payload::Login,
        TopicId::new(config.handoff.user_topic.as_str(), SESSION),
    );

    tokio::select! {
        result = runtime.stop_when_idle() => result.context("Support session failed")?,
        _ = tokio::signal::ctrl_c() => runtime.stop().await,
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use parley_core::{RuntimeConfig, ScriptedConsole};

    #[tokio::test]
    async fn test_refund_walkthrough() {
        let config = AppConfig::default();
        let console = ScriptedConsole::new(["My rocket skates are broken, I want a refund"]);
        let runtime = Runtime::new(RuntimeConfig::default());
        install(&runtime, &config, Arc::new(console.clone()), false).unwrap();

        runtime.start().unwrap();
        runtime.publish(Payload::Login, TopicId::new("User", "s1"));
        runtime.stop_when_idle().await.unwrap();

        assert_eq!(
            console.displayed(),
            vec![(
                "IssuesAndRepairsAgent".to_string(),
                format!("Your refund for {} has been processed.", DEMO_ITEM_ID)
            )]
        );
    }

    #[tokio::test]
    async fn test_declined_order_is_reported() {
        let config = AppConfig::default();
        let console = ScriptedConsole::new(["I'd like to buy anvils"]);
        let runtime = Runtime::new(RuntimeConfig::default());
        install(&runtime, &config, Arc::new(console.clone()), false).unwrap();

        runtime.start().unwrap();
        runtime.publish(Payload::Login, TopicId::new("User", "s1"));
        runtime.stop_when_idle().await.unwrap();

        let shown = console.displayed();
        assert_eq!(shown.len(), 1);
        assert_eq!(shown[0].0, "SalesAgent");
        assert!(shown[0].1.contains("User cancelled order."));
    }
}
