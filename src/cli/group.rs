//! `parley group` - a planner-led research team
//!
//! The planner breaks the task down, a web searcher gathers the numbers and
//! a data analyst does the arithmetic. The planner takes the floor after
//! every other turn; a rule-backed chooser picks who works next.

use super::rules::{answer_of, last_tool_result, numbers, reasoner, task_text, tool_outputs};
use super::spawn_event_logger;
use crate::config::AppConfig;
use crate::console::StdinConsole;
use anyhow::{Context, Result};
use parley_core::{
    ChatResult, GroupChat, GroupChatHandle, HandoffAgentConfig, PlannerSelector, Runtime,
    SharedConsole, Termination,
};
use parley_llm::{Decision, DecisionRequest};
use parley_tools::builtins::register_analysis_tools;
use parley_tools::ToolRegistry;
use std::sync::Arc;

const GROUP_TOPIC: &str = "research_team";
const SESSION: &str = "cli";
const PLANNER: &str = "PlanningAgent";
const SEARCHER: &str = "WebSearchAgent";
const ANALYST: &str = "DataAnalystAgent";
const APPROVER: &str = "UserProxyAgent";

/// Task used when none is given on the command line
pub const DEFAULT_TASK: &str = "Who was the Miami Heat player with the highest points in the \
     2006-2007 season, and what was the percentage change in his total rebounds between the \
     2007-2008 and 2008-2009 seasons?";

const SEARCH_QUERIES: &[&str] = &[
    "Miami Heat player points 2006-2007",
    "Dwayne Wade total rebounds 2007-2008",
    "Dwayne Wade total rebounds 2008-2009",
];

fn planner() -> HandoffAgentConfig {
    HandoffAgentConfig::new(
        PLANNER,
        "You are a planning agent. Your job is to break down complex tasks into smaller, \
         manageable subtasks. Your team members are: WebSearchAgent (searches for information) \
         and DataAnalystAgent (performs calculations). You only plan and delegate tasks, you do \
         not execute them yourself. When assigning tasks, use this format: \
         1. <agent> : <task>. After all tasks are complete, summarize the findings and end \
         with \"TERMINATE\".",
    )
    .with_description("Plans tasks, this agent should be the first to engage when given a new task.")
}

fn searcher() -> HandoffAgentConfig {
    HandoffAgentConfig::new(
        SEARCHER,
        "You are a web search agent. Your only tool is search_web - use it to find information. \
         You make only one search call at a time. Once you have the results, you never do \
         calculations based on them.",
    )
    .with_description("Searches for information on the web.")
    .with_tools(["search_web"])
}

fn analyst() -> HandoffAgentConfig {
    HandoffAgentConfig::new(
        ANALYST,
        "You are a data analyst. Given the tasks you have been assigned, you should analyze the \
         data and provide results using the tools provided. If you have not seen the data, ask \
         for it.",
    )
    .with_description("Performs calculations.")
    .with_tools(["percentage_change"])
}

fn planner_rule(request: &DecisionRequest) -> Decision {
    if let Some(analysis) = answer_of(request, ANALYST) {
        let findings = answer_of(request, SEARCHER).unwrap_or_default();
        return Decision::reply(format!(
            "Summary of findings:\n{}\n{}\nTERMINATE",
            findings, analysis
        ));
    }
    if answer_of(request, SEARCHER).is_some() {
        return Decision::reply(format!(
            "1. {} : Calculate the percentage change in total rebounds between the \
             2007-2008 and 2008-2009 seasons.",
            ANALYST
        ));
    }
    Decision::reply(format!(
        "To answer \"{}\":\n\
         1. {} : Look up the Miami Heat player with the most points in 2006-2007.\n\
         2. {} : Look up his total rebounds in 2007-2008 and 2008-2009.\n\
         3. {} : Calculate the percentage change in his total rebounds.",
        task_text(request),
        SEARCHER,
        SEARCHER,
        ANALYST
    ))
}

fn searcher_rule(request: &DecisionRequest) -> Decision {
    let outputs = tool_outputs(request, "search_web");
    match SEARCH_QUERIES.get(outputs.len()) {
        Some(query) => Decision::call("search_web", serde_json::json!({ "query": query })),
        None => Decision::reply(outputs.join("\n")),
    }
}

fn analyst_rule(request: &DecisionRequest) -> Decision {
    if let Some(("percentage_change", change)) = last_tool_result(request) {
        let change: f64 = change.trim().parse().unwrap_or_default();
        return Decision::reply(format!(
            "Total rebounds changed by {:.2}% between the 2007-2008 and 2008-2009 seasons.",
            change
        ));
    }

    let findings = answer_of(request, SEARCHER).unwrap_or_default();
    let rebounds: Vec<f64> = findings
        .lines()
        .filter(|line| line.contains("rebounds"))
        .filter_map(|line| numbers(line).last().copied())
        .collect();
    match rebounds.as_slice() {
        [start, end, ..] => Decision::call(
            "percentage_change",
            serde_json::json!({ "start": start, "end": end }),
        ),
        _ => Decision::reply("I need both rebound totals before I can calculate anything."),
    }
}

/// Conversation part of a rendered selector prompt
fn conversation(prompt: &str) -> &str {
    prompt
        .split_once("Current conversation context:")
        .map_or(prompt, |(_, rest)| rest)
}

fn chooser_rule(request: &DecisionRequest) -> Decision {
    let conversation = conversation(&request.system_prompt);
    let spoke = |name: &str| {
        conversation
            .lines()
            .any(|line| line.starts_with(&format!("{}:", name)))
    };
    let next = [SEARCHER, ANALYST]
        .into_iter()
        .find(|name| !spoke(name))
        .unwrap_or(PLANNER);
    Decision::reply(next)
}

/// Build the research team on `runtime`; with a console, a person approves
/// every plan
pub(crate) fn install(
    runtime: &Runtime,
    config: &AppConfig,
    approver: Option<SharedConsole>,
) -> Result<GroupChatHandle> {
    let mut tools = ToolRegistry::new();
    register_analysis_tools(&mut tools);

    let mut group_config = config.group.clone();
    if group_config.termination.is_none() {
        group_config.termination =
            Some(Termination::text_mention("TERMINATE") | Termination::max_messages(25));
    }

    let retry = &config.retry;
    let mut selector = PlannerSelector::new(PLANNER);
    let mut chat = GroupChat::new(GROUP_TOPIC, group_config)
        .with_tools(tools)
        .with_runner_config(config.runner_config())
        .with_agent(planner(), reasoner(PLANNER, retry, planner_rule))
        .with_agent(searcher(), reasoner(SEARCHER, retry, searcher_rule))
        .with_agent(analyst(), reasoner(ANALYST, retry, analyst_rule));
    if let Some(console) = approver {
        chat = chat.with_user_proxy(APPROVER, "Approves or revises the plan.", console);
        selector = selector.with_approver(APPROVER);
    }

    chat.with_selector(selector)
        .with_reasoner_chooser(reasoner("selector", retry, chooser_rule))
        .install(runtime)
        .context("Failed to set up the research team")
}

fn print_result(result: &ChatResult) {
    for message in &result.messages {
        let speaker = message.source().unwrap_or(message.role.as_str());
        println!("\n---------- {} ----------\n{}", speaker, message.content);
    }
    println!("\nStopped: {}", result.stop_reason);
}

pub async fn run(config: &AppConfig, task: Option<String>, approve: bool) -> Result<()> {
    let runtime = Runtime::new(config.runtime.clone());
    let approver: Option<SharedConsole> = approve.then(|| Arc::new(StdinConsole::new()) as _);
    let handle = install(&runtime, config, approver)?;
    spawn_event_logger(runtime.session_events(SESSION));

    runtime.start()?;
    handle.start(
        &runtime,
        SESSION,
        task.unwrap_or_else(|| DEFAULT_TASK.to_string()),
    );

    tokio::select! {
        result = runtime.stop_when_idle() => result.context("Group chat failed")?,
        _ = tokio::signal::ctrl_c() => runtime.stop().await,
    }

    match handle.result(SESSION) {
        Some(result) => print_result(&result),
        None => println!("The chat did not finish."),
    }
    Ok(())
}
