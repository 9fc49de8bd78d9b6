//! Handoff Integration Tests
//!
//! A support desk wired through the public API: triage hands a refund
//! request to the issues agent, which looks the item up and refunds it.

use parley_core::{
    ConversationHistory, DecisionLoop, Error, HandoffAgentConfig, HandoffConfig, HandoffRoster,
    Payload, Runtime, RuntimeConfig, RuntimeEvent, ScriptedConsole, TopicId, Transfer,
};
use parley_llm::{Decision, Message, MockReasoner};
use parley_tools::builtins::{register_support_tools, DEMO_ITEM_ID};
use parley_tools::{ToolDefinition, ToolRegistry, ToolResult, ToolRunner};
use std::sync::Arc;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

fn triage() -> HandoffAgentConfig {
    HandoffAgentConfig::new(
        "TriageAgent",
        "You are a customer service bot for ACME Inc. Gather information to direct the customer to the right department.",
    )
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
}

fn sales() -> HandoffAgentConfig {
    HandoffAgentConfig::new("SalesAgent", "You are a sales agent for ACME Inc.")
        .with_tools(["execute_order"])
        .with_delegate(
            "transfer_back_to_triage",
            "Call this if the user brings up a topic outside of your purview.",
            "TriageAgent",
        )
}

fn issues() -> HandoffAgentConfig {
    HandoffAgentConfig::new("IssuesAndRepairsAgent", "You are a customer support agent for ACME Inc.")
        .with_tools(["look_up_item", "execute_refund"])
        .with_delegate(
            "transfer_back_to_triage",
            "Call this if the user brings up a topic outside of your purview.",
            "TriageAgent",
        )
}

fn support_tools() -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    register_support_tools(&mut registry, Arc::new(|_, _| true));
    registry
}

fn login(runtime: &Runtime, session: &str) {
    runtime.publish(Payload::Login, TopicId::new("User", session));
}

#[tokio::test]
async fn test_refund_request_reaches_issues_with_full_context() {
    let triage_reasoner =
        MockReasoner::scripted([Decision::delegate("transfer_to_issues_and_repairs")]);
    let issues_reasoner = MockReasoner::scripted([
        Decision::call(
            "look_up_item",
            serde_json::json!({"search_query": "rocket skates"}),
        ),
        Decision::call(
            "execute_refund",
            serde_json::json!({"item_id": DEMO_ITEM_ID, "reason": "too fast"}),
        ),
        Decision::reply("Your refund has been processed."),
    ]);
    let console = ScriptedConsole::new(["I want a refund for my rocket skates"]);

    let runtime = Runtime::new(RuntimeConfig::default());
    HandoffRoster::new(HandoffConfig::default())
        .with_tools(support_tools())
        .with_agent(triage(), Arc::new(triage_reasoner.clone()))
        .with_agent(sales(), Arc::new(MockReasoner::new()))
        .with_agent(issues(), Arc::new(issues_reasoner.clone()))
        .with_user("TriageAgent", Arc::new(console.clone()))
        .install(&runtime)
        .unwrap();
    let mut events = runtime.session_events("customer-1");

    login(&runtime, "customer-1");
    runtime.start().unwrap();
    runtime.stop_when_idle().await.unwrap();

    // Triage saw exactly the user's words
    let triage_requests = triage_reasoner.requests();
    assert_eq!(triage_requests.len(), 1);
    let triage_turns = triage_requests[0].history.len();

    // The issues agent starts from everything triage had, plus the transfer
    let issues_requests = issues_reasoner.requests();
    assert_eq!(issues_requests.len(), 3);
    let first = &issues_requests[0].history;
    assert!(first.len() >= triage_turns);
    assert_eq!(first[0].content, "I want a refund for my rocket skates");
    assert_eq!(first[1].handoff_to.as_deref(), Some("IssuesAndRepairsAgent"));

    // Each tool result is visible to the next decision
    let last = &issues_requests[2].history;
    assert!(last.iter().any(|m| m.content == DEMO_ITEM_ID));
    assert!(last.iter().any(|m| m.content == "success"));

    assert_eq!(
        console.displayed(),
        vec![(
            "IssuesAndRepairsAgent".to_string(),
            "Your refund has been processed.".to_string()
        )]
    );

    let mut handoffs = Vec::new();
    while let Some(event) = events.try_recv() {
        if let RuntimeEvent::HandoffPerformed { from, to, .. } = event {
            handoffs.push((from, to));
        }
    }
    assert_eq!(
        handoffs,
        vec![("TriageAgent".to_string(), "IssuesAndRepairsAgent".to_string())]
    );
}

#[tokio::test]
async fn test_sessions_are_isolated() {
    let triage_reasoner = MockReasoner::new().with_default_reply("How can I help?");

    let runtime = Runtime::new(RuntimeConfig::default());
    HandoffRoster::new(HandoffConfig::default())
        .with_tools(support_tools())
        .with_agent(triage(), Arc::new(triage_reasoner.clone()))
        .with_agent(sales(), Arc::new(MockReasoner::new()))
        .with_agent(issues(), Arc::new(MockReasoner::new()))
        .install(&runtime)
        .unwrap();

    for (session, text) in [("a", "hello"), ("b", "I want to buy rocket skates")] {
        let transfer = Transfer {
            context: vec![Message::user(text).from_source("User")],
            hops: 0,
        };
        runtime.publish(Payload::Transfer(transfer), TopicId::new("TriageAgent", session));
    }
    runtime.start().unwrap();
    runtime.stop_when_idle().await.unwrap();

    // Each session's triage instance only ever saw its own user turn
    let requests = triage_reasoner.requests();
    assert_eq!(requests.len(), 2);
    assert!(requests.iter().all(|r| r.history.len() == 1));
    let mut seen: Vec<&str> = requests
        .iter()
        .map(|r| r.history[0].content.as_str())
        .collect();
    seen.sort_unstable();
    assert_eq!(seen, vec!["I want to buy rocket skates", "hello"]);
}

/// Look-up tool that blocks until its call is cancelled
struct StalledLookup {
    definition: ToolDefinition,
    started: Arc<Notify>,
}

impl StalledLookup {
    fn new(started: Arc<Notify>) -> Self {
        Self {
            definition: ToolDefinition::new("look_up_item", "Use to find item ID."),
            started,
        }
    }
}

#[async_trait::async_trait]
impl parley_tools::Tool for StalledLookup {
    fn definition(&self) -> &ToolDefinition {
        &self.definition
    }

    async fn execute(
        &self,
        _input: serde_json::Value,
        cancel: &CancellationToken,
    ) -> parley_tools::Result<ToolResult> {
        self.started.notify_one();
        cancel.cancelled().await;
        Ok(ToolResult::success(serde_json::json!(DEMO_ITEM_ID), 0))
    }
}

fn stalled_tools(started: &Arc<Notify>) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(Arc::new(StalledLookup::new(Arc::clone(started))));
    registry
}

fn cancel_when_started(started: &Arc<Notify>, cancel: &CancellationToken) {
    let started = Arc::clone(started);
    let cancel = cancel.clone();
    tokio::spawn(async move {
        started.notified().await;
        cancel.cancel();
    });
}

#[tokio::test]
async fn test_cancelled_tool_call_leaves_history_untouched() {
    let started = Arc::new(Notify::new());
    let reasoner = MockReasoner::scripted([
        Decision::call("look_up_item", serde_json::json!({})),
        Decision::reply("unreachable"),
    ]);
    let decision = DecisionLoop::new(
        "IssuesAndRepairsAgent",
        "You are a customer support agent.",
        Arc::new(reasoner.clone()),
        ToolRunner::with_defaults(Arc::new(stalled_tools(&started))),
    )
    .with_tools(&["look_up_item"])
    .unwrap();

    let mut history = ConversationHistory::new();
    history.push(Message::user("I want a refund").from_source("User"));
    let cancel = CancellationToken::new();
    cancel_when_started(&started, &cancel);

    let err = decision.run(&mut history, &cancel, |_| {}).await.unwrap_err();
    assert!(matches!(err, Error::Cancelled));
    assert_eq!(history.len(), 1);
    assert_eq!(reasoner.remaining(), 1);
}

#[tokio::test]
async fn test_cancelled_session_sends_no_reply() {
    let started = Arc::new(Notify::new());
    let triage_reasoner =
        MockReasoner::scripted([Decision::delegate("transfer_to_issues_and_repairs")]);
    let issues_reasoner = MockReasoner::scripted([
        Decision::call("look_up_item", serde_json::json!({})),
        Decision::reply("unreachable"),
    ]);
    let issues = HandoffAgentConfig::new("IssuesAndRepairsAgent", "You are a support agent.")
        .with_tools(["look_up_item"]);
    let triage = HandoffAgentConfig::new("TriageAgent", "You are a triage agent.").with_delegate(
        "transfer_to_issues_and_repairs",
        "Use for issues, repairs, or refunds.",
        "IssuesAndRepairsAgent",
    );
    let console = ScriptedConsole::new(["I want a refund"]);

    let runtime = Runtime::new(RuntimeConfig::default());
    HandoffRoster::new(HandoffConfig::default())
        .with_tools(stalled_tools(&started))
        .with_agent(triage, Arc::new(triage_reasoner))
        .with_agent(issues, Arc::new(issues_reasoner.clone()))
        .with_user("TriageAgent", Arc::new(console.clone()))
        .install(&runtime)
        .unwrap();

    let cancel = CancellationToken::new();
    cancel_when_started(&started, &cancel);
    runtime.publish_with_token(Payload::Login, TopicId::new("User", "s1"), cancel);
    runtime.start().unwrap();
    runtime.stop_when_idle().await.unwrap();

    assert_eq!(issues_reasoner.requests().len(), 1);
    assert!(console.displayed().is_empty());
}
