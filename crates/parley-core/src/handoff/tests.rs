use super::*;
use crate::agent::{Agent, MessageContext};
use crate::config::HandoffConfig;
use crate::console::{MockUserConsole, ScriptedConsole, SharedConsole};
use crate::decision::DecisionLoop;
use crate::error::Error;
use crate::event_bus::{EventBus, RuntimeEvent};
use crate::message::{Envelope, Payload, Transfer};
use crate::runtime::Runtime;
use crate::topic::{AgentId, TopicId};
use crate::RuntimeConfig;
use parley_llm::{Decision, Message, MockReasoner};
use parley_tools::builtins::{look_up_item_tool, transfer_tool};
use parley_tools::{ToolRegistry, ToolRunner};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

const SESSION: &str = "s1";

fn triage_config() -> HandoffAgentConfig {
    HandoffAgentConfig::new("TriageAgent", "You are a customer service bot for ACME Inc.")
        .with_description("Routes customers to the right department")
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

fn issues_config() -> HandoffAgentConfig {
    HandoffAgentConfig::new("IssuesAndRepairsAgent", "You are a customer support agent.")
        .with_tools(["look_up_item"])
        .with_delegate(
            "transfer_back_to_triage",
            "Call this if the user brings up a topic outside of your purview.",
            "TriageAgent",
        )
}

fn tools() -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(Arc::new(look_up_item_tool()));
    registry
}

fn login(runtime: &Runtime) {
    runtime.publish(Payload::Login, TopicId::new("User", SESSION));
}

fn support_desk(
    triage: &MockReasoner,
    issues: &MockReasoner,
    user: &ScriptedConsole,
    human: &ScriptedConsole,
) -> Runtime {
    let runtime = Runtime::new(RuntimeConfig::default());
    HandoffRoster::new(HandoffConfig::default())
        .with_tools(tools())
        .with_agent(triage_config(), Arc::new(triage.clone()))
        .with_agent(issues_config(), Arc::new(issues.clone()))
        .with_user("TriageAgent", Arc::new(user.clone()))
        .with_human("HumanAgent", Arc::new(human.clone()))
        .install(&runtime)
        .unwrap();
    runtime
}

#[tokio::test]
async fn test_transfer_preserves_context() {
    let triage = MockReasoner::scripted([Decision::delegate("transfer_to_issues_and_repairs")]);
    let issues = MockReasoner::scripted([
        Decision::call("look_up_item", serde_json::json!({"search_query": "rocket skates"})),
        Decision::reply("Your refund for item_132612938 is on its way."),
    ]);
    let user = ScriptedConsole::new(["I want a refund"]);
    let runtime = support_desk(&triage, &issues, &user, &ScriptedConsole::default());
    let mut events = runtime.events();

    login(&runtime);
    runtime.start().unwrap();
    runtime.stop_when_idle().await.unwrap();

    let requests = issues.requests();
    assert_eq!(requests.len(), 2);
    let first = &requests[0].history;
    assert_eq!(first[0].content, "I want a refund");
    assert_eq!(first[1].handoff_to.as_deref(), Some("IssuesAndRepairsAgent"));
    assert!(first[2].content.starts_with("Transferred to IssuesAndRepairsAgent"));

    assert_eq!(
        user.displayed(),
        vec![(
            "IssuesAndRepairsAgent".to_string(),
            "Your refund for item_132612938 is on its way.".to_string()
        )]
    );

    let mut handoffs = Vec::new();
    while let Some(event) = events.try_recv() {
        if let RuntimeEvent::HandoffPerformed { from, to, hops, .. } = event {
            handoffs.push((from, to, hops));
        }
    }
    assert_eq!(
        handoffs,
        vec![(
            "TriageAgent".to_string(),
            "IssuesAndRepairsAgent".to_string(),
            1
        )]
    );
}

#[tokio::test]
async fn test_user_answers_go_to_last_replier() {
    let triage = MockReasoner::scripted([Decision::delegate("transfer_to_issues_and_repairs")]);
    let issues = MockReasoner::scripted([
        Decision::reply("Which item?"),
        Decision::reply("Refunded."),
    ]);
    let user = ScriptedConsole::new(["I want a refund", "The rocket skates"]);
    let runtime = support_desk(&triage, &issues, &user, &ScriptedConsole::default());

    login(&runtime);
    runtime.start().unwrap();
    runtime.stop_when_idle().await.unwrap();

    // Triage decided once; the follow-up went straight to the issues agent
    assert_eq!(triage.requests().len(), 1);
    let requests = issues.requests();
    assert_eq!(requests.len(), 2);
    let follow_up = &requests[1].history;
    assert_eq!(follow_up.last().unwrap().content, "The rocket skates");
    assert!(follow_up.iter().any(|m| m.content == "Which item?"));
    assert_eq!(user.displayed().len(), 2);
}

#[tokio::test]
async fn test_capability_error_is_reported_and_session_continues() {
    let triage = MockReasoner::new();
    triage.push_error(parley_llm::Error::Api("model overloaded".into()));
    triage.push(Decision::reply("How can I help?"));
    let user = ScriptedConsole::new(["hello", "hello again"]);
    let runtime = support_desk(&triage, &MockReasoner::new(), &user, &ScriptedConsole::default());

    login(&runtime);
    runtime.start().unwrap();
    runtime.stop_when_idle().await.unwrap();

    let displayed = user.displayed();
    assert_eq!(displayed.len(), 2);
    assert_eq!(displayed[0].0, "TriageAgent");
    assert!(displayed[0].1.starts_with("Error:"));
    assert!(displayed[0].1.contains("model overloaded"));
    assert_eq!(displayed[1].1, "How can I help?");

    let retry = &triage.requests()[1].history;
    assert_eq!(retry.last().unwrap().content, "hello again");
}

#[tokio::test]
async fn test_escalation_to_human() {
    let triage = MockReasoner::scripted([Decision::delegate("escalate_to_human")]);
    let user = ScriptedConsole::new(["Let me talk to a person"]);
    let human = ScriptedConsole::new(["Hi, this is Sam. How can I help?"]);
    let runtime = support_desk(&triage, &MockReasoner::new(), &user, &human);

    login(&runtime);
    runtime.start().unwrap();
    runtime.stop_when_idle().await.unwrap();

    assert_eq!(human.displayed().len(), 1);
    assert_eq!(
        user.displayed(),
        vec![(
            "HumanAgent".to_string(),
            "Hi, this is Sam. How can I help?".to_string()
        )]
    );
}

#[tokio::test]
async fn test_hop_bound_stops_session() {
    let config = HandoffConfig {
        max_hops: 2,
        ..HandoffConfig::default()
    };
    let ping = MockReasoner::scripted([
        Decision::delegate("transfer_to_pong"),
        Decision::delegate("transfer_to_pong"),
    ]);
    let pong = MockReasoner::scripted([Decision::delegate("transfer_to_ping")]);
    let user = ScriptedConsole::new(["start"]);

    let runtime = Runtime::new(RuntimeConfig::default());
    HandoffRoster::new(config)
        .with_agent(
            HandoffAgentConfig::new("Ping", "").with_delegate("transfer_to_pong", "", "Pong"),
            Arc::new(ping.clone()),
        )
        .with_agent(
            HandoffAgentConfig::new("Pong", "").with_delegate("transfer_to_ping", "", "Ping"),
            Arc::new(pong.clone()),
        )
        .with_user("Ping", Arc::new(user.clone()))
        .install(&runtime)
        .unwrap();

    login(&runtime);
    runtime.start().unwrap();
    let err = runtime.stop_when_idle().await.unwrap_err();

    assert!(matches!(err, Error::Protocol(_)));
    assert!(err.to_string().contains("exceeded 2 delegations"));
    assert_eq!(ping.requests().len(), 2);
    assert_eq!(pong.requests().len(), 1);
    assert!(user.displayed().is_empty());
}

#[test]
fn test_conflicting_delegate_tools_rejected() {
    let runtime = Runtime::new(RuntimeConfig::default());
    let err = HandoffRoster::new(HandoffConfig::default())
        .with_agent(
            HandoffAgentConfig::new("A", "").with_delegate("transfer", "", "B"),
            Arc::new(MockReasoner::new()),
        )
        .with_agent(
            HandoffAgentConfig::new("B", "").with_delegate("transfer", "", "A"),
            Arc::new(MockReasoner::new()),
        )
        .install(&runtime)
        .unwrap_err();
    assert!(matches!(err, Error::Configuration(_)));
}

#[test]
fn test_delegate_without_subscriber_rejected() {
    let runtime = Runtime::new(RuntimeConfig::default());
    let err = HandoffRoster::new(HandoffConfig::default())
        .with_agent(
            HandoffAgentConfig::new("A", "").with_delegate("transfer_to_sales", "", "SalesAgent"),
            Arc::new(MockReasoner::new()),
        )
        .install(&runtime)
        .unwrap_err();
    assert!(err.to_string().contains("SalesAgent"));
}

#[test]
fn test_unknown_registry_tool_rejected() {
    let runtime = Runtime::new(RuntimeConfig::default());
    let err = HandoffRoster::new(HandoffConfig::default())
        .with_agent(
            HandoffAgentConfig::new("A", "").with_tools(["execute_refund"]),
            Arc::new(MockReasoner::new()),
        )
        .install(&runtime)
        .unwrap_err();
    assert!(matches!(err, Error::Configuration(_)));
}

#[tokio::test]
async fn test_entry_agent_may_answer_the_user() {
    let triage = MockReasoner::scripted([Decision::reply("Hello! How can I help?")]);
    let issues = MockReasoner::new();
    let user = ScriptedConsole::new(["hi"]);
    let runtime = support_desk(&triage, &issues, &user, &ScriptedConsole::default());

    login(&runtime);
    runtime.start().unwrap();
    runtime.stop_when_idle().await.unwrap();

    let requests = triage.requests();
    assert_eq!(
        requests[0].delegate_targets,
        vec!["IssuesAndRepairsAgent", "HumanAgent", "User"]
    );
    assert!(issues.requests().is_empty());
}

#[test]
fn test_coordinator_targets_include_user() {
    let config = triage_config();
    assert_eq!(
        config.delegate_targets("User"),
        vec!["IssuesAndRepairsAgent", "HumanAgent"]
    );
    let config = config.as_coordinator();
    assert_eq!(
        config.delegate_targets("User"),
        vec!["IssuesAndRepairsAgent", "HumanAgent", "User"]
    );
}

#[test]
fn test_agent_config_from_toml_shape() {
    let config: HandoffAgentConfig = serde_json::from_value(serde_json::json!({
        "name": "SalesAgent",
        "system_prompt": "You are a sales agent.",
        "tools": ["execute_order"],
        "delegates": [{"tool": "transfer_back_to_triage", "target": "TriageAgent"}]
    }))
    .unwrap();
    assert_eq!(config.delegates[0].target, "TriageAgent");
    assert!(config.description.is_empty());
    assert!(!config.coordinator);
    assert_eq!(config.max_hops, None);
}

fn direct_agent(reasoner: &MockReasoner, max_iterations: usize) -> HandoffAgent {
    let mut registry = tools();
    registry.register(Arc::new(transfer_tool(
        "transfer_to_issues_and_repairs",
        "",
        "IssuesAndRepairsAgent",
    )));
    let decision = DecisionLoop::new(
        "TriageAgent",
        "",
        Arc::new(reasoner.clone()),
        ToolRunner::with_defaults(Arc::new(registry)),
    )
    .with_tools(&["look_up_item"])
    .unwrap()
    .with_delegates(
        &["transfer_to_issues_and_repairs"],
        vec!["IssuesAndRepairsAgent".to_string()],
    )
    .unwrap()
    .with_max_iterations(max_iterations);
    HandoffAgent::new(Arc::new(decision), "User", 4)
}

fn transfer_envelope(content: &str, hops: u32) -> Envelope {
    Envelope::new(
        Some(AgentId::new("User", SESSION)),
        TopicId::new("TriageAgent", SESSION),
        Payload::Transfer(Transfer {
            context: vec![Message::user(content).from_source("User")],
            hops,
        }),
        CancellationToken::new(),
    )
}

fn context() -> MessageContext {
    MessageContext::new(
        AgentId::new("TriageAgent", SESSION),
        CancellationToken::new(),
        EventBus::default(),
    )
}

#[tokio::test]
async fn test_agent_states() {
    let reasoner = MockReasoner::scripted([Decision::reply("Hello!")]);
    let mut agent = direct_agent(&reasoner, 3);
    assert_eq!(agent.state(), HandoffState::Idle);

    let mut ctx = context();
    agent.on_message(&transfer_envelope("hi", 0), &mut ctx).await.unwrap();
    assert_eq!(agent.state(), HandoffState::AwaitingUser);
    assert_eq!(agent.history().len(), 2);
    let outbox = ctx.into_outbox();
    assert_eq!(outbox[0].topic, TopicId::new("User", SESSION));
    assert!(matches!(&outbox[0].payload, Payload::Reply(r) if r.reply_to == "TriageAgent"));

    reasoner.push(Decision::delegate("transfer_to_issues_and_repairs"));
    let mut ctx = context();
    agent.on_message(&transfer_envelope("refund", 1), &mut ctx).await.unwrap();
    assert_eq!(agent.state(), HandoffState::Delegated);
    let outbox = ctx.into_outbox();
    assert!(matches!(&outbox[0].payload, Payload::Transfer(t) if t.hops == 2));
}

#[tokio::test]
async fn test_exhausted_agent_reports_and_terminates() {
    let reasoner = MockReasoner::new();
    for _ in 0..2 {
        reasoner.push(Decision::call("look_up_item", serde_json::json!({"search_query": "x"})));
    }
    let mut agent = direct_agent(&reasoner, 2);

    let mut ctx = context();
    agent.on_message(&transfer_envelope("find x", 0), &mut ctx).await.unwrap();
    assert_eq!(agent.state(), HandoffState::Terminated);
    // user turn + two tool rounds
    assert_eq!(agent.history().len(), 5);
    let outbox = ctx.into_outbox();
    assert!(matches!(
        &outbox[0].payload,
        Payload::Diagnostic(d) if d.error == "TriageAgent could not finish the request"
    ));
}

#[tokio::test]
async fn test_failed_turn_keeps_only_the_transferred_context() {
    let reasoner = MockReasoner::scripted([Decision::call(
        "look_up_item",
        serde_json::json!({"search_query": "rocket skates"}),
    )]);
    reasoner.push_error(parley_llm::Error::Api("model overloaded".into()));
    let mut agent = direct_agent(&reasoner, 3);

    let mut ctx = context();
    agent.on_message(&transfer_envelope("refund my skates", 0), &mut ctx).await.unwrap();
    assert_eq!(agent.state(), HandoffState::AwaitingUser);
    assert_eq!(agent.history().len(), 1);
    assert_eq!(agent.history().turns()[0].content, "refund my skates");
    let outbox = ctx.into_outbox();
    assert!(matches!(
        &outbox[0].payload,
        Payload::Diagnostic(d) if d.error.contains("model overloaded")
    ));
}

#[tokio::test]
async fn test_cancelled_transfer_publishes_nothing() {
    let reasoner = MockReasoner::new();
    let mut agent = direct_agent(&reasoner, 3);
    let token = CancellationToken::new();
    token.cancel();
    let mut ctx = MessageContext::new(
        AgentId::new("TriageAgent", SESSION),
        token,
        EventBus::default(),
    );

    let err = agent
        .on_message(&transfer_envelope("hi", 0), &mut ctx)
        .await
        .unwrap_err();
    assert!(err.is_cancelled());
    assert_eq!(ctx.pending(), 0);
    assert!(reasoner.requests().is_empty());
}

#[tokio::test]
async fn test_agent_rejects_other_payloads() {
    let mut agent = direct_agent(&MockReasoner::new(), 3);
    let envelope = Envelope::new(
        None,
        TopicId::new("TriageAgent", SESSION),
        Payload::RequestToSpeak,
        CancellationToken::new(),
    );
    let err = agent.on_message(&envelope, &mut context()).await.unwrap_err();
    assert!(err.is_fatal());
}

#[tokio::test]
async fn test_human_without_answer_reports_to_user() {
    let mut console = MockUserConsole::new();
    console.expect_display().times(1).return_const(());
    console.expect_read().times(1).returning(|_, _| None);
    let console: SharedConsole = Arc::new(console);
    let mut human = HumanAgent::new("HumanAgent", "User", console);

    let mut ctx = context();
    human
        .on_message(&transfer_envelope("help", 1), &mut ctx)
        .await
        .unwrap();

    let outbox = ctx.into_outbox();
    assert_eq!(outbox.len(), 1);
    assert_eq!(outbox[0].topic.topic_type, "User");
    assert!(matches!(
        &outbox[0].payload,
        Payload::Diagnostic(d) if d.error == "no human agent answered"
    ));
}

#[tokio::test]
async fn test_user_ends_session_on_empty_console() {
    let mut console = MockUserConsole::new();
    console.expect_read().times(1).returning(|_, _| None);
    let mut user = UserAgent::new("User", "TriageAgent", Arc::new(console));
    let envelope = Envelope::new(
        None,
        TopicId::new("User", SESSION),
        Payload::Login,
        CancellationToken::new(),
    );

    let mut ctx = context();
    user.on_message(&envelope, &mut ctx).await.unwrap();
    assert_eq!(ctx.pending(), 0);
}
