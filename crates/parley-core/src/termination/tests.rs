use super::*;

fn conversation() -> Vec<Message> {
    vec![
        Message::user("Who was the Miami Heat player with the highest points?").from_source("user"),
        Message::assistant("1. WebSearchAgent: find the top scorer").from_source("PlanningAgent"),
        Message::assistant("Dwayne Wade: 1397 points").from_source("WebSearchAgent"),
        Message::assistant("Transferred to user")
            .from_source("travel_agent")
            .with_handoff("user"),
        Message::assistant("All done. TERMINATE").from_source("PlanningAgent"),
    ]
}

fn conditions() -> Vec<Termination> {
    vec![
        Termination::max_messages(3),
        Termination::text_mention("TERMINATE"),
        Termination::handoff("user"),
        Termination::source_match(["WebSearchAgent"]),
        Termination::max_messages(2) & Termination::text_mention("1397"),
        Termination::handoff("flights_refunder") | Termination::max_messages(4),
        (Termination::text_mention("nothing") | Termination::source_match(["travel_agent"]))
            & Termination::max_messages(1),
    ]
}

#[test]
fn test_max_messages() {
    let history = conversation();
    let stop = Termination::max_messages(3);
    assert_eq!(stop.evaluate(&history[..2]), None);
    assert_eq!(
        stop.evaluate(&history[..3]),
        Some(StopReason::MaxMessages { limit: 3 })
    );
}

#[test]
fn test_text_mention_and_handoff() {
    let history = conversation();
    assert_eq!(
        Termination::text_mention("TERMINATE").evaluate(&history),
        Some(StopReason::TextMention {
            text: "TERMINATE".to_string()
        })
    );
    assert_eq!(
        Termination::handoff("user").evaluate(&history[..4]),
        Some(StopReason::Handoff {
            target: "user".to_string()
        })
    );
    assert_eq!(Termination::handoff("user").evaluate(&history[..3]), None);
}

#[test]
fn test_source_match() {
    let history = conversation();
    let stop = Termination::source_match(["WebSearchAgent", "DataAnalystAgent"]);
    assert_eq!(stop.evaluate(&history[..2]), None);
    assert_eq!(
        stop.evaluate(&history),
        Some(StopReason::SourceMatch {
            source: "WebSearchAgent".to_string()
        })
    );
}

#[test]
fn test_and_flattens_reasons() {
    let history = conversation();
    let stop = Termination::max_messages(1)
        & Termination::source_match(["user"])
        & Termination::text_mention("Miami");
    let reason = stop.evaluate(&history).unwrap();
    match &reason {
        StopReason::All { reasons } => assert_eq!(reasons.len(), 3),
        other => panic!("unexpected reason: {other:?}"),
    }
    assert!(reason.to_string().contains(" and "));
}

#[test]
fn test_or_takes_first_holding_side() {
    let history = conversation();
    let stop = Termination::text_mention("never said") | Termination::max_messages(2);
    assert_eq!(
        stop.evaluate(&history),
        Some(StopReason::MaxMessages { limit: 2 })
    );
}

#[test]
fn test_monotonic_over_extensions() {
    let history = conversation();
    for condition in conditions() {
        let mut held = false;
        for len in 0..=history.len() {
            let stopped = condition.evaluate(&history[..len]).is_some();
            assert!(
                !held || stopped,
                "{condition:?} held at a shorter history but not at length {len}"
            );
            held = stopped;
        }
    }
}

#[test]
fn test_serde_roundtrip_from_config() {
    let json = r#"{"type":"or","value":[{"type":"handoff","value":"user"},{"type":"text_mention","value":"TERMINATE"}]}"#;
    let parsed: Termination = serde_json::from_str(json).unwrap();
    assert_eq!(
        parsed,
        Termination::handoff("user") | Termination::text_mention("TERMINATE")
    );
}

#[test]
fn test_stop_reason_display() {
    assert_eq!(
        StopReason::MaxTurns { limit: 20 }.to_string(),
        "maximum of 20 turns reached"
    );
    assert_eq!(
        StopReason::Handoff {
            target: "user".into()
        }
        .to_string(),
        "handoff to user"
    );
}
