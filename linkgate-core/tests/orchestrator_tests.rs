mod common;

use common::{orchestrator_with_clock, tool_call, EventCollector, PHASE, SESSION};
use linkgate_core::{codes, Decision, Error, SecurityEnvelope};
use serde_json::json;
use std::time::Duration;

// ===== End-to-End Link Ledger Tests =====

#[test]
fn test_seen_link_permitted_unseen_rejected() {
    let (mut orchestrator, _clock) = orchestrator_with_clock();
    orchestrator
        .session_ledger_mut(SESSION)
        .unwrap()
        .for_tab("tab-1")
        .seed(["https://news.example/a"], None);

    let seen = SecurityEnvelope::new(
        PHASE,
        tool_call("get_page_content", json!({"url": "https://news.example/a"})),
    )
    .with_current_tab("tab-1");
    assert!(orchestrator.evaluate(SESSION, &seen).unwrap().is_allow());

    let unseen = SecurityEnvelope::new(
        PHASE,
        tool_call("get_page_content", json!({"url": "https://evil.example/a"})),
    )
    .with_current_tab("tab-1");
    let decision = orchestrator.evaluate(SESSION, &unseen).unwrap();
    assert_eq!(decision.code(), Some(codes::UNSEEN_LINK));
    assert_eq!(decision.policy_id(), None);
}

#[test]
fn test_policy_denies_unseen_urls_array() {
    let (mut orchestrator, _clock) = orchestrator_with_clock();
    orchestrator
        .session_ledger_mut(SESSION)
        .unwrap()
        .for_tab("tab-1")
        .seed(["https://news.example/a"], None);

    let envelope = SecurityEnvelope::new(
        PHASE,
        tool_call(
            "get_page_content",
            json!({"urls": ["https://news.example/a", "https://evil.example/b"]}),
        ),
    )
    .with_current_tab("tab-1");

    let decision = orchestrator.evaluate(SESSION, &envelope).unwrap();
    assert!(decision.is_deny());
    assert_eq!(decision.code(), Some(codes::UNSEEN_LINK));
}

#[test]
fn test_policy_applies_when_gate_disabled() {
    use linkgate_core::{OrchestratorConfig, PolicySet, SecurityOrchestrator};

    let config = OrchestratorConfig::default().with_link_ledger_enforcement(false);
    let mut orchestrator = SecurityOrchestrator::new(config);
    orchestrator.load_policies(PolicySet::builtin().unwrap());
    orchestrator.register_session(SESSION).unwrap();

    let envelope = SecurityEnvelope::new(
        PHASE,
        tool_call("get_page_content", json!({"urls": ["https://evil.example/b"]})),
    )
    .with_current_tab("tab-1");

    let decision = orchestrator.evaluate(SESSION, &envelope).unwrap();
    assert_eq!(decision.policy_id(), Some("block-unseen-links"));
    match decision {
        Decision::Deny { details, .. } => {
            assert_eq!(details.failed_condition.as_deref(), Some("allUrlsIn"));
            assert!(details.condition_description.is_some());
        }
        other => panic!("expected deny, got {:?}", other),
    }
}

#[test]
fn test_links_expire_with_virtual_time() {
    let (mut orchestrator, clock) = orchestrator_with_clock();
    orchestrator
        .session_ledger_mut(SESSION)
        .unwrap()
        .for_tab("tab-1")
        .add("https://news.example/a", None);

    let envelope = SecurityEnvelope::new(
        PHASE,
        tool_call("get_page_content", json!({"urls": ["https://news.example/a"]})),
    )
    .with_current_tab("tab-1");
    assert!(orchestrator.evaluate(SESSION, &envelope).unwrap().is_allow());

    clock.advance(Duration::from_secs(31 * 60));
    assert!(orchestrator.evaluate(SESSION, &envelope).unwrap().is_deny());
}

#[test]
fn test_sessions_are_isolated() {
    let (mut orchestrator, _clock) = orchestrator_with_clock();
    orchestrator.register_session("window-2").unwrap();
    orchestrator
        .session_ledger_mut("window-2")
        .unwrap()
        .for_tab("tab-1")
        .add("https://news.example/a", None);

    let envelope = SecurityEnvelope::new(
        PHASE,
        tool_call("get_page_content", json!({"urls": ["https://news.example/a"]})),
    )
    .with_current_tab("tab-1");

    assert!(orchestrator.evaluate("window-2", &envelope).unwrap().is_allow());
    assert!(orchestrator.evaluate(SESSION, &envelope).unwrap().is_deny());
}

#[test]
fn test_cleanup_forgets_session() {
    let (mut orchestrator, _clock) = orchestrator_with_clock();
    assert!(orchestrator.cleanup_session(SESSION));

    let envelope = SecurityEnvelope::new(PHASE, tool_call("search_history", json!({})));
    let err: Error = orchestrator.evaluate(SESSION, &envelope).unwrap_err().into();
    assert!(err.is_session());
}

// ===== Audit Tests =====

#[test]
fn test_every_evaluation_audited() {
    let (mut orchestrator, _clock) = orchestrator_with_clock();
    let collector = EventCollector::new();
    orchestrator.add_hook(collector.clone());

    let allowed = SecurityEnvelope::new(PHASE, tool_call("search_history", json!({})))
        .with_request_id("req-1");
    let denied = SecurityEnvelope::new(
        PHASE,
        tool_call("get_page_content", json!({"url": "https://evil.example/"})),
    )
    .with_current_tab("tab-1")
    .with_request_id("req-2");

    orchestrator.evaluate(SESSION, &allowed).unwrap();
    orchestrator.evaluate(SESSION, &denied).unwrap();

    let events = collector.events();
    assert_eq!(collector.count(), 2);
    assert_eq!(events[0].request_id, "req-1");
    assert!(!events[0].is_deny());
    assert_eq!(events[1].request_id, "req-2");
    assert!(events[1].is_deny());
    assert_eq!(events[1].phase, PHASE);
}

// ===== Dispatcher Integration =====

#[test]
fn test_dispatcher_propagates_denial() {
    let (mut orchestrator, _clock) = orchestrator_with_clock();

    let mut dispatch = |url: &str| -> linkgate_core::Result<String> {
        let envelope = SecurityEnvelope::new(
            PHASE,
            tool_call("get_page_content", json!({"url": url})),
        )
        .with_current_tab("tab-1");
        orchestrator.evaluate(SESSION, &envelope)?.into_result()?;
        Ok(format!("fetched {}", url))
    };

    let err = dispatch("https://evil.example/").unwrap_err();
    assert!(err.is_denied());
    assert_eq!(err.denial_code(), Some(codes::UNSEEN_LINK));
}

#[test]
fn test_stats_reflect_state() {
    let (mut orchestrator, _clock) = orchestrator_with_clock();
    orchestrator
        .session_ledger_mut(SESSION)
        .unwrap()
        .for_tab("tab-1")
        .seed(["https://a.example/", "https://b.example/"], None);

    let stats = orchestrator.stats();
    assert!(stats.enabled);
    assert_eq!(stats.total_policies, 1);
    assert_eq!(stats.registered_phases, vec![PHASE.to_string()]);
    assert_eq!(stats.session_stats[SESSION].total_urls, 2);

    let json = serde_json::to_value(&stats).unwrap();
    assert_eq!(json["sessionCount"], 1);
    assert_eq!(json["policyBreakdown"][PHASE]["count"], 1);
}
