//! Common test utilities shared across test files.
//!
//! Items here may not be used by all test files, hence the module-level allow.
#![allow(dead_code)]

use linkgate_core::{
    AuditHook, ManualClock, OrchestratorConfig, PolicySet, SecurityEvent, SecurityOrchestrator,
};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};

pub const SESSION: &str = "window-1";
pub const PHASE: &str = "tool.execution";

// ===== Event Collector =====

/// Records every audit event for later assertions.
#[derive(Clone, Default)]
pub struct EventCollector {
    events: Arc<Mutex<Vec<SecurityEvent>>>,
}

impl EventCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<SecurityEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn count(&self) -> usize {
        self.events.lock().unwrap().len()
    }
}

impl AuditHook for EventCollector {
    fn on_event(&self, event: &SecurityEvent) {
        self.events.lock().unwrap().push(event.clone());
    }
}

// ===== Fixtures =====

/// An orchestrator on a manual clock with the shipped policies and one
/// registered session.
pub fn orchestrator_with_clock() -> (SecurityOrchestrator, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new());
    let mut orchestrator =
        SecurityOrchestrator::with_clock(OrchestratorConfig::default(), clock.clone());
    orchestrator.load_policies(PolicySet::builtin().unwrap());
    orchestrator.register_session(SESSION).unwrap();
    (orchestrator, clock)
}

pub fn tool_call(tool: &str, extra: Value) -> Value {
    let mut action = json!({"type": "tool.call", "tool": tool});
    if let (Some(action), Some(extra)) = (action.as_object_mut(), extra.as_object()) {
        for (key, value) in extra {
            action.insert(key.clone(), value.clone());
        }
    }
    action
}

/// A deny policy for `tool` whose single condition requires
/// `action.<field>` to equal `expected`.
pub fn deny_unless(id: &str, tool: &str, field: &str, expected: Value) -> Value {
    json!({
        "id": id,
        "phase": PHASE,
        "match": {"action.type": "tool.call", "action.tool": tool},
        "conditions": [
            {"type": "equals", "actual": format!("action.{}", field), "expected": expected}
        ],
        "effect": "deny",
        "onDeny": {"code": format!("{}_DENIED", id.to_uppercase()), "reason": format!("{} denied", id)}
    })
}

pub fn allow_tool(id: &str, tool: &str) -> Value {
    json!({
        "id": id,
        "phase": PHASE,
        "match": {"action.tool": tool},
        "conditions": [],
        "effect": "allow"
    })
}
