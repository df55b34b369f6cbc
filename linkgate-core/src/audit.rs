//! Audit events for authorization decisions.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::decision::Decision;

/// One orchestrated authorization decision.
///
/// Emitted exactly once per [`SecurityOrchestrator::evaluate`] call that gets
/// past envelope checks, including bypassed evaluations.
///
/// [`SecurityOrchestrator::evaluate`]: crate::orchestrator::SecurityOrchestrator::evaluate
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SecurityEvent {
    /// Caller-supplied request id, or a generated one.
    pub request_id: String,
    pub session_id: String,
    pub phase: String,
    /// `action.tool`, when the action names one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool: Option<String>,
    pub decision: Decision,
    /// Size of the request's merged ledger view.
    pub trusted_count: usize,
    /// Whether the request context was marked as carrying untrusted content.
    pub tainted: bool,
    /// Wall time spent evaluating, in milliseconds.
    pub duration_ms: u64,
    /// True when enforcement was switched off and the action was let through.
    pub bypassed: bool,
    pub timestamp: DateTime<Utc>,
}

impl SecurityEvent {
    pub fn is_deny(&self) -> bool {
        self.decision.is_deny()
    }
}

/// Receives audit events from the orchestrator.
///
/// Hooks run synchronously, in registration order, before `evaluate`
/// returns. Keep them cheap; forward to a channel for anything slow.
///
/// # Example
///
/// ```rust
/// use linkgate_core::audit::{AuditHook, SecurityEvent};
///
/// struct DenyCounter(std::sync::atomic::AtomicUsize);
///
/// impl AuditHook for DenyCounter {
///     fn on_event(&self, event: &SecurityEvent) {
///         if event.is_deny() {
///             self.0.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
///         }
///     }
/// }
/// ```
pub trait AuditHook: Send + Sync {
    /// Called once per decision
    fn on_event(&self, event: &SecurityEvent);
}

/// Blanket implementation for closures
impl<F> AuditHook for F
where
    F: Fn(&SecurityEvent) + Send + Sync,
{
    fn on_event(&self, event: &SecurityEvent) {
        self(event)
    }
}

/// Writes every event to the `log` facade under the `linkgate::audit` target.
///
/// Denials are logged at `warn`, everything else at `debug`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogAuditHook;

impl AuditHook for LogAuditHook {
    fn on_event(&self, event: &SecurityEvent) {
        let level = if event.is_deny() {
            log::Level::Warn
        } else {
            log::Level::Debug
        };

        match serde_json::to_string(event) {
            Ok(json) => log::log!(target: "linkgate::audit", level, "{}", json),
            Err(e) => log::error!(target: "linkgate::audit", "failed to serialize event: {}", e),
        }
    }
}

/// Identifies a registered hook so it can be removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HookId(pub(crate) u64);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decision::{codes, DenyDetails};
    use serde_json::json;

    fn event(decision: Decision) -> SecurityEvent {
        SecurityEvent {
            request_id: "req-1".into(),
            session_id: "window-1".into(),
            phase: "tool.execution".into(),
            tool: Some("get_page_content".into()),
            decision,
            trusted_count: 3,
            tainted: false,
            duration_ms: 2,
            bypassed: false,
            timestamp: DateTime::parse_from_rfc3339("2026-01-01T00:00:00Z")
                .unwrap()
                .with_timezone(&Utc),
        }
    }

    #[test]
    fn test_event_serializes_camel_case() {
        let deny = Decision::deny_standard(codes::UNSEEN_LINK, DenyDetails::url("https://x.example/"));
        let value = serde_json::to_value(event(deny)).unwrap();

        assert_eq!(value["requestId"], "req-1");
        assert_eq!(value["trustedCount"], 3);
        assert_eq!(value["decision"]["effect"], "deny");
        assert_eq!(value["decision"]["code"], "UNSEEN_LINK");
        assert_eq!(value["timestamp"], json!("2026-01-01T00:00:00Z"));
    }

    #[test]
    fn test_closure_hook() {
        use std::sync::{Arc, Mutex};

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let hook = move |e: &SecurityEvent| sink.lock().unwrap().push(e.request_id.clone());

        hook.on_event(&event(Decision::allow(None, "ok")));
        LogAuditHook.on_event(&event(Decision::allow(None, "ok")));

        assert_eq!(*seen.lock().unwrap(), vec!["req-1".to_string()]);
    }
}
