//! # Linkgate
//!
//! Authorization layer for the tool calls of an in-browser AI assistant.
//!
//! An assistant that can fetch pages is one prompt injection away from being
//! told to fetch a URL the user never saw, with private data in its query
//! string. Linkgate keeps, per browsing tab, a short-lived set of URLs the user
//! has actually been shown, and refuses tool calls that reach outside the
//! tabs a request is scoped to. On top of that, declarative JSON policies are
//! evaluated per pipeline phase with "first deny wins" semantics.
//!
//! ## Quick Start
//!
//! ```rust
//! use linkgate_core::{OrchestratorConfig, PolicySet, SecurityEnvelope, SecurityOrchestrator};
//! use serde_json::json;
//!
//! # fn main() -> linkgate_core::Result<()> {
//! let mut orchestrator = SecurityOrchestrator::new(OrchestratorConfig::default());
//! orchestrator.load_policies(PolicySet::from_json_str(r#"{
//!   "policies": [{
//!     "id": "block-unseen-links",
//!     "phase": "tool.execution",
//!     "match": {"action.type": "tool.call", "action.tool": "get_page_content"},
//!     "conditions": [
//!       {"type": "allUrlsIn", "urls": "action.urls", "ledger": "context.linkLedger"}
//!     ],
//!     "effect": "deny",
//!     "onDeny": {"code": "UNSEEN_LINK", "reason": "URL not in selected request context"}
//!   }]
//! }"#)?);
//!
//! orchestrator.register_session("window-1")?;
//! if let Some(session) = orchestrator.session_ledger_mut("window-1") {
//!     session.for_tab("tab-1").seed(["https://news.example/story"], None);
//! }
//!
//! let envelope = SecurityEnvelope::new(
//!     "tool.execution",
//!     json!({"type": "tool.call", "tool": "get_page_content", "urls": ["https://news.example/story"]}),
//! )
//! .with_current_tab("tab-1");
//!
//! // A deny becomes an error the tool dispatcher can propagate with `?`
//! orchestrator.evaluate("window-1", &envelope)?.into_result()?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - [`normalize`] - canonical URL keys
//! - [`site`] - same-site comparison
//! - [`ledger`] - per-tab trusted URL ledgers and merged request views
//! - [`condition`] / [`context`] - policy conditions and the data they read
//! - [`policy`] - policy documents, validation, loading and evaluation
//! - [`decision`] - allow/deny outcomes and standard denial codes
//! - [`orchestrator`] - sessions, the link gate and per-phase evaluation
//! - [`audit`] - one event per decision, delivered to hooks

pub mod audit;
pub mod condition;
pub mod context;
pub mod decision;
pub mod error;
pub mod ledger;
pub mod normalize;
pub mod orchestrator;
pub mod policy;
pub mod site;

pub use audit::{AuditHook, HookId, LogAuditHook, SecurityEvent};
pub use condition::{BuiltinConditions, Condition, ConditionEvaluator, ConditionKind};
pub use context::{resolve_path, EvaluationContext};
pub use decision::{codes, Decision, DenyDetails, SecurityPolicyError};
pub use error::{Error, Result};
pub use ledger::{
    Clock, LedgerConfig, ManualClock, MergedView, SessionLedger, SystemClock, TabLedger,
};
pub use normalize::{normalize_url, NormalizeError, NormalizedUrl};
pub use orchestrator::{
    OrchestratorConfig, OrchestratorError, OrchestratorStats, RequestContext, SecurityEnvelope,
    SecurityOrchestrator,
};
pub use policy::{
    check_policy_match, evaluate_phase, evaluate_policy, validate_policy, Effect, OnDeny, Policy,
    PolicyEvaluator, PolicyLoadError, PolicySet, ValidationReport,
};
pub use site::{same_site, DomainResolver};
