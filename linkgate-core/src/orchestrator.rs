//! Session registry and per-request authorization.
//!
//! The [`SecurityOrchestrator`] owns one [`SessionLedger`] per assistant
//! session and the policies of every phase. A tool dispatcher hands it a
//! [`SecurityEnvelope`] before running a tool and acts on the returned
//! [`Decision`].
//!
//! # Example
//!
//! ```rust
//! use linkgate_core::orchestrator::{OrchestratorConfig, SecurityEnvelope, SecurityOrchestrator};
//! use serde_json::json;
//!
//! let mut orchestrator = SecurityOrchestrator::new(OrchestratorConfig::default());
//! orchestrator.register_session("window-1").unwrap();
//!
//! // Links the user could see on the current page
//! orchestrator
//!     .session_ledger_mut("window-1")
//!     .unwrap()
//!     .for_tab("tab-1")
//!     .seed(["https://news.example/story"], None);
//!
//! let envelope = SecurityEnvelope::new(
//!     "tool.execution",
//!     json!({"type": "tool.call", "tool": "get_page_content", "urls": ["https://evil.example/"]}),
//! )
//! .with_current_tab("tab-1");
//!
//! let decision = orchestrator.evaluate("window-1", &envelope).unwrap();
//! assert_eq!(decision.code(), Some("UNSEEN_LINK"));
//! ```

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::audit::{AuditHook, HookId, SecurityEvent};
use crate::context::EvaluationContext;
use crate::decision::{codes, Decision, DenyDetails};
use crate::ledger::{Clock, LedgerConfig, MergedView, SessionLedger, SystemClock};
use crate::normalize::normalize_url;
use crate::policy::{Policy, PolicyEvaluator, PolicySet};

/// Errors returned by [`SecurityOrchestrator`].
///
/// These are caller mistakes, not denials. A denial is an ordinary
/// [`Decision`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OrchestratorError {
    /// No session with this id has been registered.
    #[error("Session {0} is not registered")]
    UnknownSession(String),

    /// Session ids must be non-empty.
    #[error("Session id must be a non-empty string")]
    InvalidSessionId,

    /// The envelope is missing a required part.
    #[error("Invalid security envelope: {0}")]
    InvalidEnvelope(String),
}

/// Orchestrator settings.
///
/// Deserializes from e.g. `{"enabled": false}`; omitted fields keep their
/// defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OrchestratorConfig {
    /// Master switch. When off, every action is allowed and audited as a
    /// bypass.
    pub enabled: bool,

    /// Require every URL an action targets (`url`, `urls`) to be in the
    /// request's merged ledger view, before any phase policy runs.
    pub enforce_link_ledger: bool,

    /// Limits for every tab ledger.
    pub ledger: LedgerConfig,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            enforce_link_ledger: true,
            ledger: LedgerConfig::default(),
        }
    }
}

impl OrchestratorConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn with_link_ledger_enforcement(mut self, enforce: bool) -> Self {
        self.enforce_link_ledger = enforce;
        self
    }

    pub fn with_ledger(mut self, ledger: LedgerConfig) -> Self {
        self.ledger = ledger;
        self
    }
}

/// Who is asking, and from which tabs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestContext {
    /// Tab the assistant is attached to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_tab_id: Option<String>,

    /// Tabs the user explicitly referenced in the request.
    #[serde(default)]
    pub mentioned_tab_ids: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,

    /// Set when the conversation has ingested untrusted content.
    #[serde(default)]
    pub tainted: bool,

    /// Any other fields, readable by conditions as `context.<name>`.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl RequestContext {
    /// Current tab first, then mentioned tabs.
    pub fn tab_ids(&self) -> impl Iterator<Item = &str> {
        self.current_tab_id
            .iter()
            .chain(self.mentioned_tab_ids.iter())
            .map(String::as_str)
    }
}

/// Everything needed to authorize one action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecurityEnvelope {
    /// Pipeline phase, e.g. `tool.execution`.
    pub phase: String,
    /// The action, e.g. `{"type": "tool.call", "tool": "...", "urls": [...]}`.
    pub action: Value,
    #[serde(default)]
    pub context: RequestContext,
}

impl SecurityEnvelope {
    pub fn new(phase: impl Into<String>, action: Value) -> Self {
        Self {
            phase: phase.into(),
            action,
            context: RequestContext::default(),
        }
    }

    pub fn with_current_tab(mut self, tab_id: impl Into<String>) -> Self {
        self.context.current_tab_id = Some(tab_id.into());
        self
    }

    pub fn with_mentioned_tab(mut self, tab_id: impl Into<String>) -> Self {
        self.context.mentioned_tab_ids.push(tab_id.into());
        self
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.context.request_id = Some(request_id.into());
        self
    }

    pub fn with_tainted(mut self, tainted: bool) -> Self {
        self.context.tainted = tainted;
        self
    }

    /// Set an additional context field.
    pub fn with_context_field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.context.extra.insert(name.into(), value.into());
        self
    }
}

/// Snapshot of orchestrator state, for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrchestratorStats {
    pub enabled: bool,
    /// True once any policy is registered.
    pub initialized: bool,
    pub registered_phases: Vec<String>,
    pub total_policies: usize,
    pub policy_breakdown: BTreeMap<String, PhaseStats>,
    pub session_count: usize,
    pub session_stats: BTreeMap<String, SessionStats>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PhaseStats {
    pub count: usize,
    pub policies: Vec<PolicySummary>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PolicySummary {
    pub id: String,
    pub enabled: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStats {
    pub tab_count: usize,
    pub total_urls: usize,
}

/// Authorizes agent actions against session ledgers and phase policies.
///
/// Not internally synchronized. Hosts that dispatch tools concurrently must
/// serialize calls per orchestrator, e.g. behind a `Mutex`.
pub struct SecurityOrchestrator {
    config: OrchestratorConfig,
    clock: Arc<dyn Clock>,
    policies: PolicySet,
    evaluator: PolicyEvaluator,
    sessions: HashMap<String, SessionLedger>,
    hooks: Vec<(HookId, Box<dyn AuditHook>)>,
    next_hook_id: u64,
}

impl SecurityOrchestrator {
    /// Create an orchestrator with no sessions and no policies.
    pub fn new(config: OrchestratorConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock::new()))
    }

    /// Create an orchestrator whose ledgers read time from `clock`.
    pub fn with_clock(config: OrchestratorConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            config,
            clock,
            policies: PolicySet::new(),
            evaluator: PolicyEvaluator::new(),
            sessions: HashMap::new(),
            hooks: Vec::new(),
            next_hook_id: 0,
        }
    }

    /// Replace the policy evaluator, e.g. to supply custom conditions.
    pub fn with_evaluator(mut self, evaluator: PolicyEvaluator) -> Self {
        self.evaluator = evaluator;
        self
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Flip the master switch at runtime.
    pub fn set_enabled(&mut self, enabled: bool) {
        log::info!(
            "security enforcement {}",
            if enabled { "enabled" } else { "disabled" }
        );
        self.config.enabled = enabled;
    }

    // ===== Sessions =====

    /// Start tracking a session. Registering an existing session is a no-op.
    pub fn register_session(&mut self, session_id: &str) -> Result<(), OrchestratorError> {
        if session_id.is_empty() {
            return Err(OrchestratorError::InvalidSessionId);
        }
        if self.sessions.contains_key(session_id) {
            log::debug!("session {} already registered", session_id);
            return Ok(());
        }

        let ledger =
            SessionLedger::with_config(session_id, self.config.ledger, Arc::clone(&self.clock));
        self.sessions.insert(session_id.to_string(), ledger);
        log::debug!("registered session {}", session_id);
        Ok(())
    }

    /// Forget a session and all of its ledgers. Returns false if it was not
    /// registered.
    pub fn cleanup_session(&mut self, session_id: &str) -> bool {
        match self.sessions.remove(session_id) {
            Some(mut ledger) => {
                ledger.clear_all();
                log::debug!("cleaned up session {}", session_id);
                true
            }
            None => false,
        }
    }

    pub fn session_ledger(&self, session_id: &str) -> Option<&SessionLedger> {
        self.sessions.get(session_id)
    }

    /// Mutable access for recording trusted URLs as the user browses.
    pub fn session_ledger_mut(&mut self, session_id: &str) -> Option<&mut SessionLedger> {
        self.sessions.get_mut(session_id)
    }

    // ===== Policies =====

    /// Add every policy of a set, after any already registered for the same
    /// phase.
    pub fn load_policies(&mut self, policies: PolicySet) {
        log::debug!("loading {} policies", policies.len());
        self.policies.extend(policies);
    }

    pub fn add_policy(&mut self, policy: Policy) {
        self.policies.insert(policy);
    }

    /// Drop every policy of a phase. Returns false if the phase had none.
    pub fn remove_phase(&mut self, phase: &str) -> bool {
        self.policies.remove_phase(phase)
    }

    pub fn policies(&self) -> &PolicySet {
        &self.policies
    }

    // ===== Hooks =====

    /// Register an audit hook. Hooks are called in registration order.
    pub fn add_hook(&mut self, hook: impl AuditHook + 'static) -> HookId {
        let id = HookId(self.next_hook_id);
        self.next_hook_id += 1;
        self.hooks.push((id, Box::new(hook)));
        id
    }

    /// Returns false if no hook has this id.
    pub fn remove_hook(&mut self, id: HookId) -> bool {
        let before = self.hooks.len();
        self.hooks.retain(|(hook_id, _)| *hook_id != id);
        self.hooks.len() != before
    }

    // ===== Evaluation =====

    /// Authorize one action.
    ///
    /// In order:
    ///
    /// 1. With enforcement off, allow.
    /// 2. Snapshot the ledgers of the current and mentioned tabs.
    /// 3. Link gate: deny any targeted URL missing from the snapshot.
    /// 4. With no policies for the phase, allow.
    /// 5. Otherwise evaluate the phase's policies, first deny wins.
    ///
    /// Every outcome is reported to the audit hooks. Errors are returned only
    /// for an unregistered session or an unusable envelope.
    pub fn evaluate(
        &mut self,
        session_id: &str,
        envelope: &SecurityEnvelope,
    ) -> Result<Decision, OrchestratorError> {
        let started = Instant::now();

        let session = self
            .sessions
            .get_mut(session_id)
            .ok_or_else(|| OrchestratorError::UnknownSession(session_id.to_string()))?;

        if envelope.phase.is_empty() {
            return Err(OrchestratorError::InvalidEnvelope(
                "missing phase".to_string(),
            ));
        }
        if !envelope.action.is_object() {
            return Err(OrchestratorError::InvalidEnvelope(
                "action must be an object".to_string(),
            ));
        }

        let request_id = envelope
            .context
            .request_id
            .clone()
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        let mut record = AuditRecord {
            request_id: &request_id,
            session_id,
            envelope,
            started,
            trusted_count: 0,
            bypassed: false,
        };

        if !self.config.enabled {
            record.bypassed = true;
            let decision = Decision::allow(None, "Security disabled via configuration");
            self.emit(&record, &decision);
            return Ok(decision);
        }

        let view = session.merge(envelope.context.tab_ids());
        record.trusted_count = view.size();

        let decision = self.decide(session_id, &request_id, envelope, view);
        self.emit(&record, &decision);
        Ok(decision)
    }

    fn decide(
        &self,
        session_id: &str,
        request_id: &str,
        envelope: &SecurityEnvelope,
        view: MergedView,
    ) -> Decision {
        if self.config.enforce_link_ledger {
            if let Some(deny) = check_link_targets(envelope, &view) {
                return deny;
            }
        }

        let policies = self.policies.policies_for(&envelope.phase);
        if policies.is_empty() {
            log::warn!("no policies registered for phase {}", envelope.phase);
            return Decision::allow(None, "No policies for phase");
        }

        let mut fields = match serde_json::to_value(&envelope.context) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        };
        fields.insert("requestId".into(), request_id.into());
        fields.insert("sessionId".into(), session_id.into());
        fields.insert("timestamp".into(), self.clock.now_ms().into());

        let context = EvaluationContext::from_fields(fields).with_link_ledger(view);
        self.evaluator
            .evaluate_phase(policies, &envelope.action, &context)
    }

    fn emit(&self, record: &AuditRecord<'_>, decision: &Decision) {
        if self.hooks.is_empty() {
            return;
        }

        let event = SecurityEvent {
            request_id: record.request_id.to_string(),
            session_id: record.session_id.to_string(),
            phase: record.envelope.phase.clone(),
            tool: record
                .envelope
                .action
                .get("tool")
                .and_then(Value::as_str)
                .map(String::from),
            decision: decision.clone(),
            trusted_count: record.trusted_count,
            tainted: record.envelope.context.tainted,
            duration_ms: record.started.elapsed().as_millis() as u64,
            bypassed: record.bypassed,
            timestamp: Utc::now(),
        };

        for (_, hook) in &self.hooks {
            hook.on_event(&event);
        }
    }

    /// Counts of registered policies, sessions and ledger entries.
    pub fn stats(&self) -> OrchestratorStats {
        let policy_breakdown: BTreeMap<String, PhaseStats> = self
            .policies
            .iter()
            .map(|(phase, policies)| {
                let stats = PhaseStats {
                    count: policies.len(),
                    policies: policies
                        .iter()
                        .map(|p| PolicySummary {
                            id: p.id.clone(),
                            enabled: p.enabled,
                        })
                        .collect(),
                };
                (phase.to_string(), stats)
            })
            .collect();

        let session_stats = self
            .sessions
            .iter()
            .map(|(id, ledger)| {
                let stats = SessionStats {
                    tab_count: ledger.tab_count(),
                    total_urls: ledger.total_urls(),
                };
                (id.clone(), stats)
            })
            .collect();

        OrchestratorStats {
            enabled: self.config.enabled,
            initialized: !self.policies.is_empty(),
            registered_phases: self.policies.phases().map(String::from).collect(),
            total_policies: self.policies.len(),
            policy_breakdown,
            session_count: self.sessions.len(),
            session_stats,
        }
    }
}

impl std::fmt::Debug for SecurityOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecurityOrchestrator")
            .field("config", &self.config)
            .field("policies", &self.policies.len())
            .field("sessions", &self.sessions.len())
            .field("hooks", &self.hooks.len())
            .finish()
    }
}

struct AuditRecord<'a> {
    request_id: &'a str,
    session_id: &'a str,
    envelope: &'a SecurityEnvelope,
    started: Instant,
    trusted_count: usize,
    bypassed: bool,
}

/// Deny if the action targets a URL outside `view`.
///
/// Targets are the `url` string and the `urls` array of the action. An
/// action with no targets passes.
fn check_link_targets(envelope: &SecurityEnvelope, view: &MergedView) -> Option<Decision> {
    let action = &envelope.action;
    let single = action.get("url").filter(|v| !v.is_null());
    let many = action
        .get("urls")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();

    let mut targets = single.into_iter().chain(many).peekable();
    targets.peek()?;

    if envelope.context.current_tab_id.is_none() {
        log::warn!("action targets URLs but no current tab was given");
        return Some(Decision::deny_standard(
            codes::MISSING_CONTEXT,
            DenyDetails::default(),
        ));
    }

    for target in targets {
        let Some(url) = target.as_str() else {
            return Some(Decision::deny_standard(
                codes::MALFORMED_URL,
                DenyDetails::url(target.to_string()),
            ));
        };

        match normalize_url(url, None) {
            Ok(key) if view.contains(&key) => continue,
            Ok(_) => {
                log::warn!("denied unseen link {}", url);
                return Some(Decision::deny_standard(
                    codes::UNSEEN_LINK,
                    DenyDetails::url(url),
                ));
            }
            Err(e) => {
                log::warn!("denied malformed link {}: {}", url, e);
                return Some(Decision::deny_standard(
                    codes::MALFORMED_URL,
                    DenyDetails::url(url),
                ));
            }
        }
    }

    None
}
