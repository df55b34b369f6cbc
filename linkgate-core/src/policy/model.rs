//! Policy document types.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::condition::Condition;

/// What a policy does when it applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Effect {
    Allow,
    Deny,
}

impl Effect {
    pub fn as_str(&self) -> &'static str {
        match self {
            Effect::Allow => "allow",
            Effect::Deny => "deny",
        }
    }
}

impl fmt::Display for Effect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Denial reported when a deny policy fires.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OnDeny {
    /// Machine-readable code, e.g. `UNSEEN_LINK`.
    pub code: String,
    /// Human-readable explanation.
    pub reason: String,
}

/// A declarative authorization policy.
///
/// ```json
/// {
///   "id": "block-unseen-links",
///   "enabled": true,
///   "phase": "tool.execution",
///   "match": { "action.type": "tool.call", "action.tool": "get_page_content|open_url" },
///   "conditions": [
///     { "type": "allUrlsIn", "urls": "action.urls", "ledger": "context.linkLedger" }
///   ],
///   "effect": "deny",
///   "onDeny": { "code": "UNSEEN_LINK", "reason": "URL not in selected request context" }
/// }
/// ```
///
/// For a `deny` policy the conditions describe the safe circumstances: the
/// policy denies when one of them fails. For an `allow` policy they are the
/// preconditions for allowing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Policy {
    /// Unique identifier.
    pub id: String,

    /// Disabled policies never apply. Omitted means enabled.
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Evaluation phase this policy belongs to.
    pub phase: String,

    /// Dot-path → expected value criteria. See [`super::check_policy_match`].
    #[serde(rename = "match")]
    pub match_criteria: Value,

    /// Evaluated in order.
    #[serde(default)]
    pub conditions: Vec<Condition>,

    pub effect: Effect,

    /// Required when `effect` is `deny`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_deny: Option<OnDeny>,
}

fn default_enabled() -> bool {
    true
}

impl Policy {
    /// Create an enabled policy with no conditions.
    pub fn new(id: impl Into<String>, phase: impl Into<String>, effect: Effect) -> Self {
        Self {
            id: id.into(),
            enabled: true,
            phase: phase.into(),
            match_criteria: Value::Object(Default::default()),
            conditions: Vec::new(),
            effect,
            on_deny: None,
        }
    }

    /// Replace the match criteria. Must be a JSON object to ever match.
    pub fn with_match(mut self, criteria: Value) -> Self {
        self.match_criteria = criteria;
        self
    }

    /// Append a condition.
    pub fn with_condition(mut self, condition: Condition) -> Self {
        self.conditions.push(condition);
        self
    }

    /// Set the denial reported when this policy denies.
    pub fn with_on_deny(mut self, code: impl Into<String>, reason: impl Into<String>) -> Self {
        self.on_deny = Some(OnDeny {
            code: code.into(),
            reason: reason.into(),
        });
        self
    }

    /// Enable or disable the policy.
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }
}
