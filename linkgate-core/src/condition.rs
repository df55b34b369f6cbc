//! Policy conditions.
//!
//! A condition is a JSON object keyed by `type`. The set of kinds is closed:
//! an unknown `type` is rejected when a policy is decoded, never at
//! evaluation time.
//!
//! | `type` | Fields | Passes when |
//! |--------|--------|-------------|
//! | `allUrlsIn` | `urls`, `ledger` | every URL at `urls` is in the ledger view (or there are none) |
//! | `equals` | `actual`, `expected` | the value at `actual` equals `expected` |
//! | `matches` | `value`, `pattern` | the value at `value` matches the regex |
//! | `noPatternInParams` | `params`, `pattern` | the JSON of `params` does not match the regex |
//!
//! Every condition may carry a `description`, which is copied into deny
//! decisions when the condition fails.

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::context::{resolve_path, EvaluationContext};

/// One condition of a policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    #[serde(flatten)]
    pub kind: ConditionKind,

    /// Human-readable explanation, reported on failure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// The closed set of condition kinds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ConditionKind {
    /// Every URL in an array must be present in a ledger view.
    AllUrlsIn {
        /// Path to the URL array, e.g. `action.urls`.
        urls: String,
        /// Path to the ledger view, e.g. `context.linkLedger`.
        ledger: String,
    },

    /// A resolved value must equal a literal.
    Equals {
        /// Path to the value under test.
        actual: String,
        /// Literal to compare against.
        #[serde(default)]
        expected: Value,
    },

    /// A resolved value must match a regular expression.
    Matches {
        /// Path to the value under test.
        value: String,
        /// Regular expression (unanchored search).
        pattern: String,
    },

    /// A regular expression must not appear anywhere in the serialized
    /// parameters.
    NoPatternInParams {
        /// Path to the parameters, e.g. `action.args`.
        params: String,
        /// Regular expression to block.
        pattern: String,
    },
}

impl ConditionKind {
    /// The `type` tag as it appears in policy JSON.
    pub fn type_name(&self) -> &'static str {
        match self {
            ConditionKind::AllUrlsIn { .. } => "allUrlsIn",
            ConditionKind::Equals { .. } => "equals",
            ConditionKind::Matches { .. } => "matches",
            ConditionKind::NoPatternInParams { .. } => "noPatternInParams",
        }
    }
}

impl Condition {
    pub fn new(kind: ConditionKind) -> Self {
        Self {
            kind,
            description: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// The `type` tag of this condition.
    pub fn type_name(&self) -> &'static str {
        self.kind.type_name()
    }

    /// Evaluate against an action and context. Fails closed on any
    /// malformed input (missing ledger, invalid pattern).
    pub fn evaluate(&self, action: &Value, context: &EvaluationContext) -> bool {
        let fields = context.fields();
        match &self.kind {
            ConditionKind::AllUrlsIn { urls, ledger } => {
                let items = match resolve_path(urls, action, fields) {
                    Some(Value::Array(items)) if !items.is_empty() => items,
                    _ => return true,
                };
                let Some(view) = context.ledger(ledger) else {
                    log::error!("ledger not found or invalid: {}", ledger);
                    return false;
                };
                let unseen = items
                    .iter()
                    .find(|url| !url.as_str().is_some_and(|url| view.has(url, None)));
                match unseen {
                    Some(url) => {
                        log::warn!(
                            "URL not in ledger: {} {}",
                            url,
                            self.description.as_deref().unwrap_or_default()
                        );
                        false
                    }
                    None => true,
                }
            }

            ConditionKind::Equals { actual, expected } => {
                let matched = resolve_path(actual, action, fields) == Some(expected);
                if !matched {
                    log::warn!(
                        "equality check failed: expected {}, got {:?}",
                        expected,
                        resolve_path(actual, action, fields)
                    );
                }
                matched
            }

            ConditionKind::Matches { value, pattern } => {
                let text = match resolve_path(value, action, fields) {
                    None | Some(Value::Null) => return false,
                    Some(Value::String(s)) => s.clone(),
                    Some(other) => other.to_string(),
                };
                let Some(re) = compile(pattern) else {
                    return false;
                };
                let matched = re.is_match(&text);
                if !matched {
                    log::warn!("pattern match failed: {:?} does not match {}", text, pattern);
                }
                matched
            }

            ConditionKind::NoPatternInParams { params, pattern } => {
                let params = match resolve_path(params, action, fields) {
                    None | Some(Value::Null) => return true,
                    Some(params) => params,
                };
                let Some(re) = compile(pattern) else {
                    return false;
                };
                let found = re.is_match(&params.to_string());
                if found {
                    log::warn!(
                        "blocked pattern found in params: {} {}",
                        pattern,
                        self.description.as_deref().unwrap_or_default()
                    );
                }
                !found
            }
        }
    }
}

fn compile(pattern: &str) -> Option<Regex> {
    match Regex::new(pattern) {
        Ok(re) => Some(re),
        Err(e) => {
            log::error!("invalid regex pattern {:?}: {}", pattern, e);
            None
        }
    }
}

/// Interprets conditions on behalf of the policy evaluator.
///
/// [`BuiltinConditions`] is the standard implementation. Hosts can supply
/// their own, for example to record which conditions ran; any
/// `Fn(&Condition, &Value, &EvaluationContext) -> bool` works.
pub trait ConditionEvaluator: Send + Sync {
    fn evaluate(&self, condition: &Condition, action: &Value, context: &EvaluationContext)
        -> bool;
}

/// Evaluates conditions with [`Condition::evaluate`].
#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinConditions;

impl ConditionEvaluator for BuiltinConditions {
    fn evaluate(&self, condition: &Condition, action: &Value, context: &EvaluationContext) -> bool {
        condition.evaluate(action, context)
    }
}

impl<F> ConditionEvaluator for F
where
    F: Fn(&Condition, &Value, &EvaluationContext) -> bool + Send + Sync,
{
    fn evaluate(&self, condition: &Condition, action: &Value, context: &EvaluationContext) -> bool {
        self(condition, action, context)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::SessionLedger;
    use serde_json::json;

    fn cond(value: Value) -> Condition {
        serde_json::from_value(value).unwrap()
    }

    fn context_trusting(urls: &[&str]) -> EvaluationContext {
        let mut session = SessionLedger::new("s");
        session.for_tab("tab-1").seed(urls, None);
        EvaluationContext::new().with_link_ledger(session.merge(["tab-1"]))
    }

    // ===== Decoding Tests =====

    #[test]
    fn test_decode_all_kinds() {
        let c = cond(json!({
            "type": "allUrlsIn",
            "urls": "action.urls",
            "ledger": "context.linkLedger",
            "description": "only seen links"
        }));
        assert_eq!(c.type_name(), "allUrlsIn");
        assert_eq!(c.description.as_deref(), Some("only seen links"));

        assert_eq!(
            cond(json!({"type": "equals", "actual": "action.tool", "expected": "x"})).type_name(),
            "equals"
        );
        assert_eq!(
            cond(json!({"type": "matches", "value": "action.q", "pattern": "^a"})).type_name(),
            "matches"
        );
        assert_eq!(
            cond(json!({"type": "noPatternInParams", "params": "action.args", "pattern": "@"}))
                .type_name(),
            "noPatternInParams"
        );
    }

    #[test]
    fn test_decode_rejects_unknown_type() {
        let result: Result<Condition, _> =
            serde_json::from_value(json!({"type": "evalJavascript", "code": "1"}));
        assert!(result.is_err());
    }

    #[test]
    fn test_serialize_round_trip_shape() {
        let c = Condition::new(ConditionKind::Equals {
            actual: "action.tool".into(),
            expected: json!("search"),
        })
        .with_description("tool must be search");
        assert_eq!(
            serde_json::to_value(&c).unwrap(),
            json!({
                "type": "equals",
                "actual": "action.tool",
                "expected": "search",
                "description": "tool must be search"
            })
        );
    }

    // ===== allUrlsIn Tests =====

    #[test]
    fn test_all_urls_in_passes_when_all_seen() {
        let ctx = context_trusting(&["https://a.com/", "https://b.com/x"]);
        let c = cond(json!({"type": "allUrlsIn", "urls": "action.urls", "ledger": "context.linkLedger"}));
        let action = json!({"urls": ["https://a.com", "https://b.com/x#frag"]});
        assert!(c.evaluate(&action, &ctx));
    }

    #[test]
    fn test_all_urls_in_fails_on_unseen() {
        let ctx = context_trusting(&["https://a.com/"]);
        let c = cond(json!({"type": "allUrlsIn", "urls": "action.urls", "ledger": "context.linkLedger"}));
        let action = json!({"urls": ["https://a.com/", "https://evil.com/"]});
        assert!(!c.evaluate(&action, &ctx));
    }

    #[test]
    fn test_all_urls_in_non_string_entry_fails() {
        let ctx = context_trusting(&["https://a.com/"]);
        let c = cond(json!({"type": "allUrlsIn", "urls": "action.urls", "ledger": "context.linkLedger"}));
        assert!(!c.evaluate(&json!({"urls": [42]}), &ctx));
    }

    #[test]
    fn test_all_urls_in_vacuous_cases() {
        let ctx = context_trusting(&[]);
        let c = cond(json!({"type": "allUrlsIn", "urls": "action.urls", "ledger": "context.linkLedger"}));
        assert!(c.evaluate(&json!({}), &ctx));
        assert!(c.evaluate(&json!({"urls": []}), &ctx));
        assert!(c.evaluate(&json!({"urls": "https://evil.com/"}), &ctx));
    }

    #[test]
    fn test_all_urls_in_missing_ledger_fails_closed() {
        let c = cond(json!({"type": "allUrlsIn", "urls": "action.urls", "ledger": "context.linkLedger"}));
        let action = json!({"urls": ["https://a.com/"]});
        assert!(!c.evaluate(&action, &EvaluationContext::new()));
    }

    // ===== equals Tests =====

    #[test]
    fn test_equals() {
        let c = cond(json!({"type": "equals", "actual": "context.tainted", "expected": false}));
        let ctx = EvaluationContext::new().with_field("tainted", false);
        assert!(c.evaluate(&json!({}), &ctx));

        let ctx = EvaluationContext::new().with_field("tainted", true);
        assert!(!c.evaluate(&json!({}), &ctx));
    }

    #[test]
    fn test_equals_absent_never_equal() {
        let c = cond(json!({"type": "equals", "actual": "action.missing"}));
        assert!(!c.evaluate(&json!({}), &EvaluationContext::new()));
    }

    // ===== matches Tests =====

    #[test]
    fn test_matches() {
        let c = cond(json!({"type": "matches", "value": "action.query", "pattern": "^[a-z ]+$"}));
        let ctx = EvaluationContext::new();
        assert!(c.evaluate(&json!({"query": "rust traits"}), &ctx));
        assert!(!c.evaluate(&json!({"query": "DROP TABLE"}), &ctx));
        assert!(!c.evaluate(&json!({}), &ctx));
        assert!(!c.evaluate(&json!({"query": null}), &ctx));
    }

    #[test]
    fn test_matches_non_string_uses_json_text() {
        let c = cond(json!({"type": "matches", "value": "action.count", "pattern": "^\\d+$"}));
        assert!(c.evaluate(&json!({"count": 12}), &EvaluationContext::new()));
    }

    #[test]
    fn test_matches_invalid_pattern_fails_closed() {
        let c = cond(json!({"type": "matches", "value": "action.q", "pattern": "(unclosed"}));
        assert!(!c.evaluate(&json!({"q": "anything"}), &EvaluationContext::new()));
    }

    // ===== noPatternInParams Tests =====

    #[test]
    fn test_no_pattern_in_params() {
        let c = cond(json!({
            "type": "noPatternInParams",
            "params": "action.args",
            "pattern": "[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\\.[A-Za-z]{2,}"
        }));
        let ctx = EvaluationContext::new();
        assert!(c.evaluate(&json!({"args": {"q": "weather"}}), &ctx));
        assert!(!c.evaluate(&json!({"args": {"q": "mail alice@example.com"}}), &ctx));
        assert!(c.evaluate(&json!({}), &ctx));
    }

    #[test]
    fn test_no_pattern_invalid_pattern_fails_closed() {
        let c = cond(json!({"type": "noPatternInParams", "params": "action.args", "pattern": "["}));
        assert!(!c.evaluate(&json!({"args": {}}), &EvaluationContext::new()));
    }

    // ===== Evaluator Trait Tests =====

    #[test]
    fn test_builtin_evaluator_delegates() {
        let c = cond(json!({"type": "equals", "actual": "action.tool", "expected": "t"}));
        assert!(BuiltinConditions.evaluate(&c, &json!({"tool": "t"}), &EvaluationContext::new()));
    }

    #[test]
    fn test_closure_evaluator() {
        let always_false = |_: &Condition, _: &Value, _: &EvaluationContext| false;
        let c = cond(json!({"type": "equals", "actual": "action.tool", "expected": "t"}));
        assert!(!always_false.evaluate(&c, &json!({"tool": "t"}), &EvaluationContext::new()));
    }
}
