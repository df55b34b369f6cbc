//! Structural validation of policy documents.

use serde::Serialize;
use serde_json::{Map, Value};

const REQUIRED_FIELDS: [&str; 5] = ["id", "phase", "match", "conditions", "effect"];

/// Result of [`validate_policy`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    pub valid: bool,
    /// Every violation found, in check order.
    pub errors: Vec<String>,
}

impl ValidationReport {
    fn from_errors(errors: Vec<String>) -> Self {
        Self {
            valid: errors.is_empty(),
            errors,
        }
    }
}

/// Check a raw policy document before it is loaded.
///
/// Runs every check and reports all violations rather than stopping at the
/// first. This is a load-time check; evaluation assumes policies have
/// already passed it.
///
/// ```rust
/// use linkgate_core::policy::validate_policy;
/// use serde_json::json;
///
/// let report = validate_policy(&json!({
///     "phase": "tool.execution",
///     "match": {"action.type": "tool.call"},
///     "conditions": []
/// }));
/// assert!(!report.valid);
/// assert_eq!(
///     report.errors,
///     vec!["Missing required field: id", "Missing required field: effect"]
/// );
/// ```
pub fn validate_policy(policy: &Value) -> ValidationReport {
    let Some(policy) = policy.as_object() else {
        return ValidationReport::from_errors(vec!["Policy must be a JSON object".to_string()]);
    };

    let mut errors = Vec::new();

    for field in REQUIRED_FIELDS {
        if is_missing(policy.get(field)) {
            errors.push(format!("Missing required field: {}", field));
        }
    }

    if let Some(enabled) = policy.get("enabled") {
        if !enabled.is_boolean() {
            errors.push("Field 'enabled' must be boolean".to_string());
        }
    }

    let conditions = policy.get("conditions");
    if !is_missing(conditions) && !conditions.is_some_and(Value::is_array) {
        errors.push("Field 'conditions' must be an array".to_string());
    }

    let effect = policy.get("effect");
    let effect_str = effect.and_then(Value::as_str);
    if !is_missing(effect) && !matches!(effect_str, Some("allow" | "deny")) {
        errors.push("Field 'effect' must be 'deny' or 'allow'".to_string());
    }

    let on_deny = policy.get("onDeny").filter(|v| !is_missing(Some(*v)));
    if effect_str == Some("deny") && on_deny.is_none() {
        errors.push("Field 'onDeny' required when effect is 'deny'".to_string());
    }
    if let Some(on_deny) = on_deny {
        if !has_fields(on_deny.as_object(), &["code", "reason"]) {
            errors.push("Field 'onDeny' must have 'code' and 'reason'".to_string());
        }
    }

    if let Some(conditions) = conditions.and_then(Value::as_array) {
        for (index, condition) in conditions.iter().enumerate() {
            if is_missing(condition.get("type")) {
                errors.push(format!("Condition {}: missing 'type' field", index));
            }
        }
    }

    ValidationReport::from_errors(errors)
}

/// Absent, null, `false`, zero, and the empty string all count as missing.
fn is_missing(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) | Some(Value::Bool(false)) => true,
        Some(Value::String(s)) => s.is_empty(),
        Some(Value::Number(n)) => n.as_f64() == Some(0.0),
        Some(_) => false,
    }
}

fn has_fields(object: Option<&Map<String, Value>>, fields: &[&str]) -> bool {
    object.is_some_and(|object| fields.iter().all(|field| !is_missing(object.get(*field))))
}
