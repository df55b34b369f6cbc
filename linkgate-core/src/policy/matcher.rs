//! Policy match criteria.

use serde_json::Value;

use crate::context::resolve_path;

const WILDCARD: &str = "*";
const ALTERNATIVE: char = '|';

/// Returns true if a policy's match criteria apply to an action.
///
/// Criteria map dot paths (resolved against the action, e.g. `action.tool`)
/// to an expected value. Every entry must pass:
///
/// - `"a|b|*"`: the resolved value equals one alternative, or one
///   alternative is `*` (which passes unconditionally)
/// - `"*"`: the resolved value is present and not null
/// - anything else: exact equality, with integers and floats of the same
///   value treated as equal
///
/// Criteria that are not an object, or an empty object, never match.
///
/// ```rust
/// use linkgate_core::policy::check_policy_match;
/// use serde_json::json;
///
/// let action = json!({"type": "tool.call", "tool": "search_history"});
/// assert!(check_policy_match(
///     &json!({"action.type": "tool.call", "action.tool": "get_page_content|search_history"}),
///     &action,
/// ));
/// assert!(!check_policy_match(&json!({"action.url": "*"}), &action));
/// ```
pub fn check_policy_match(criteria: &Value, action: &Value) -> bool {
    let Some(criteria) = criteria.as_object() else {
        return false;
    };
    if criteria.is_empty() {
        return false;
    }

    criteria.iter().all(|(path, expected)| {
        let actual = resolve_path(path, action, &Value::Null);
        criterion_passes(expected, actual)
    })
}

fn criterion_passes(expected: &Value, actual: Option<&Value>) -> bool {
    match expected.as_str() {
        Some(options) if options.contains(ALTERNATIVE) => options
            .split(ALTERNATIVE)
            .any(|option| option == WILDCARD || actual.and_then(Value::as_str) == Some(option)),
        Some(WILDCARD) => !matches!(actual, None | Some(Value::Null)),
        _ => actual.is_some_and(|actual| values_equal(expected, actual)),
    }
}

/// Strict equality, except that numbers compare by value (`1` equals `1.0`).
fn values_equal(expected: &Value, actual: &Value) -> bool {
    match (expected, actual) {
        (Value::Number(a), Value::Number(b)) => a.as_f64() == b.as_f64(),
        _ => expected == actual,
    }
}
