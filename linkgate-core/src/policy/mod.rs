//! Declarative JSON policies.
//!
//! A [`Policy`] belongs to a phase, selects actions with match criteria and
//! carries an ordered list of conditions. The [`PolicyEvaluator`] runs the
//! policies of a phase in order and the first deny wins.
//!
//! Documents are checked with [`validate_policy`] and loaded into a
//! [`PolicySet`]:
//!
//! ```rust
//! use linkgate_core::context::EvaluationContext;
//! use linkgate_core::policy::{PolicyEvaluator, PolicySet};
//! use serde_json::json;
//!
//! let set = PolicySet::from_value(&json!({
//!     "policies": [{
//!         "id": "no-secrets-in-params",
//!         "phase": "tool.execution",
//!         "match": {"action.type": "tool.call"},
//!         "conditions": [
//!             {"type": "noPatternInParams", "params": "action.params", "pattern": "(?i)password"}
//!         ],
//!         "effect": "deny",
//!         "onDeny": {"code": "SECRET_IN_PARAMS", "reason": "Parameters contain a secret"}
//!     }]
//! }))
//! .unwrap();
//!
//! let decision = PolicyEvaluator::new().evaluate_phase(
//!     set.policies_for("tool.execution"),
//!     &json!({"type": "tool.call", "tool": "login", "params": {"password": "hunter2"}}),
//!     &EvaluationContext::new(),
//! );
//! assert_eq!(decision.code(), Some("SECRET_IN_PARAMS"));
//! ```

mod evaluator;
mod loader;
mod matcher;
mod model;
mod validate;

pub use evaluator::PolicyEvaluator;
pub use loader::{PolicyLoadError, PolicySet};
pub use matcher::check_policy_match;
pub use model::{Effect, OnDeny, Policy};
pub use validate::{validate_policy, ValidationReport};

use serde_json::Value;

use crate::context::EvaluationContext;
use crate::decision::Decision;

/// Evaluate one policy with the built-in conditions.
///
/// See [`PolicyEvaluator::evaluate`].
pub fn evaluate_policy(
    policy: &Policy,
    action: &Value,
    context: &EvaluationContext,
) -> Option<Decision> {
    PolicyEvaluator::new().evaluate(policy, action, context)
}

/// Evaluate a phase's policies with the built-in conditions.
///
/// See [`PolicyEvaluator::evaluate_phase`].
pub fn evaluate_phase(policies: &[Policy], action: &Value, context: &EvaluationContext) -> Decision {
    PolicyEvaluator::new().evaluate_phase(policies, action, context)
}
