//! Policy evaluation with "first deny wins" semantics.

use serde_json::Value;

use super::matcher::check_policy_match;
use super::model::{Effect, Policy};
use crate::condition::{BuiltinConditions, Condition, ConditionEvaluator};
use crate::context::EvaluationContext;
use crate::decision::{codes, reason_phrase, Decision, DenyDetails};

/// Evaluates policies against actions.
///
/// Condition semantics are delegated to a [`ConditionEvaluator`];
/// [`BuiltinConditions`] unless one is supplied.
///
/// # Example
///
/// ```rust
/// use linkgate_core::context::EvaluationContext;
/// use linkgate_core::policy::{Effect, Policy, PolicyEvaluator};
/// use serde_json::json;
///
/// let policies = vec![
///     Policy::new("search-ok", "tool.execution", Effect::Allow)
///         .with_match(json!({"action.tool": "search"})),
/// ];
///
/// let evaluator = PolicyEvaluator::new();
/// let decision = evaluator.evaluate_phase(
///     &policies,
///     &json!({"type": "tool.call", "tool": "search"}),
///     &EvaluationContext::new(),
/// );
/// assert!(decision.is_allow());
/// ```
pub struct PolicyEvaluator {
    conditions: Box<dyn ConditionEvaluator>,
}

impl PolicyEvaluator {
    /// Create an evaluator using the built-in condition kinds.
    pub fn new() -> Self {
        Self {
            conditions: Box::new(BuiltinConditions),
        }
    }

    /// Create an evaluator with a custom condition evaluator.
    pub fn with_condition_evaluator(conditions: impl ConditionEvaluator + 'static) -> Self {
        Self {
            conditions: Box::new(conditions),
        }
    }

    /// Returns true if the policy's match criteria apply to the action.
    pub fn matches(&self, policy: &Policy, action: &Value) -> bool {
        check_policy_match(&policy.match_criteria, action)
    }

    /// Evaluate one policy.
    ///
    /// Returns `None` when the policy does not apply: it is disabled, it does
    /// not match, or it is a deny policy whose conditions all hold.
    /// Otherwise:
    ///
    /// | effect | all conditions pass | a condition fails |
    /// |--------|---------------------|-------------------|
    /// | allow  | allow               | deny `POLICY_CONDITION_FAILED` |
    /// | deny   | `None`              | deny with the policy's `onDeny` |
    pub fn evaluate(
        &self,
        policy: &Policy,
        action: &Value,
        context: &EvaluationContext,
    ) -> Option<Decision> {
        if !policy.enabled {
            return None;
        }

        if !self.matches(policy, action) {
            return None;
        }

        let failed = self.first_failed_condition(&policy.conditions, action, context);

        match (policy.effect, failed) {
            (Effect::Deny, None) => None,

            (Effect::Allow, None) => Some(Decision::allow(
                Some(policy.id.clone()),
                "All policy conditions satisfied",
            )),

            (Effect::Deny, Some(condition)) => {
                let details =
                    DenyDetails::condition(condition.type_name(), condition.description.clone());
                let decision = match &policy.on_deny {
                    Some(on_deny) => Decision::deny(
                        on_deny.code.as_str(),
                        on_deny.reason.as_str(),
                        Some(policy.id.clone()),
                        details,
                    ),
                    None => {
                        // Unvalidated policy; still deny.
                        log::error!("deny policy {} has no onDeny", policy.id);
                        condition_failed(policy, details)
                    }
                };
                Some(decision)
            }

            (Effect::Allow, Some(condition)) => Some(condition_failed(
                policy,
                DenyDetails::condition(condition.type_name(), None),
            )),
        }
    }

    /// Evaluate the policies of one phase, in order.
    ///
    /// The first deny is returned immediately; later policies are not
    /// consulted. Allows are provisional. If nothing denies, the result is an
    /// allow noting how many policies applied. An empty list allows.
    pub fn evaluate_phase(
        &self,
        policies: &[Policy],
        action: &Value,
        context: &EvaluationContext,
    ) -> Decision {
        if policies.is_empty() {
            log::warn!("no policies provided for evaluation");
            return Decision::allow(None, "No policies to evaluate");
        }

        let mut applied = 0usize;

        for policy in policies {
            let Some(decision) = self.evaluate(policy, action, context) else {
                continue;
            };
            applied += 1;

            if decision.is_deny() {
                log::warn!(
                    "policy {} denied action: {}",
                    policy.id,
                    decision.code().unwrap_or_default()
                );
                return decision;
            }
        }

        if applied == 0 {
            log::warn!(
                "no policies applied to action: {} {}",
                action.get("type").and_then(Value::as_str).unwrap_or_default(),
                action.get("tool").and_then(Value::as_str).unwrap_or_default()
            );
        }

        Decision::allow(None, format!("Evaluated {} policies, none denied", applied))
    }

    fn first_failed_condition<'p>(
        &self,
        conditions: &'p [Condition],
        action: &Value,
        context: &EvaluationContext,
    ) -> Option<&'p Condition> {
        conditions
            .iter()
            .find(|condition| !self.conditions.evaluate(condition, action, context))
    }
}

impl Default for PolicyEvaluator {
    fn default() -> Self {
        Self::new()
    }
}

fn condition_failed(policy: &Policy, details: DenyDetails) -> Decision {
    Decision::deny(
        codes::POLICY_CONDITION_FAILED,
        reason_phrase(codes::POLICY_CONDITION_FAILED).unwrap_or_default(),
        Some(policy.id.clone()),
        details,
    )
}
