//! Authorization decisions.
//!
//! A deny is an ordinary value, not an error. Callers that want to bail out
//! of a tool dispatch with `?` can convert a deny into a
//! [`SecurityPolicyError`].

use serde::{Deserialize, Serialize};

/// Standard denial codes.
pub mod codes {
    /// Target URL is not in the request-scoped ledger view.
    pub const UNSEEN_LINK: &str = "UNSEEN_LINK";
    /// Target URL could not be parsed or normalized.
    pub const MALFORMED_URL: &str = "MALFORMED_URL";
    /// Required evaluation context (ledger, tab id) was not provided.
    pub const MISSING_CONTEXT: &str = "MISSING_CONTEXT";
    /// Enforcement is disabled by policy configuration.
    pub const POLICY_DISABLED: &str = "POLICY_DISABLED";
    /// An allow policy matched but could not certify its conditions.
    pub const POLICY_CONDITION_FAILED: &str = "POLICY_CONDITION_FAILED";
}

/// Standard reason phrase for a code from [`codes`], if it has one.
pub fn reason_phrase(code: &str) -> Option<&'static str> {
    match code {
        codes::UNSEEN_LINK => Some("URL not in selected request context"),
        codes::MALFORMED_URL => Some("Failed to parse or normalize URL"),
        codes::MISSING_CONTEXT => Some("Missing required evaluation context"),
        codes::POLICY_DISABLED => Some("Policy enforcement disabled"),
        codes::POLICY_CONDITION_FAILED => Some("Policy condition not met"),
        _ => None,
    }
}

/// Extra context attached to a deny.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DenyDetails {
    /// `type` of the condition that failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failed_condition: Option<String>,

    /// `description` of the condition that failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition_description: Option<String>,

    /// The offending URL, for ledger denials.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl DenyDetails {
    pub fn condition(kind: impl Into<String>, description: Option<String>) -> Self {
        Self {
            failed_condition: Some(kind.into()),
            condition_description: description,
            url: None,
        }
    }

    pub fn url(url: impl Into<String>) -> Self {
        Self {
            url: Some(url.into()),
            ..Self::default()
        }
    }
}

/// Outcome of evaluating an action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "effect", rename_all = "lowercase")]
pub enum Decision {
    /// The action may proceed.
    Allow {
        #[serde(rename = "policyId", default, skip_serializing_if = "Option::is_none")]
        policy_id: Option<String>,
        note: String,
    },

    /// The action is refused.
    Deny {
        #[serde(rename = "policyId", default, skip_serializing_if = "Option::is_none")]
        policy_id: Option<String>,
        code: String,
        reason: String,
        #[serde(default)]
        details: DenyDetails,
    },
}

impl Decision {
    /// Allow, optionally crediting a policy.
    pub fn allow(policy_id: Option<String>, note: impl Into<String>) -> Self {
        Decision::Allow {
            policy_id,
            note: note.into(),
        }
    }

    /// Deny with a code and reason.
    pub fn deny(
        code: impl Into<String>,
        reason: impl Into<String>,
        policy_id: Option<String>,
        details: DenyDetails,
    ) -> Self {
        Decision::Deny {
            policy_id,
            code: code.into(),
            reason: reason.into(),
            details,
        }
    }

    /// Deny with one of the standard [`codes`] and its standard reason.
    pub fn deny_standard(code: &'static str, details: DenyDetails) -> Self {
        let reason = reason_phrase(code).unwrap_or(code);
        Self::deny(code, reason, None, details)
    }

    pub fn is_allow(&self) -> bool {
        matches!(self, Decision::Allow { .. })
    }

    pub fn is_deny(&self) -> bool {
        matches!(self, Decision::Deny { .. })
    }

    /// The policy credited with this decision, if any.
    pub fn policy_id(&self) -> Option<&str> {
        match self {
            Decision::Allow { policy_id, .. } | Decision::Deny { policy_id, .. } => {
                policy_id.as_deref()
            }
        }
    }

    /// The denial code, for denies.
    pub fn code(&self) -> Option<&str> {
        match self {
            Decision::Deny { code, .. } => Some(code),
            Decision::Allow { .. } => None,
        }
    }

    /// Turn a deny into an error; allows pass through.
    pub fn into_result(self) -> Result<(), SecurityPolicyError> {
        match self {
            Decision::Allow { .. } => Ok(()),
            deny => Err(SecurityPolicyError { decision: deny }),
        }
    }
}

/// A policy denial surfaced as an error to a tool dispatcher.
///
/// Distinguishes "the security layer said no" from network or tool failures.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[error("{}", self.reason())]
pub struct SecurityPolicyError {
    decision: Decision,
}

impl SecurityPolicyError {
    pub fn code(&self) -> &str {
        self.decision.code().unwrap_or_default()
    }

    pub fn policy_id(&self) -> Option<&str> {
        self.decision.policy_id()
    }

    pub fn reason(&self) -> &str {
        match &self.decision {
            Decision::Deny { reason, .. } => reason,
            Decision::Allow { note, .. } => note,
        }
    }

    /// The deny decision this error was built from.
    pub fn decision(&self) -> &Decision {
        &self.decision
    }
}
