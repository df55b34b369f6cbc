//! Loading policy documents.

use std::collections::BTreeMap;
use std::path::Path;

use serde_json::Value;

use super::model::Policy;
use super::validate::validate_policy;

const BUILTIN_POLICIES: &str = include_str!("../../policies/tool-execution.json");

/// Errors that can occur while loading policies.
#[derive(Debug, thiserror::Error)]
pub enum PolicyLoadError {
    /// Failed to read the policy file.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The document is not valid JSON.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The document has no top-level `policies` array.
    #[error("Invalid policy file structure: missing 'policies' array")]
    MissingPoliciesArray,

    /// A policy failed structural validation.
    #[error("Invalid policy {id}: {}", .errors.join(", "))]
    InvalidPolicy { id: String, errors: Vec<String> },

    /// A policy passed validation but could not be decoded.
    #[error("Malformed policy {id}: {message}")]
    Malformed { id: String, message: String },
}

/// Policies grouped by phase, in document order within each phase.
///
/// ```rust
/// use linkgate_core::policy::PolicySet;
///
/// let set = PolicySet::from_json_str(r#"{
///   "policies": [{
///     "id": "search-ok",
///     "phase": "tool.execution",
///     "match": {"action.tool": "search"},
///     "conditions": [],
///     "effect": "allow"
///   }]
/// }"#).unwrap();
///
/// assert_eq!(set.len(), 1);
/// assert_eq!(set.policies_for("tool.execution")[0].id, "search-ok");
/// assert!(set.policies_for("tool.result").is_empty());
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PolicySet {
    phases: BTreeMap<String, Vec<Policy>>,
}

impl PolicySet {
    /// An empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// The policies shipped with the crate (`policies/tool-execution.json`).
    pub fn builtin() -> Result<Self, PolicyLoadError> {
        Self::from_json_str(BUILTIN_POLICIES)
    }

    /// Parse a `{"policies": [...]}` document.
    pub fn from_json_str(json: &str) -> Result<Self, PolicyLoadError> {
        let document: Value = serde_json::from_str(json)?;
        Self::from_value(&document)
    }

    /// Read and parse a policy file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, PolicyLoadError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;
        let set = Self::from_json_str(&contents)?;
        log::debug!("loaded {} policies from {}", set.len(), path.display());
        Ok(set)
    }

    /// Validate and decode every policy of a document.
    ///
    /// Loading stops at the first invalid policy, reporting all of that
    /// policy's errors.
    pub fn from_value(document: &Value) -> Result<Self, PolicyLoadError> {
        let raw_policies = document
            .get("policies")
            .and_then(Value::as_array)
            .ok_or(PolicyLoadError::MissingPoliciesArray)?;

        let mut set = Self::new();
        for raw in raw_policies {
            let id = raw
                .get("id")
                .and_then(Value::as_str)
                .unwrap_or("<unknown>")
                .to_string();

            let report = validate_policy(raw);
            if !report.valid {
                return Err(PolicyLoadError::InvalidPolicy {
                    id,
                    errors: report.errors,
                });
            }

            let policy: Policy =
                serde_json::from_value(raw.clone()).map_err(|e| PolicyLoadError::Malformed {
                    id,
                    message: e.to_string(),
                })?;
            set.insert(policy);
        }

        Ok(set)
    }

    /// Append a policy to its phase.
    pub fn insert(&mut self, policy: Policy) {
        self.phases
            .entry(policy.phase.clone())
            .or_default()
            .push(policy);
    }

    /// Append every policy of another set.
    pub fn extend(&mut self, other: PolicySet) {
        for (phase, policies) in other.phases {
            self.phases.entry(phase).or_default().extend(policies);
        }
    }

    /// Policies registered for a phase, in order.
    pub fn policies_for(&self, phase: &str) -> &[Policy] {
        self.phases.get(phase).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Drop every policy of a phase. Returns false if there were none.
    pub fn remove_phase(&mut self, phase: &str) -> bool {
        self.phases.remove(phase).is_some()
    }

    /// Phases with at least one policy.
    pub fn phases(&self) -> impl Iterator<Item = &str> {
        self.phases.keys().map(String::as_str)
    }

    /// `(phase, policies)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[Policy])> {
        self.phases
            .iter()
            .map(|(phase, policies)| (phase.as_str(), policies.as_slice()))
    }

    /// Total number of policies.
    pub fn len(&self) -> usize {
        self.phases.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.phases.is_empty()
    }
}

impl FromIterator<Policy> for PolicySet {
    fn from_iter<I: IntoIterator<Item = Policy>>(iter: I) -> Self {
        let mut set = Self::new();
        for policy in iter {
            set.insert(policy);
        }
        set
    }
}
