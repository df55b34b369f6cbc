//! Top-level error type for linkgate
//!
//! Flattens the per-module errors into the categories a tool dispatcher
//! acts on.

use thiserror::Error;

use crate::decision::SecurityPolicyError;
use crate::normalize::NormalizeError;
use crate::orchestrator::OrchestratorError;
use crate::policy::PolicyLoadError;

/// Top-level error type for linkgate operations
///
/// - [`Error::Denied`] - A policy refused the action; report it, do not retry
/// - [`Error::Config`] - Fix the policy documents or configuration
/// - [`Error::Session`] - Register the session before evaluating
/// - [`Error::InvalidRequest`] - Fix the envelope or URL passed in
#[derive(Debug, Error)]
pub enum Error {
    /// The security layer denied the action
    #[error("denied: {0}")]
    Denied(SecurityPolicyError),

    /// Policies or configuration could not be loaded
    #[error("configuration error: {0}")]
    Config(String),

    /// Session missing or invalid
    #[error("session error: {0}")]
    Session(String),

    /// Malformed envelope or URL
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl Error {
    /// Returns true if a policy denied the action
    pub fn is_denied(&self) -> bool {
        matches!(self, Self::Denied(_))
    }

    /// Returns true if this is a configuration error
    pub fn is_config(&self) -> bool {
        matches!(self, Self::Config(_))
    }

    /// Returns true if this is a session error
    pub fn is_session(&self) -> bool {
        matches!(self, Self::Session(_))
    }

    /// Returns true if the request itself was malformed
    pub fn is_invalid_request(&self) -> bool {
        matches!(self, Self::InvalidRequest(_))
    }

    /// The denial code, for denials
    pub fn denial_code(&self) -> Option<&str> {
        match self {
            Self::Denied(err) => Some(err.code()),
            _ => None,
        }
    }
}

impl From<SecurityPolicyError> for Error {
    fn from(err: SecurityPolicyError) -> Self {
        Self::Denied(err)
    }
}

impl From<PolicyLoadError> for Error {
    fn from(err: PolicyLoadError) -> Self {
        Self::Config(err.to_string())
    }
}

impl From<NormalizeError> for Error {
    fn from(err: NormalizeError) -> Self {
        Self::InvalidRequest(err.to_string())
    }
}

impl From<OrchestratorError> for Error {
    fn from(err: OrchestratorError) -> Self {
        match err {
            OrchestratorError::UnknownSession(_) | OrchestratorError::InvalidSessionId => {
                Self::Session(err.to_string())
            }
            OrchestratorError::InvalidEnvelope(_) => Self::InvalidRequest(err.to_string()),
        }
    }
}

/// Result type for linkgate operations
pub type Result<T> = std::result::Result<T, Error>;
