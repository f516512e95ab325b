//! Configuration errors.
//!
//! Operation failures are never wrapped: `execute` hands back the caller's own error type
//! verbatim. The types here only cover defects in how a template or policy was configured.

use thiserror::Error;

/// Errors produced while building a [`RetryTemplate`](crate::RetryTemplate).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BuildError {
    /// No backoff policy was supplied.
    #[error("a backoff policy is required")]
    MissingPolicy,
}

/// Errors produced while resolving a [`PolicyConfig`](crate::config::PolicyConfig).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// A field the policy cannot run without was left unset.
    #[error("{policy} policy requires `{field}`")]
    MissingField {
        /// Policy kind being configured.
        policy: &'static str,
        /// Name of the missing field.
        field: &'static str,
    },
    /// A numeric field is outside the range the policy accepts.
    #[error("{policy} policy has invalid `{field}`: {reason}")]
    InvalidField {
        policy: &'static str,
        field: &'static str,
        reason: String,
    },
}
