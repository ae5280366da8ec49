//! Domain error model.

use thiserror::Error;

pub type DomainResult<T> = Result<T, DomainError>;

/// Failures raised by the pure domain layer.
///
/// Storage outcomes (missing rows, duplicates, plan ceilings) are reported by
/// the repositories, not here.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Caller-supplied input was rejected; the message is safe to show.
    #[error("{0}")]
    Validation(String),

    /// A textual identifier did not parse.
    #[error("malformed {kind}: {reason}")]
    MalformedId { kind: &'static str, reason: String },

    /// A role was paired with the wrong tenant assignment. Only reachable
    /// through a programming error, never through request input.
    #[error("role/tenant mismatch: {0}")]
    ScopeMismatch(String),
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn scope_mismatch(msg: impl Into<String>) -> Self {
        Self::ScopeMismatch(msg.into())
    }

    /// Whether the error stems from request input rather than a bug.
    pub fn is_caller_fault(&self) -> bool {
        !matches!(self, DomainError::ScopeMismatch(_))
    }
}
