//! Orchestrator error types.

use std::time::Duration;

use thiserror::Error;

/// Result type alias for orchestrator calls.
pub type OrchestratorResult<T> = Result<T, OrchestratorError>;

/// Which side of the read-modify-write a failure belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrchestratorOp {
    Read,
    Write,
}

impl std::fmt::Display for OrchestratorOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Read => f.write_str("describe services"),
            Self::Write => f.write_str("update service"),
        }
    }
}

/// A failed orchestrator call. Terminal for the current scale-out attempt.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// The lookup itself failed.
    #[error("describe services failed [{code}]: {message}")]
    Read { code: String, message: String },

    /// The lookup succeeded but matched no service.
    #[error("service {service} not found in cluster {cluster}: {reason}")]
    NotFound {
        cluster: String,
        service: String,
        reason: String,
    },

    /// The update was rejected.
    #[error("update service failed [{code}]: {message}")]
    Write { code: String, message: String },

    #[error("{op} timed out after {timeout:?}")]
    Timeout { op: OrchestratorOp, timeout: Duration },

    /// The requested count does not fit the remote API.
    #[error("desired count {0} is out of range")]
    OutOfRange(i64),
}

impl OrchestratorError {
    pub fn op(&self) -> OrchestratorOp {
        match self {
            Self::Read { .. } | Self::NotFound { .. } => OrchestratorOp::Read,
            Self::Write { .. } | Self::OutOfRange(_) => OrchestratorOp::Write,
            Self::Timeout { op, .. } => *op,
        }
    }

    /// Remote error classification, for logging.
    pub fn code(&self) -> &str {
        match self {
            Self::Read { code, .. } | Self::Write { code, .. } => code,
            Self::NotFound { .. } => "ServiceNotFound",
            Self::Timeout { .. } => "Timeout",
            Self::OutOfRange(_) => "OutOfRange",
        }
    }
}
