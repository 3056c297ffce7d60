// src/errors.rs

//! Crate-wide error type and result alias.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum GatedagError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid job graph: {0}")]
    GraphInvalid(String),

    #[error("No handler registered for job type '{0}'")]
    NoHandler(String),

    #[error("Condition evaluation failed: {0}")]
    ConditionEvaluation(String),

    #[error("Handler execution failed: {0}")]
    HandlerExecution(String),

    #[error("Job '{job}' timed out after {timeout_ms}ms")]
    HandlerTimeout { job: String, timeout_ms: u64 },

    #[error("Approval rejected: {0}")]
    ApprovalRejected(String),

    #[error("Approval expired without a decision: {0}")]
    ApprovalExpired(String),

    #[error("Job cancelled: {0}")]
    JobCancelled(String),

    #[error("Notification delivery via '{channel}' failed: {message}")]
    NotificationDelivery { channel: String, message: String },

    #[error("Approval request not found: {0}")]
    RequestNotFound(String),

    #[error("Approval request '{request}' is not pending (status: {status})")]
    RequestNotPending { request: String, status: String },

    #[error("Approver '{approver}' is not authorized for request '{request}'")]
    NotAuthorized { request: String, approver: String },

    #[error("Approver '{approver}' already decided on request '{request}'")]
    DuplicateDecision { request: String, approver: String },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl GatedagError {
    /// Whether a failed handler attempt may be retried under the job's
    /// retry policy.
    ///
    /// Condition failures never reach the retry loop; the remaining
    /// non-retryable kinds are terminal decisions (approval outcomes,
    /// cancellation, missing handler) where a re-run would change nothing.
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self,
            GatedagError::ApprovalRejected(_)
                | GatedagError::ApprovalExpired(_)
                | GatedagError::JobCancelled(_)
                | GatedagError::NoHandler(_)
        )
    }
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, GatedagError>;
