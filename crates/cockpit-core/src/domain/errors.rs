use thiserror::Error;

use super::state::EntityKind;

/// Errors surfaced to callers of the registry and executor.
///
/// A submission racing an in-flight run is not an error; see
/// [`SubmissionResult::AlreadyRunning`](crate::executor::SubmissionResult).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CockpitError {
    #[error("no job or batch named '{0}'")]
    NotFound(String),

    #[error("'{name}' is not a {expected}")]
    KindMismatch { name: String, expected: EntityKind },

    #[error("an entity named '{0}' is already registered")]
    DuplicateEntity(String),

    #[error("invalid entity '{name}': {reason}")]
    InvalidEntity { name: String, reason: String },

    #[error("catalog error: {0}")]
    Catalog(String),

    #[error("executor is shut down")]
    ExecutorClosed,
}

/// Failure reported by a workload. Never escapes the executor: it becomes a
/// `failed` transition and the reason on the completion event.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WorkloadError {
    #[error("{0}")]
    Failed(String),

    #[error("cancelled")]
    Cancelled,
}

impl WorkloadError {
    pub fn failed(reason: impl Into<String>) -> Self {
        WorkloadError::Failed(reason.into())
    }
}
