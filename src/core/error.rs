//! Error types for queue operations.

use thiserror::Error;

use super::job::JobState;

/// Errors produced by the job store, the execution engine and the worker pool.
#[derive(Debug, Error)]
pub enum QueueError {
    /// Bad enqueue input; surfaced immediately and never retried.
    #[error("validation error: {0}")]
    Validation(String),
    /// Store I/O failure; transient, callers back off and retry.
    #[error("storage error: {0}")]
    Storage(String),
    /// A persisted record cannot be decoded; the store is not trustworthy.
    #[error("corrupt record: {0}")]
    Corrupt(String),
    /// An illegal state transition was attempted; nothing was mutated.
    #[error("state conflict for job {id}: cannot move {from} -> {to}")]
    StateConflict {
        /// Job identifier.
        id: String,
        /// State the job was actually in.
        from: JobState,
        /// State the caller tried to move it to.
        to: JobState,
    },
    /// No job with this identifier exists.
    #[error("job not found: {0}")]
    NotFound(String),
    /// The command could not be started at all.
    #[error("execution error: {0}")]
    Execution(String),
    /// Configuration could not be parsed or failed validation.
    #[error("config error: {0}")]
    Config(String),
    /// Filesystem or process I/O failure outside the store.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl QueueError {
    /// Whether a caller may retry the operation after backing off.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Storage(_) | Self::Io(_))
    }
}

impl From<rusqlite::Error> for QueueError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Storage(value.to_string())
    }
}

/// Result alias for queue operations.
pub type QueueResult<T> = Result<T, QueueError>;

/// Application-facing result using anyhow for higher-level contexts.
pub type AppResult<T> = Result<T, anyhow::Error>;
