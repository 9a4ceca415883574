use approval_workflow_types::WorkflowError;
use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Storage-layer errors.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("record not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("rows locked by another transaction: {0}")]
    LockContention(String),

    #[error("unique constraint violated: {0}")]
    UniqueViolation(String),

    #[error("backend error: {0}")]
    Backend(String),
}

impl From<StorageError> for WorkflowError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::LockContention(rows) => WorkflowError::LockContention(rows),
            StorageError::Conflict(what) => WorkflowError::Conflict(what),
            other => WorkflowError::Storage(other.to_string()),
        }
    }
}
