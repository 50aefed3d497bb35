use thiserror::Error;
use uuid::Uuid;

/// Errors from workflow administration, dispatch and execution.
#[derive(Debug, Error)]
pub enum WorkflowError {
    /// Input failed validation (missing trigger type, malformed step, ...).
    #[error("validation error: {0}")]
    Validation(String),

    #[error("workflow {0} not found")]
    NotFound(Uuid),

    #[error("workflow {0} is inactive")]
    Inactive(Uuid),

    #[error("execution {0} not found")]
    ExecutionNotFound(Uuid),

    /// A step's external call failed. Recorded on the execution, never thrown
    /// out of the executor.
    #[error("step {step_index} ({step_type}) failed: {message}")]
    StepExecution {
        step_index: usize,
        step_type: String,
        message: String,
    },

    #[error("storage error: {0}")]
    Storage(String),
}

impl From<RepositoryError> for WorkflowError {
    fn from(e: RepositoryError) -> Self {
        WorkflowError::Storage(e.to_string())
    }
}

/// Errors from repository operations (used by trait definitions in legacymark-core).
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database connection error")]
    Connection,

    #[error("query error: {0}")]
    Query(String),

    #[error("entity not found")]
    NotFound,

    #[error("conflict: {0}")]
    Conflict(String),
}
