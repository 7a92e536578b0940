use agentd_contract::{RunStatus, StoreError};
use thiserror::Error;

/// Error raised from within a user generator. The message is what ends up in
/// the run record's `last_error`.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct ExecError {
    pub message: String,
}

impl ExecError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Errors surfaced by the runtime operations.
#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Cancellation of a run already in a terminal state.
    #[error("Cannot cancel run with status '{status}'")]
    CancelTerminal { status: RunStatus },

    #[error(transparent)]
    Exec(#[from] ExecError),
}

impl RuntimeError {
    /// Whether this error is a missing-record lookup.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            RuntimeError::Store(StoreError::ThreadNotFound(_) | StoreError::RunNotFound(_))
        )
    }
}
