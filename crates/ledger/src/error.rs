//! Error types for block finalization.
//!
//! [`FinalizeError`] is the fatal error: it aborts the block being
//! finalized and invalidates the process-wide mapping cache. Recoverable
//! execution failures are [`ExecuteError`]s and never reach this type
//! unless they happen where failure is not allowed.

use finalize_db::DbError;
use finalize_vm::{ExecuteError, OperationKind, ProgramId, VmError};
use thiserror::Error;

use crate::validate::ValidationError;

/// Result type for finalize operations.
pub type Result<T> = std::result::Result<T, FinalizeError>;

/// Errors that abort block finalization.
#[derive(Debug, Error)]
pub enum FinalizeError {
    /// Database error.
    #[error("database error: {0}")]
    Database(#[from] DbError),

    /// Program or value model error.
    #[error("vm error: {0}")]
    Vm(#[from] VmError),

    /// A stored key, value or program could not be decoded.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// A referenced program is not deployed.
    #[error("program not found: {0}")]
    ProgramNotFound(ProgramId),

    /// A referenced function does not exist.
    #[error("function not found: {program}/{function}")]
    FunctionNotFound { program: String, function: String },

    /// The static call graph does not line up with the transaction.
    #[error("call graph mismatch: {0}")]
    CallGraph(String),

    /// The confirmed transaction is missing parts its kind requires.
    #[error("malformed transaction: {0}")]
    MalformedTransaction(String),

    /// Re-derived operations differ from the expected ones.
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// An accepted execution failed to execute.
    #[error("accepted execution failed at {}: {}", .0.instruction, .0.cause)]
    AcceptedExecution(ExecuteError),

    /// A fee finalizer failed where it must succeed.
    #[error("fee execution failed at {}: {}", .0.instruction, .0.cause)]
    FeeExecution(ExecuteError),

    /// A preview run produced an operation other than a key update.
    #[error("preview produced unsupported operation {0}")]
    PreviewModeViolation(OperationKind),

    /// An execution error named a transition outside the transaction.
    #[error("rejected transition not found in transaction")]
    RejectedTransitionNotFound,

    /// A blocking store task panicked or was cancelled.
    #[error("store task failed: {0}")]
    Task(String),
}

impl From<serde_json::Error> for FinalizeError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
