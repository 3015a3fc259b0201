//! Rejection reasons reported per transaction.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Why a rejected transaction was rejected, as far as this engine can tell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RejectReason {
    /// A finalize scope of the execution failed.
    Execution {
        /// Position of the failing transition in the execution.
        transition_index: usize,
        instruction: String,
        cause: String,
    },
    /// The execution succeeded but the fee finalizer failed.
    Fee { instruction: String, cause: String },
    /// Rejected deployment. Deployments carry no failure detail.
    DetailUnavailable,
    /// Execution and fee both succeeded on replay. Informational only.
    Indeterminate,
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Execution {
                transition_index,
                instruction,
                cause,
            } => write!(
                f,
                "execute error: {}, at transition #{}, instruction \"{}\"",
                cause, transition_index, instruction
            ),
            Self::Fee { instruction, cause } => write!(
                f,
                "execute error: {}, at fee transition, instruction \"{}\"",
                cause, instruction
            ),
            Self::DetailUnavailable => f.write_str("(detailed reason not available)"),
            Self::Indeterminate => f.write_str("unknown reason"),
        }
    }
}
