//! The finalizer adapter interface.
//!
//! A [`FinalizeExecutor`] runs one finalize scope, and every scope it
//! awaits, against a program and a set of caches, returning the mapping
//! operations in execution order. Execution is synchronous: every program
//! and mapping it may touch must be loaded before the call.

use finalize_common::{Hash256, TransitionId};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use thiserror::Error;

use crate::cache::FinalizeCaches;
use crate::identifier::{Identifier, ProgramId};
use crate::operation::MappingOperation;
use crate::program::Program;
use crate::value::Value;

/// Per-block context threaded through every finalize call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinalizeState {
    pub height: u32,
    /// Block timestamp, seconds since the Unix epoch.
    pub timestamp: i64,
    /// Block-derived randomness.
    pub seed: Hash256,
}

/// Synchronous access to loaded program definitions.
pub trait ProgramLookup {
    fn program(&self, id: &ProgramId) -> Option<Arc<Program>>;
}

/// Everything one execution needs besides the caches.
pub struct FinalizeRequest<'a> {
    pub state: &'a FinalizeState,
    pub programs: &'a dyn ProgramLookup,
    pub program: &'a Program,
    pub function: &'a Identifier,
    /// Transition ids in the order their finalize scopes run. The first id
    /// belongs to `function` itself.
    pub order: &'a [TransitionId],
    /// Transitions whose scopes are skipped.
    pub rejected: &'a HashSet<TransitionId>,
    pub inputs: Vec<Value>,
    /// Whether writes reach the shared cache.
    pub allow_state_change: bool,
    /// Run awaited scopes without an order, attributing them to the first
    /// id. Used by preview runs, which have no real transitions.
    pub execute_await_eagerly: bool,
}

/// A recoverable failure while executing a finalize scope.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{cause}")]
pub struct ExecuteError {
    /// The transition whose scope failed.
    pub transition_id: TransitionId,
    /// The failing command in program syntax, or a description of the step.
    pub instruction: String,
    pub cause: String,
}

impl ExecuteError {
    pub fn new(
        transition_id: TransitionId,
        instruction: impl Into<String>,
        cause: impl Into<String>,
    ) -> Self {
        Self {
            transition_id,
            instruction: instruction.into(),
            cause: cause.into(),
        }
    }
}

/// Executes finalize scopes.
///
/// Implementations must be deterministic: identical programs, inputs,
/// order, cache contents and flags always yield identical operations.
pub trait FinalizeExecutor: Send + Sync {
    fn execute(
        &self,
        request: FinalizeRequest<'_>,
        caches: FinalizeCaches<'_>,
    ) -> Result<Vec<MappingOperation>, ExecuteError>;
}
