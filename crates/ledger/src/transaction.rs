//! Transaction finalization.
//!
//! Re-derives the operations of one confirmed transaction and pairs them
//! with the operations consensus expects. Nothing is written to storage
//! here; accepted work is written to the shared mapping cache so later
//! steps of the same transaction and later transactions of the block can
//! observe it.
//!
//! Cache usage per path:
//!
//! | Path | overlay | state change |
//! |------|---------|--------------|
//! | accepted execute | none | allowed |
//! | rejected execute | fresh, isolated | suppressed |
//! | fee of a rejected execute, dry run | the same overlay | suppressed |
//! | every final fee, deploy fees | none | allowed |

use finalize_common::TransitionId;
use finalize_vm::{
    ids, ExecuteError, FinalizeCaches, FinalizeExecutor, FinalizeOperation, FinalizeRequest,
    FinalizeState, Identifier, MappingCache, MappingOperation, Program, Value,
};
use std::collections::HashSet;
use tracing::{debug, warn};

use crate::block::{ConfirmedTransaction, Execution, Fee, Rejected, Transaction, TransitionOutput};
use crate::cache;
use crate::error::{FinalizeError, Result};
use crate::programs::ProgramCache;
use crate::reject::RejectReason;
use crate::store::FinalizeStore;
use crate::tracer;

/// The result of finalizing one transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionOutcome {
    pub expected: Vec<FinalizeOperation>,
    pub actual: Vec<MappingOperation>,
    pub reject_reason: Option<RejectReason>,
    /// Program to store alongside the operations of an accepted deploy.
    pub deployed: Option<Program>,
}

/// What finalizing a transaction needs besides the mapping cache.
pub struct TransactionFinalizer<'a, S: ?Sized, E: ?Sized> {
    pub store: &'a S,
    pub executor: &'a E,
    pub programs: &'a ProgramCache,
    pub state: &'a FinalizeState,
}

impl<S, E> TransactionFinalizer<'_, S, E>
where
    S: FinalizeStore + ?Sized,
    E: FinalizeExecutor + ?Sized,
{
    /// Finalizes any confirmed transaction.
    pub async fn finalize(
        &self,
        confirmed: &ConfirmedTransaction,
        cache: &mut MappingCache,
    ) -> Result<TransactionOutcome> {
        match confirmed {
            ConfirmedTransaction::AcceptedDeploy { .. }
            | ConfirmedTransaction::RejectedDeploy { .. } => {
                self.finalize_deploy(confirmed, cache).await
            }
            ConfirmedTransaction::AcceptedExecute { .. }
            | ConfirmedTransaction::RejectedExecute { .. } => {
                self.finalize_execute(confirmed, cache).await
            }
        }
    }

    /// Finalizes an accepted or rejected deployment.
    pub async fn finalize_deploy(
        &self,
        confirmed: &ConfirmedTransaction,
        cache: &mut MappingCache,
    ) -> Result<TransactionOutcome> {
        let (deployment, fee) = match confirmed {
            ConfirmedTransaction::AcceptedDeploy {
                transaction: Transaction::Deploy { deployment, fee, .. },
                ..
            } => (Some(deployment), fee),
            ConfirmedTransaction::RejectedDeploy {
                transaction: Transaction::Fee { fee, .. },
                rejected: Rejected::Deployment(_),
                ..
            } => (None, fee),
            _ => {
                return Err(FinalizeError::MalformedTransaction(
                    "deploy confirmation does not carry a deployment".to_string(),
                ))
            }
        };

        let mut actual = Vec::new();
        if fee.transition.is_public_fee() {
            let ops = self
                .execute_public_fee(fee, cache, None, true)
                .await?
                .map_err(FinalizeError::FeeExecution)?;
            actual.extend(ops);
        }

        let (reject_reason, deployed) = match deployment {
            Some(deployment) => {
                let program = &deployment.program;
                actual.extend(program.mappings.iter().map(|mapping| {
                    MappingOperation::InitializeMapping {
                        mapping_id: ids::mapping_id(&program.id, &mapping.name),
                        program_id: program.id.clone(),
                        mapping: mapping.name.clone(),
                    }
                }));
                debug!(program = %program.id, mappings = program.mappings.len(), "Finalized deployment");
                (None, Some(program.clone()))
            }
            None => (Some(RejectReason::DetailUnavailable), None),
        };

        Ok(TransactionOutcome {
            expected: confirmed.expected().to_vec(),
            actual,
            reject_reason,
            deployed,
        })
    }

    /// Finalizes an accepted or rejected execution.
    pub async fn finalize_execute(
        &self,
        confirmed: &ConfirmedTransaction,
        cache: &mut MappingCache,
    ) -> Result<TransactionOutcome> {
        let (execution, fee, accepted) = match confirmed {
            ConfirmedTransaction::AcceptedExecute {
                transaction: Transaction::Execute { execution, fee, .. },
                ..
            } => (execution, fee.as_ref(), true),
            ConfirmedTransaction::RejectedExecute {
                transaction: Transaction::Fee { fee, .. },
                rejected: Rejected::Execution(execution),
                ..
            } => (execution, Some(fee), false),
            _ => {
                return Err(FinalizeError::MalformedTransaction(
                    "execute confirmation does not carry an execution".to_string(),
                ))
            }
        };

        let mut local = MappingCache::new();
        let mut actual = Vec::new();
        let mut reject_reason = None;

        let overlay = (!accepted).then_some(&mut local);
        match self.execute_root(execution, cache, overlay, accepted).await? {
            Ok(ops) => actual.extend(ops),
            Err(err) if accepted => return Err(FinalizeError::AcceptedExecution(err)),
            Err(err) => {
                let transition_index = execution
                    .position(&err.transition_id)
                    .ok_or(FinalizeError::RejectedTransitionNotFound)?;
                reject_reason = Some(RejectReason::Execution {
                    transition_index,
                    instruction: err.instruction,
                    cause: err.cause,
                });
                actual.clear();
            }
        }

        if !accepted && reject_reason.is_none() {
            let fee = fee.ok_or_else(|| {
                FinalizeError::MalformedTransaction("rejected execution has no fee".to_string())
            })?;
            reject_reason = Some(if fee.transition.is_public_fee() {
                match self
                    .execute_public_fee(fee, cache, Some(&mut local), false)
                    .await?
                {
                    Err(err) => RejectReason::Fee {
                        instruction: err.instruction,
                        cause: err.cause,
                    },
                    Ok(_) => RejectReason::Indeterminate,
                }
            } else {
                RejectReason::Indeterminate
            });
            actual.clear();
        }

        if let Some(reason) = &reject_reason {
            warn!(transaction = %confirmed.transaction().id(), reason = %reason, "Execution rejected");
        }

        if let Some(fee) = fee.filter(|fee| fee.transition.is_public_fee()) {
            let ops = self
                .execute_public_fee(fee, cache, None, true)
                .await?
                .map_err(FinalizeError::FeeExecution)?;
            actual.extend(ops);
        }

        Ok(TransactionOutcome {
            expected: confirmed.expected().to_vec(),
            actual,
            reject_reason,
            deployed: None,
        })
    }

    /// Traces and runs the finalize scope behind the outermost transition.
    ///
    /// An execution whose outermost transition returns no future has
    /// nothing to finalize.
    async fn execute_root(
        &self,
        execution: &Execution,
        cache: &mut MappingCache,
        local: Option<&mut MappingCache>,
        allow_state_change: bool,
    ) -> Result<std::result::Result<Vec<MappingOperation>, ExecuteError>> {
        let root = execution.transitions.last().ok_or_else(|| {
            FinalizeError::MalformedTransaction("execution has no transitions".to_string())
        })?;
        let Some(TransitionOutput::Future { future }) = root.outputs.last() else {
            return Ok(Ok(Vec::new()));
        };
        let future = future.as_ref().ok_or_else(|| {
            FinalizeError::MalformedTransaction(format!(
                "transition {} has an empty future output",
                root.id
            ))
        })?;

        let program = self.programs.load(self.store, &future.program_id).await?;
        let (graph, order) = tracer::build_async_order(
            self.store,
            self.programs,
            &program,
            &future.function_name,
            &execution.transition_ids(),
        )
        .await?;
        cache::warm_programs(self.store, self.programs, cache, graph.programs()).await?;

        Ok(self.run(
            &program,
            &future.function_name,
            &order,
            future.inputs(),
            caches(cache, local),
            allow_state_change,
        ))
    }

    /// Runs a public fee transition's finalizer.
    async fn execute_public_fee(
        &self,
        fee: &Fee,
        cache: &mut MappingCache,
        local: Option<&mut MappingCache>,
        allow_state_change: bool,
    ) -> Result<std::result::Result<Vec<MappingOperation>, ExecuteError>> {
        let transition = &fee.transition;
        if !transition.is_public_fee() {
            return Err(FinalizeError::MalformedTransaction(format!(
                "{}/{} is not the public fee function",
                transition.program_id, transition.function_name
            )));
        }
        let future = match transition.outputs.as_slice() {
            [TransitionOutput::Future {
                future: Some(future),
            }] => future,
            _ => {
                return Err(FinalizeError::MalformedTransaction(format!(
                    "fee transition {} must have a future as its only output",
                    transition.id
                )))
            }
        };

        let program = self.programs.load(self.store, &future.program_id).await?;
        cache::warm_program(self.store, self.programs, cache, &program).await?;

        Ok(self.run(
            &program,
            &future.function_name,
            &[transition.id],
            future.inputs(),
            caches(cache, local),
            allow_state_change,
        ))
    }

    fn run(
        &self,
        program: &Program,
        function: &Identifier,
        order: &[TransitionId],
        inputs: Vec<Value>,
        caches: FinalizeCaches<'_>,
        allow_state_change: bool,
    ) -> std::result::Result<Vec<MappingOperation>, ExecuteError> {
        let rejected = HashSet::new();
        self.executor.execute(
            FinalizeRequest {
                state: self.state,
                programs: self.programs,
                program,
                function,
                order,
                rejected: &rejected,
                inputs,
                allow_state_change,
                execute_await_eagerly: false,
            },
            caches,
        )
    }
}

fn caches<'c>(shared: &'c mut MappingCache, local: Option<&'c mut MappingCache>) -> FinalizeCaches<'c> {
    match local {
        Some(local) => FinalizeCaches::with_local(shared, local),
        None => FinalizeCaches::shared(shared),
    }
}
