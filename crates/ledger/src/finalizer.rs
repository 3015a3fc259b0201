//! Block finalization.
//!
//! [`BlockFinalizer`] is the entry point of the engine. It owns the
//! process-wide mapping and program caches and finalizes blocks one at a
//! time:
//!
//! 1. Each confirmed transaction is finalized in block order, producing its
//!    actual operations and rejection reason.
//! 2. The actual operations are validated against the expected ones. Any
//!    divergence is fatal.
//! 3. Validated operations are committed, one storage transaction per
//!    confirmed transaction, and mirrored into the mapping cache.
//! 4. Once every transaction is committed the block context is recorded for
//!    later preview runs.
//!
//! Every fatal error clears the mapping cache before it is returned, so a
//! retry reloads committed state instead of trusting what a failed run
//! left behind.

use finalize_common::FinalizeConfig;
use finalize_db::BlockRecord;
use finalize_vm::{FinalizeExecutor, Identifier, Interpreter, MappingCache, ProgramId};
use tracing::{debug, error, info};

use crate::applier;
use crate::block::Block;
use crate::error::Result;
use crate::preview::{self, PreviewError, PreviewUpdate};
use crate::programs::ProgramCache;
use crate::reject::RejectReason;
use crate::store::FinalizeStore;
use crate::transaction::TransactionFinalizer;
use crate::validate::validate_operations;

/// Behavior switches of the block finalizer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinalizerConfig {
    /// Log both operation lists when validation fails.
    pub log_mismatch_details: bool,
}

impl Default for FinalizerConfig {
    fn default() -> Self {
        Self {
            log_mismatch_details: true,
        }
    }
}

impl From<&FinalizeConfig> for FinalizerConfig {
    fn from(config: &FinalizeConfig) -> Self {
        Self {
            log_mismatch_details: config.log_mismatch_details,
        }
    }
}

/// Finalizes confirmed blocks against a store.
pub struct BlockFinalizer<S, E = Interpreter> {
    store: S,
    executor: E,
    mapping_cache: MappingCache,
    programs: ProgramCache,
    config: FinalizerConfig,
}

impl<S: FinalizeStore> BlockFinalizer<S, Interpreter> {
    /// Creates a finalizer using the reference interpreter.
    pub fn new(store: S) -> Self {
        Self::with_executor(store, Interpreter::new(), FinalizerConfig::default())
    }
}

impl<S, E> BlockFinalizer<S, E>
where
    S: FinalizeStore,
    E: FinalizeExecutor,
{
    pub fn with_executor(store: S, executor: E, config: FinalizerConfig) -> Self {
        Self {
            store,
            executor,
            mapping_cache: MappingCache::new(),
            programs: ProgramCache::new(),
            config,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn programs(&self) -> &ProgramCache {
        &self.programs
    }

    /// The process-wide mapping cache.
    pub fn mapping_cache(&self) -> &MappingCache {
        &self.mapping_cache
    }

    /// Drops every cached mapping; the next access reloads from storage.
    pub fn invalidate_cache(&mut self) {
        self.mapping_cache.clear();
    }

    /// Finalizes and commits a block.
    ///
    /// Returns one entry per transaction, in block order: `None` for
    /// accepted transactions, the rejection reason otherwise.
    ///
    /// # Errors
    ///
    /// Any error is fatal for the block. Transactions committed before the
    /// failing one stay committed; the mapping cache is cleared.
    pub async fn finalize_block(&mut self, block: &Block) -> Result<Vec<Option<RejectReason>>> {
        info!(
            height = block.height,
            hash = %block.hash,
            transactions = block.transactions.len(),
            "Finalizing block"
        );
        let result = self.finalize_transactions(block).await;
        if let Err(err) = &result {
            error!(height = block.height, error = %err, "Block finalization failed, clearing mapping cache");
            self.mapping_cache.clear();
        }
        result
    }

    async fn finalize_transactions(&mut self, block: &Block) -> Result<Vec<Option<RejectReason>>> {
        let state = block.finalize_state();
        let mut reasons = Vec::with_capacity(block.transactions.len());

        for (index, confirmed) in block.transactions.iter().enumerate() {
            let finalizer = TransactionFinalizer {
                store: &self.store,
                executor: &self.executor,
                programs: &self.programs,
                state: &state,
            };
            let outcome = finalizer
                .finalize(confirmed, &mut self.mapping_cache)
                .await?;

            if let Err(err) = validate_operations(&outcome.expected, &outcome.actual) {
                let transaction = confirmed.transaction().id();
                if self.config.log_mismatch_details {
                    error!(
                        height = block.height,
                        transaction = %transaction,
                        index,
                        error = %err,
                        expected = ?outcome.expected,
                        actual = ?outcome.actual,
                        reason = ?outcome.reject_reason,
                        "Finalize operations do not match"
                    );
                } else {
                    error!(
                        height = block.height,
                        transaction = %transaction,
                        index,
                        error = %err,
                        "Finalize operations do not match"
                    );
                }
                return Err(err.into());
            }

            self.store
                .commit(&outcome.actual, outcome.deployed.as_ref())
                .await?;
            applier::sync_cache(&mut self.mapping_cache, &outcome.actual);
            if let Some(program) = outcome.deployed {
                self.programs.insert(program);
            }
            debug!(
                transaction = %confirmed.transaction().id(),
                operations = outcome.actual.len(),
                rejected = outcome.reject_reason.is_some(),
                "Committed transaction"
            );
            reasons.push(outcome.reject_reason);
        }

        self.store
            .save_block(&BlockRecord {
                height: block.height,
                hash: block.hash,
                timestamp: block.timestamp,
                seed: block.seed,
            })
            .await?;
        info!(
            height = block.height,
            rejected = reasons.iter().filter(|r| r.is_some()).count(),
            "Finalized block"
        );
        Ok(reasons)
    }

    /// Previews the mapping updates of a finalize scope against the latest
    /// finalized state. Nothing is committed and the mapping cache is not
    /// touched.
    pub async fn preview(
        &self,
        program_id: &ProgramId,
        function: &Identifier,
        inputs: &serde_json::Value,
    ) -> std::result::Result<Vec<PreviewUpdate>, PreviewError> {
        preview::preview_finalize(
            &self.store,
            &self.programs,
            &self.executor,
            program_id,
            function,
            inputs,
        )
        .await
    }
}
