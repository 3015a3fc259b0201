//! Block finalization for the finalize engine.
//!
//! This crate re-derives the mapping operations of every confirmed
//! transaction in a block, checks them against the operations consensus
//! recorded, and commits them to storage.
//!
//! # Architecture Overview
//!
//! - [`BlockFinalizer`]: the entry point; owns the process-wide mapping and
//!   program caches
//! - [`transaction`]: per-transaction finalization of deployments,
//!   executions and fees
//! - [`tracer`] and [`call_graph`]: derive the order in which an
//!   execution's finalize scopes run
//! - [`validate`]: expected versus actual operation checks
//! - [`applier`]: writes validated operations and keeps the cache in sync
//! - [`store`]: the async storage interface, implemented for
//!   [`finalize_db::Database`]
//! - [`preview`] and [`query`]: read-only entry points for clients
//! - [`builtin`]: the native credits program
//!
//! # Finalizing a Block
//!
//! ```ignore
//! use finalize_ledger::{builtin, BlockFinalizer};
//!
//! let db = finalize_db::Database::open("finalize.db")?;
//! builtin::init_builtin_program(&db, &builtin::credits_program()?).await?;
//!
//! let mut finalizer = BlockFinalizer::new(db);
//! for block in blocks {
//!     let reasons = finalizer.finalize_block(&block).await?;
//!     for (index, reason) in reasons.iter().enumerate() {
//!         if let Some(reason) = reason {
//!             println!("transaction #{} rejected: {}", index, reason);
//!         }
//!     }
//! }
//! ```
//!
//! # Failure Model
//!
//! Execution failures inside a rejected transaction are expected and
//! become a [`RejectReason`]. Everything else is a [`FinalizeError`], which
//! aborts the block and clears the mapping cache.

pub mod applier;
pub mod block;
pub mod builtin;
pub mod cache;
pub mod call_graph;
mod error;
pub mod finalizer;
pub mod preview;
pub mod programs;
pub mod query;
mod reject;
pub mod store;
pub mod tracer;
pub mod transaction;
pub mod validate;

pub use block::{
    Block, ConfirmedTransaction, Deployment, Execution, Fee, Rejected, Transaction, Transition,
    TransitionOutput,
};
pub use call_graph::{CallGraph, CallNode, NodeId};
pub use error::{FinalizeError, Result};
pub use finalizer::{BlockFinalizer, FinalizerConfig};
pub use preview::{parse_preview_inputs, preview_finalize, PreviewError, PreviewUpdate};
pub use programs::ProgramCache;
pub use query::{QueryError, ReadAt};
pub use reject::RejectReason;
pub use store::FinalizeStore;
pub use tracer::build_async_order;
pub use transaction::{TransactionFinalizer, TransactionOutcome};
pub use validate::{validate_operations, ValidationError};
