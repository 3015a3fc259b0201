//! Program and value model for the finalize engine.
//!
//! This crate holds everything the engine needs to talk about on-chain
//! programs without touching storage:
//!
//! - [`Program`] and its parts: mappings, functions, call/async
//!   instructions and finalize [`Command`]s
//! - [`Plaintext`], [`Literal`] and [`Value`], including [`Future`]s
//! - [`ids`]: deterministic mapping, key and value identifiers
//! - [`FinalizeOperation`] (expected) and [`MappingOperation`] (actual)
//! - [`MappingCache`] and the [`FinalizeCaches`] overlay
//! - the [`FinalizeExecutor`] trait and the reference [`Interpreter`]
//!
//! # Executing a finalize scope
//!
//! ```ignore
//! use finalize_vm::{FinalizeCaches, FinalizeExecutor, FinalizeRequest, Interpreter};
//!
//! let ops = Interpreter.execute(
//!     FinalizeRequest {
//!         state: &state,
//!         programs: &programs,
//!         program: &program,
//!         function: &function,
//!         order: &async_order,
//!         rejected: &HashSet::new(),
//!         inputs,
//!         allow_state_change: true,
//!         execute_await_eagerly: false,
//!     },
//!     FinalizeCaches::shared(&mut cache),
//! )?;
//! ```

pub mod cache;
mod error;
pub mod executor;
pub mod identifier;
pub mod ids;
pub mod interpreter;
pub mod literal;
pub mod operation;
pub mod plaintext;
pub mod program;
pub mod value;

pub use cache::{FinalizeCaches, MappingCache, MappingEntries, MappingEntry};
pub use error::VmError;
pub use executor::{
    ExecuteError, FinalizeExecutor, FinalizeRequest, FinalizeState, ProgramLookup,
};
pub use identifier::{Identifier, Locator, ProgramId};
pub use interpreter::Interpreter;
pub use literal::{Literal, LiteralType};
pub use operation::{FinalizeOperation, MappingOperation, OperationKind};
pub use plaintext::{Plaintext, PlaintextType, StructMember, StructType};
pub use program::{
    Command, Finalize, FinalizeInput, FinalizeType, Function, Instruction, Mapping, MappingRef,
    Operand, Program, Register,
};
pub use value::{Argument, Future, Value};
