//! Typed query traits, one per data domain.
//!
//! Each trait is implemented for [`rusqlite::Connection`], so the methods are
//! available on pooled connections and, through deref, on transactions.

mod block;
mod mapping;
mod program;
mod state;

pub use block::{BlockQueries, BlockRecord};
pub use mapping::{KeyRemoval, KeyValueUpdate, MappingQueries, MappingValuePage, MappingValueRecord};
pub use program::ProgramQueries;
pub use state::StateQueries;
