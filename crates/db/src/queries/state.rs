//! State queries for the storestate table.
//!
//! The `storestate` table is a small key-value store for node state such as
//! the schema version. See [`state_keys`](crate::schema::state_keys) for
//! well-known keys.

use rusqlite::{params, Connection, OptionalExtension};

use crate::error::DbError;

/// Query trait for the storestate key-value table.
pub trait StateQueries {
    /// Retrieves a state value by key.
    ///
    /// Returns `None` if the key does not exist.
    fn get_state(&self, key: &str) -> Result<Option<String>, DbError>;

    /// Stores a state value, replacing any existing one.
    fn set_state(&self, key: &str, value: &str) -> Result<(), DbError>;
}

impl StateQueries for Connection {
    fn get_state(&self, key: &str) -> Result<Option<String>, DbError> {
        let result = self
            .query_row(
                "SELECT state FROM storestate WHERE statename = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(result)
    }

    fn set_state(&self, key: &str, value: &str) -> Result<(), DbError> {
        self.execute(
            "INSERT OR REPLACE INTO storestate (statename, state) VALUES (?1, ?2)",
            params![key, value],
        )?;
        Ok(())
    }
}
