//! Connection pool management.
//!
//! [`Database`] wraps an r2d2 pool of SQLite connections. It is cheap to
//! clone and every clone shares the pool, so the async store layer can move
//! a handle into a blocking task per call.

use crate::error::DbError;
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::Connection;

/// A pooled SQLite connection, returned to the pool when dropped.
pub type PooledConnection = r2d2::PooledConnection<SqliteConnectionManager>;

/// Database handle with connection pooling.
///
/// # Example
///
/// ```no_run
/// use finalize_db::{Database, MappingQueries, ProgramQueries};
///
/// let db = Database::open("finalize.db")?;
///
/// let definition = db.with_connection(|conn| conn.load_program("credits.aleo"))?;
///
/// // Several writes that must land together
/// db.transaction(|tx| {
///     tx.initialize_mapping(&"aa".repeat(32).parse().unwrap(), "token.aleo", "balances")?;
///     Ok(())
/// })?;
/// # Ok::<(), finalize_db::DbError>(())
/// ```
#[derive(Clone)]
pub struct Database {
    pub(crate) pool: Pool<SqliteConnectionManager>,
}

impl Database {
    /// Obtains a connection from the pool.
    ///
    /// # Errors
    ///
    /// Returns an error if the pool is exhausted or a connection cannot
    /// be established.
    pub fn connection(&self) -> Result<PooledConnection, DbError> {
        self.pool.get().map_err(DbError::from)
    }

    /// Executes a closure within a database transaction.
    ///
    /// The transaction commits if the closure returns `Ok` and rolls back
    /// otherwise. [`rusqlite::Transaction`] derefs to [`Connection`], so the
    /// query traits are available on it.
    pub fn transaction<T, F>(&self, f: F) -> Result<T, DbError>
    where
        F: FnOnce(&rusqlite::Transaction) -> Result<T, DbError>,
    {
        let mut conn = self.connection()?;
        let tx = conn.transaction()?;
        let result = f(&tx)?;
        tx.commit()?;
        Ok(result)
    }

    /// Executes a closure with a pooled connection, outside any explicit
    /// transaction.
    pub fn with_connection<T, F>(&self, f: F) -> Result<T, DbError>
    where
        F: FnOnce(&Connection) -> Result<T, DbError>,
    {
        let conn = self.connection()?;
        f(&conn)
    }

    /// Maximum number of pooled connections.
    pub fn pool_size(&self) -> u32 {
        self.pool.max_size()
    }
}
