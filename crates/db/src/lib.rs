//! SQLite persistence for the finalize engine.
//!
//! This crate stores:
//!
//! - **Programs**: deployed and builtin program definitions
//! - **Mappings**: initialized mappings and the current value of every key
//! - **Mapping history**: every update and removal with its height, for
//!   historical reads
//! - **Blocks**: height, hash, timestamp and seed of every finalized block
//! - **Operational state**: the schema version
//!
//! # Architecture
//!
//! - [`pool`]: Connection pool management using r2d2
//! - [`schema`]: Table layouts
//! - [`migrations`]: Schema versioning and migration system
//! - [`queries`]: Typed query traits for each data domain
//! - [`error`]: Error types for database operations
//!
//! # Usage
//!
//! ```no_run
//! use finalize_db::{Database, BlockQueries};
//!
//! let db = Database::open("path/to/finalize.db")?;
//!
//! let latest = db.with_connection(|conn| conn.load_latest_block())?;
//! if let Some(block) = latest {
//!     println!("Latest finalized block: {}", block.height);
//! }
//! # Ok::<(), finalize_db::DbError>(())
//! ```

pub mod error;
pub mod migrations;
pub mod pool;
pub mod queries;
pub mod schema;

pub use error::DbError;
pub use migrations::{needs_migration, run_migrations, verify_schema, CURRENT_VERSION};
pub use pool::{Database, PooledConnection};
pub use queries::*;

use std::path::Path;
use tracing::info;

/// Result type for database operations.
pub type Result<T> = std::result::Result<T, DbError>;

/// Default maximum number of pooled connections for file databases.
pub const DEFAULT_POOL_SIZE: u32 = 10;

impl Database {
    /// Opens a database at the given path, creating it if necessary.
    ///
    /// This method will:
    /// 1. Create the parent directory if it doesn't exist
    /// 2. Open or create the SQLite database file
    /// 3. Configure SQLite (WAL mode, foreign keys)
    /// 4. Create the schema or verify an existing one
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The parent directory cannot be created
    /// - The database file cannot be opened
    /// - The existing schema is older or newer than [`CURRENT_VERSION`]
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with_pool_size(path, DEFAULT_POOL_SIZE)
    }

    /// Like [`open`](Self::open) with an explicit pool size.
    pub fn open_with_pool_size(path: impl AsRef<Path>, pool_size: u32) -> Result<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let manager = r2d2_sqlite::SqliteConnectionManager::file(path).with_init(|conn| {
            conn.execute_batch(
                r#"
                PRAGMA journal_mode = WAL;
                PRAGMA synchronous = NORMAL;
                PRAGMA foreign_keys = ON;
            "#,
            )
        });
        let pool = r2d2::Pool::builder().max_size(pool_size).build(manager)?;

        let db = Self { pool };
        db.initialize()?;
        info!(path = %path.display(), pool_size, "Opened database");
        Ok(db)
    }

    /// Opens an in-memory database, primarily for testing.
    ///
    /// The pool holds a single connection since in-memory databases are
    /// connection-specific.
    pub fn open_in_memory() -> Result<Self> {
        let manager = r2d2_sqlite::SqliteConnectionManager::memory()
            .with_init(|conn| conn.execute_batch("PRAGMA foreign_keys = ON;"));
        let pool = r2d2::Pool::builder().max_size(1).build(manager)?;

        let db = Self { pool };
        db.initialize()?;
        Ok(db)
    }

    /// Creates the schema on a fresh database, or migrates and verifies an
    /// existing one.
    fn initialize(&self) -> Result<()> {
        let conn = self.connection()?;

        let tables_exist: bool = conn.query_row(
            "SELECT COUNT(*) > 0 FROM sqlite_master WHERE type='table' AND name='storestate'",
            [],
            |row| row.get(0),
        )?;

        if tables_exist {
            if migrations::needs_migration(&conn)? {
                info!("Database requires migration");
                migrations::run_migrations(&conn)?;
            }
            migrations::verify_schema(&conn)?;
        } else {
            migrations::initialize_schema(&conn)?;
        }

        Ok(())
    }

    /// Upgrades the database schema to the latest version.
    ///
    /// Called by the `upgrade-db` CLI command. Opening a database already
    /// migrates it, so this is a no-op on a freshly opened handle.
    pub fn upgrade(&self) -> Result<()> {
        let conn = self.connection()?;
        migrations::run_migrations(&conn)
    }

    /// Returns the current database schema version.
    pub fn schema_version(&self) -> Result<i32> {
        let conn = self.connection()?;
        migrations::get_schema_version(&conn)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_in_memory_initializes_schema() {
        let db = Database::open_in_memory().unwrap();
        assert_eq!(db.schema_version().unwrap(), CURRENT_VERSION);
        assert_eq!(db.pool_size(), 1);
    }

    #[test]
    fn test_open_file_and_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("finalize.db");
        {
            let db = Database::open_with_pool_size(&path, 2).unwrap();
            db.transaction(|tx| tx.store_program("token.aleo", "{}", false))
                .unwrap();
        }
        let db = Database::open(&path).unwrap();
        let definition = db
            .with_connection(|conn| conn.load_program("token.aleo"))
            .unwrap();
        assert_eq!(definition.as_deref(), Some("{}"));
        assert!(db.upgrade().is_ok());
    }

    #[test]
    fn test_foreign_keys_enforced() {
        let db = Database::open_in_memory().unwrap();
        let mapping_id = finalize_common::Hash256::hash(b"missing");
        let result = db.transaction(|tx| {
            tx.update_mapping_key_value(&KeyValueUpdate {
                mapping_id: &mapping_id,
                key_id: &mapping_id,
                value_id: &mapping_id,
                key: "\"1u8\"",
                value: "\"1u8\"",
                height: 1,
                from_transaction: true,
            })
        });
        assert!(result.is_err());
    }
}
