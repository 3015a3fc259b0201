//! Database schema migrations.
//!
//! Migrations are applied sequentially, one version at a time, each in its
//! own transaction. A database with a schema version newer than
//! [`CURRENT_VERSION`] is refused.
//!
//! # Adding New Migrations
//!
//! 1. Increment [`CURRENT_VERSION`]
//! 2. Add a new `Migration` entry to the `MIGRATIONS` array
//! 3. Update [`CREATE_SCHEMA`](crate::schema::CREATE_SCHEMA) to the new layout
//! 4. Provide idempotent SQL (use `IF NOT EXISTS`, `IF EXISTS`, etc.)

use crate::queries::StateQueries;
use crate::schema::state_keys;
use crate::{DbError, Result};
use rusqlite::Connection;
use tracing::info;

/// Current database schema version.
pub const CURRENT_VERSION: i32 = 2;

/// A single schema upgrade step.
struct Migration {
    from_version: i32,
    to_version: i32,
    /// Should use `IF NOT EXISTS`/`IF EXISTS` for idempotency.
    upgrade_sql: &'static str,
    description: &'static str,
}

/// Registry of all available migrations, ordered by version.
const MIGRATIONS: &[Migration] = &[Migration {
    from_version: 1,
    to_version: 2,
    upgrade_sql: r#"
        CREATE INDEX IF NOT EXISTS mapping_history_key
            ON mapping_history(mapping_id, key_id, height);
    "#,
    description: "Index mapping history by key for historical reads",
}];

/// Retrieves the current schema version from the database.
///
/// Returns version 1 if no version is recorded.
///
/// # Errors
///
/// Returns an error if the stored version string cannot be parsed as an integer.
pub fn get_schema_version(conn: &Connection) -> Result<i32> {
    match conn.get_state(state_keys::DATABASE_SCHEMA)? {
        Some(version) => version
            .parse()
            .map_err(|_| DbError::Migration(format!("Invalid schema version: {}", version))),
        None => Ok(1),
    }
}

/// Records the schema version in the database.
pub fn set_schema_version(conn: &Connection, version: i32) -> Result<()> {
    conn.set_state(state_keys::DATABASE_SCHEMA, &version.to_string())
}

/// Returns `true` if the schema version is older than [`CURRENT_VERSION`].
pub fn needs_migration(conn: &Connection) -> Result<bool> {
    Ok(get_schema_version(conn)? < CURRENT_VERSION)
}

/// Runs all necessary migrations to bring the database up to date.
///
/// # Errors
///
/// Returns an error if:
/// - The database version is newer than [`CURRENT_VERSION`]
/// - A required migration is not found
/// - Any migration SQL fails to execute
pub fn run_migrations(conn: &Connection) -> Result<()> {
    let mut current_version = get_schema_version(conn)?;

    if current_version == CURRENT_VERSION {
        info!("Database is up to date at version {}", current_version);
        return Ok(());
    }

    if current_version > CURRENT_VERSION {
        return Err(DbError::Migration(format!(
            "Database version {} is newer than supported version {}",
            current_version, CURRENT_VERSION
        )));
    }

    while current_version < CURRENT_VERSION {
        let migration = MIGRATIONS
            .iter()
            .find(|m| m.from_version == current_version)
            .ok_or_else(|| {
                DbError::Migration(format!(
                    "No migration found from version {}",
                    current_version
                ))
            })?;

        info!(
            "Applying migration {} -> {}: {}",
            migration.from_version, migration.to_version, migration.description
        );

        let tx = conn.unchecked_transaction()?;
        tx.execute_batch(migration.upgrade_sql)?;
        set_schema_version(&tx, migration.to_version)?;
        tx.commit()?;

        current_version = migration.to_version;
    }

    info!("All migrations complete, database at version {}", CURRENT_VERSION);
    Ok(())
}

/// Verifies the schema version matches [`CURRENT_VERSION`].
pub fn verify_schema(conn: &Connection) -> Result<()> {
    let version = get_schema_version(conn)?;

    if version < CURRENT_VERSION {
        return Err(DbError::Migration(format!(
            "Database schema version {} is too old, run migrations first",
            version
        )));
    }

    if version > CURRENT_VERSION {
        return Err(DbError::Migration(format!(
            "Database schema version {} is newer than this software supports ({})",
            version, CURRENT_VERSION
        )));
    }

    Ok(())
}

/// Initializes a fresh database with the current schema.
pub fn initialize_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(crate::schema::CREATE_SCHEMA)?;
    set_schema_version(conn, CURRENT_VERSION)?;
    info!("Initialized database with schema version {}", CURRENT_VERSION);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup_test_db() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(crate::schema::CREATE_SCHEMA).unwrap();
        conn
    }

    #[test]
    fn test_get_schema_version_default() {
        let conn = setup_test_db();
        assert_eq!(get_schema_version(&conn).unwrap(), 1);
        assert!(needs_migration(&conn).unwrap());
    }

    #[test]
    fn test_run_migrations_from_initial() {
        let conn = setup_test_db();
        conn.execute_batch("DROP INDEX mapping_history_key;").unwrap();
        run_migrations(&conn).unwrap();
        assert_eq!(get_schema_version(&conn).unwrap(), CURRENT_VERSION);
        assert!(verify_schema(&conn).is_ok());

        let index_count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'index' AND name = 'mapping_history_key'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(index_count, 1);
    }

    #[test]
    fn test_newer_version_rejected() {
        let conn = setup_test_db();
        set_schema_version(&conn, CURRENT_VERSION + 1).unwrap();
        assert!(run_migrations(&conn).is_err());
        assert!(verify_schema(&conn).is_err());
    }

    #[test]
    fn test_invalid_version_string() {
        let conn = setup_test_db();
        conn.set_state(state_keys::DATABASE_SCHEMA, "two").unwrap();
        assert!(matches!(
            get_schema_version(&conn),
            Err(DbError::Migration(_))
        ));
    }
}
