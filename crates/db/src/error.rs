//! Database error types.
//!
//! This module defines the error types used throughout the database layer.
//! All errors are consolidated into the [`DbError`] enum which provides
//! automatic conversion from underlying error types.

use thiserror::Error;

/// Errors that can occur during database operations.
///
/// # Error Categories
///
/// - **Infrastructure errors**: [`Sqlite`](DbError::Sqlite), [`Pool`](DbError::Pool),
///   [`Io`](DbError::Io) - failures in the underlying systems
/// - **Data errors**: [`Integrity`](DbError::Integrity) - stored data in an
///   unexpected shape
/// - **Schema errors**: [`Migration`](DbError::Migration) - schema version incompatibilities
#[derive(Error, Debug)]
pub enum DbError {
    /// SQLite database error.
    ///
    /// Wraps errors from rusqlite including query failures, constraint
    /// violations, and database corruption.
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Connection pool error.
    ///
    /// Occurs when a connection cannot be obtained from the pool,
    /// typically due to pool exhaustion or configuration issues.
    #[error("Pool error: {0}")]
    Pool(#[from] r2d2::Error),

    /// File system I/O error.
    ///
    /// Occurs while creating the database file's parent directory.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Data integrity violation.
    ///
    /// Stored data is in an unexpected state, such as a malformed hex id or
    /// an out-of-range height.
    #[error("Integrity error: {0}")]
    Integrity(String),

    /// Schema migration error.
    ///
    /// Occurs during database initialization or upgrade when the schema
    /// version is incompatible or a migration fails to apply.
    #[error("Migration error: {0}")]
    Migration(String),
}
