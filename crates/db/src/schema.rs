//! Database schema definitions.
//!
//! # Tables
//!
//! - **State management**: `storestate` - key-value store for node state,
//!   including the schema version
//! - **Programs**: `program` - deployed and builtin program definitions
//! - **Mappings**: `mapping` - one row per initialized mapping
//! - **Mapping contents**: `mapping_value` - the latest value of every key
//! - **Mapping history**: `mapping_history` - every update and removal with
//!   its height, for historical reads
//! - **Blocks**: `block` - context of every finalized block
//!
//! Identifiers (`mapping_id`, `key_id`, `value_id`, block hash and seed) are
//! stored as lowercase hex. Keys and values are stored as JSON plaintexts.
//!
//! # Versioning
//!
//! The schema version is tracked in the `storestate` table and managed by
//! the [`migrations`](crate::migrations) module.

/// Complete SQL schema for initializing a fresh database.
///
/// For existing databases, use the migration system instead of re-running this.
pub const CREATE_SCHEMA: &str = r#"
-- Schema version tracking
CREATE TABLE IF NOT EXISTS storestate (
    statename TEXT PRIMARY KEY,
    state TEXT NOT NULL
);

-- Program definitions
CREATE TABLE IF NOT EXISTS program (
    program_id TEXT PRIMARY KEY,
    is_builtin INTEGER NOT NULL DEFAULT 0,
    definition TEXT NOT NULL
);

-- Initialized mappings
CREATE TABLE IF NOT EXISTS mapping (
    mapping_id TEXT PRIMARY KEY,
    program_id TEXT NOT NULL,
    mapping TEXT NOT NULL,
    UNIQUE (program_id, mapping)
);

-- Latest mapping contents
CREATE TABLE IF NOT EXISTS mapping_value (
    mapping_id TEXT NOT NULL REFERENCES mapping(mapping_id),
    key_id TEXT NOT NULL,
    value_id TEXT NOT NULL,
    key TEXT NOT NULL,
    value TEXT NOT NULL,
    PRIMARY KEY (mapping_id, key_id)
);

-- Mapping mutations; a NULL value records a removal
CREATE TABLE IF NOT EXISTS mapping_history (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    mapping_id TEXT NOT NULL REFERENCES mapping(mapping_id),
    height INTEGER NOT NULL,
    key_id TEXT NOT NULL,
    key TEXT NOT NULL,
    value TEXT,
    from_transaction INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS mapping_history_key ON mapping_history(mapping_id, key_id, height);

-- Finalized blocks
CREATE TABLE IF NOT EXISTS block (
    height INTEGER PRIMARY KEY,
    hash TEXT UNIQUE NOT NULL,
    timestamp INTEGER NOT NULL,
    seed TEXT NOT NULL
);
"#;

/// Well-known keys for the `storestate` table.
pub mod state_keys {
    /// Current database schema version.
    ///
    /// Used by the migration system to track schema upgrades.
    pub const DATABASE_SCHEMA: &str = "databaseschema";
}
