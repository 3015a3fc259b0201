//! Mapping queries.
//!
//! Three tables back a mapping:
//!
//! - `mapping`: one row per initialized mapping
//! - `mapping_value`: the current value of every live key
//! - `mapping_history`: every update (with value) and removal (NULL value),
//!   tagged with the height and provenance of the mutation
//!
//! Updates and removals write both the current table and the history table,
//! so callers should run them inside [`Database::transaction`](crate::Database::transaction).

use finalize_common::{Hash256, KeyId, MappingId, ValueId};
use rusqlite::{params, Connection, OptionalExtension};

use crate::error::DbError;

/// A stored key and its current value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappingValueRecord {
    pub key_id: KeyId,
    pub value_id: ValueId,
    /// JSON-encoded key plaintext.
    pub key: String,
    /// JSON-encoded value plaintext.
    pub value: String,
}

/// One page of a mapping's current contents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappingValuePage {
    pub records: Vec<MappingValueRecord>,
    /// Cursor of the next page; `None` once the mapping is exhausted.
    pub next_cursor: Option<u64>,
}

/// An upsert of one key.
#[derive(Debug, Clone)]
pub struct KeyValueUpdate<'a> {
    pub mapping_id: &'a MappingId,
    pub key_id: &'a KeyId,
    pub value_id: &'a ValueId,
    pub key: &'a str,
    pub value: &'a str,
    pub height: u32,
    pub from_transaction: bool,
}

/// A removal of one key.
#[derive(Debug, Clone)]
pub struct KeyRemoval<'a> {
    pub mapping_id: &'a MappingId,
    pub key_id: &'a KeyId,
    pub key: &'a str,
    pub height: u32,
    pub from_transaction: bool,
}

/// Query trait for mapping storage.
pub trait MappingQueries {
    /// Creates an empty mapping.
    ///
    /// Fails if the mapping id already exists.
    fn initialize_mapping(
        &self,
        mapping_id: &MappingId,
        program_id: &str,
        mapping: &str,
    ) -> Result<(), DbError>;

    /// Creates an empty mapping unless it already exists.
    ///
    /// Returns `true` if the mapping was created.
    fn initialize_builtin_mapping(
        &self,
        mapping_id: &MappingId,
        program_id: &str,
        mapping: &str,
    ) -> Result<bool, DbError>;

    fn mapping_exists(&self, mapping_id: &MappingId) -> Result<bool, DbError>;

    /// Loads the current contents of a mapping, ordered by key id.
    fn load_mapping_values(&self, mapping_id: &MappingId)
        -> Result<Vec<MappingValueRecord>, DbError>;

    /// Loads up to `count` keys stored after `cursor`, in insertion order.
    ///
    /// A cursor of 0 starts from the beginning. Keys keep their position
    /// when their value is updated.
    fn load_mapping_page(
        &self,
        mapping_id: &MappingId,
        count: u32,
        cursor: u64,
    ) -> Result<MappingValuePage, DbError>;

    /// Upserts a key and appends the change to the history.
    fn update_mapping_key_value(&self, update: &KeyValueUpdate<'_>) -> Result<(), DbError>;

    /// Deletes a key and appends the removal to the history.
    fn remove_mapping_key_value(&self, removal: &KeyRemoval<'_>) -> Result<(), DbError>;

    /// Current value of a key.
    fn get_mapping_value(
        &self,
        mapping_id: &MappingId,
        key_id: &KeyId,
    ) -> Result<Option<String>, DbError>;

    /// Value of a key as of the end of block `height`.
    ///
    /// Returns `None` if the key was unset or removed at that height.
    fn get_mapping_value_at(
        &self,
        mapping_id: &MappingId,
        key_id: &KeyId,
        height: u32,
    ) -> Result<Option<String>, DbError>;

    /// Number of live keys in a mapping.
    fn mapping_key_count(&self, mapping_id: &MappingId) -> Result<u64, DbError>;
}

impl MappingQueries for Connection {
    fn initialize_mapping(
        &self,
        mapping_id: &MappingId,
        program_id: &str,
        mapping: &str,
    ) -> Result<(), DbError> {
        self.execute(
            "INSERT INTO mapping (mapping_id, program_id, mapping) VALUES (?1, ?2, ?3)",
            params![mapping_id.to_hex(), program_id, mapping],
        )?;
        Ok(())
    }

    fn initialize_builtin_mapping(
        &self,
        mapping_id: &MappingId,
        program_id: &str,
        mapping: &str,
    ) -> Result<bool, DbError> {
        let inserted = self.execute(
            "INSERT OR IGNORE INTO mapping (mapping_id, program_id, mapping) VALUES (?1, ?2, ?3)",
            params![mapping_id.to_hex(), program_id, mapping],
        )?;
        Ok(inserted > 0)
    }

    fn mapping_exists(&self, mapping_id: &MappingId) -> Result<bool, DbError> {
        let exists = self
            .query_row(
                "SELECT 1 FROM mapping WHERE mapping_id = ?1",
                params![mapping_id.to_hex()],
                |_| Ok(()),
            )
            .optional()?
            .is_some();
        Ok(exists)
    }

    fn load_mapping_values(
        &self,
        mapping_id: &MappingId,
    ) -> Result<Vec<MappingValueRecord>, DbError> {
        let mut stmt = self.prepare(
            "SELECT key_id, value_id, key, value FROM mapping_value \
             WHERE mapping_id = ?1 ORDER BY key_id",
        )?;
        let rows = stmt
            .query_map(params![mapping_id.to_hex()], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(key_id, value_id, key, value)| {
                Ok(MappingValueRecord {
                    key_id: parse_id(&key_id)?,
                    value_id: parse_id(&value_id)?,
                    key,
                    value,
                })
            })
            .collect()
    }

    fn load_mapping_page(
        &self,
        mapping_id: &MappingId,
        count: u32,
        cursor: u64,
    ) -> Result<MappingValuePage, DbError> {
        let after = i64::try_from(cursor).unwrap_or(i64::MAX);
        let mut stmt = self.prepare(
            "SELECT rowid, key_id, value_id, key, value FROM mapping_value \
             WHERE mapping_id = ?1 AND rowid > ?2 ORDER BY rowid LIMIT ?3",
        )?;
        let rows = stmt
            .query_map(params![mapping_id.to_hex(), after, count], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let last = rows.last().map(|row| row.0);
        let full = count > 0 && rows.len() == count as usize;
        let records = rows
            .into_iter()
            .map(|(_, key_id, value_id, key, value)| {
                Ok(MappingValueRecord {
                    key_id: parse_id(&key_id)?,
                    value_id: parse_id(&value_id)?,
                    key,
                    value,
                })
            })
            .collect::<Result<Vec<_>, DbError>>()?;
        let next_cursor = match last {
            Some(rowid) if full => Some(
                u64::try_from(rowid)
                    .map_err(|_| DbError::Integrity(format!("negative rowid {}", rowid)))?,
            ),
            _ => None,
        };
        Ok(MappingValuePage {
            records,
            next_cursor,
        })
    }

    fn update_mapping_key_value(&self, update: &KeyValueUpdate<'_>) -> Result<(), DbError> {
        let mapping_id = update.mapping_id.to_hex();
        let key_id = update.key_id.to_hex();
        self.execute(
            "INSERT INTO mapping_value (mapping_id, key_id, value_id, key, value) \
             VALUES (?1, ?2, ?3, ?4, ?5) \
             ON CONFLICT (mapping_id, key_id) DO UPDATE SET value_id = excluded.value_id, value = excluded.value",
            params![
                mapping_id,
                key_id,
                update.value_id.to_hex(),
                update.key,
                update.value
            ],
        )?;
        self.execute(
            "INSERT INTO mapping_history (mapping_id, height, key_id, key, value, from_transaction) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                mapping_id,
                update.height,
                key_id,
                update.key,
                update.value,
                update.from_transaction
            ],
        )?;
        Ok(())
    }

    fn remove_mapping_key_value(&self, removal: &KeyRemoval<'_>) -> Result<(), DbError> {
        let mapping_id = removal.mapping_id.to_hex();
        let key_id = removal.key_id.to_hex();
        self.execute(
            "DELETE FROM mapping_value WHERE mapping_id = ?1 AND key_id = ?2",
            params![mapping_id, key_id],
        )?;
        self.execute(
            "INSERT INTO mapping_history (mapping_id, height, key_id, key, value, from_transaction) \
             VALUES (?1, ?2, ?3, ?4, NULL, ?5)",
            params![
                mapping_id,
                removal.height,
                key_id,
                removal.key,
                removal.from_transaction
            ],
        )?;
        Ok(())
    }

    fn get_mapping_value(
        &self,
        mapping_id: &MappingId,
        key_id: &KeyId,
    ) -> Result<Option<String>, DbError> {
        let result = self
            .query_row(
                "SELECT value FROM mapping_value WHERE mapping_id = ?1 AND key_id = ?2",
                params![mapping_id.to_hex(), key_id.to_hex()],
                |row| row.get(0),
            )
            .optional()?;
        Ok(result)
    }

    fn get_mapping_value_at(
        &self,
        mapping_id: &MappingId,
        key_id: &KeyId,
        height: u32,
    ) -> Result<Option<String>, DbError> {
        let result: Option<Option<String>> = self
            .query_row(
                "SELECT value FROM mapping_history \
                 WHERE mapping_id = ?1 AND key_id = ?2 AND height <= ?3 \
                 ORDER BY id DESC LIMIT 1",
                params![mapping_id.to_hex(), key_id.to_hex(), height],
                |row| row.get(0),
            )
            .optional()?;
        Ok(result.flatten())
    }

    fn mapping_key_count(&self, mapping_id: &MappingId) -> Result<u64, DbError> {
        let count: i64 = self.query_row(
            "SELECT COUNT(*) FROM mapping_value WHERE mapping_id = ?1",
            params![mapping_id.to_hex()],
            |row| row.get(0),
        )?;
        u64::try_from(count).map_err(|_| DbError::Integrity(format!("negative key count {}", count)))
    }
}

fn parse_id(hex: &str) -> Result<Hash256, DbError> {
    Hash256::from_hex(hex).map_err(|e| DbError::Integrity(format!("invalid id {}: {}", hex, e)))
}
