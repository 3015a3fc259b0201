//! Asynchronous storage interface of the finalizer.
//!
//! [`FinalizeStore`] is everything block finalization needs from storage.
//! The SQLite implementation runs each call on the blocking pool, so store
//! I/O is the only point where finalization yields.
//!
//! Keys and values are stored as their JSON encoding; programs as their
//! JSON definition.

use async_trait::async_trait;
use finalize_common::{KeyId, MappingId};
use finalize_db::{
    BlockQueries, BlockRecord, Database, MappingQueries, MappingValueRecord, ProgramQueries,
};
use finalize_vm::{
    Identifier, MappingEntries, MappingEntry, MappingOperation, Plaintext, Program, ProgramId,
};
use tracing::debug;

use crate::applier;
use crate::error::{FinalizeError, Result};

/// Storage used by the finalizer.
#[async_trait]
pub trait FinalizeStore: Send + Sync {
    /// Loads a deployed or builtin program.
    async fn get_program(&self, program_id: &ProgramId) -> Result<Option<Program>>;

    /// Loads the committed contents of a mapping.
    ///
    /// Returns `None` if the mapping was never initialized.
    async fn load_mapping(&self, mapping_id: &MappingId) -> Result<Option<MappingEntries>>;

    /// Initializes a builtin mapping unless it exists. Returns `true` if it
    /// was created.
    async fn initialize_builtin_mapping(
        &self,
        mapping_id: &MappingId,
        program_id: &ProgramId,
        mapping: &Identifier,
    ) -> Result<bool>;

    async fn save_builtin_program(&self, program: &Program) -> Result<()>;

    /// Reads one key, either its current value or its value as of the end
    /// of block `height`.
    async fn get_mapping_value(
        &self,
        mapping_id: &MappingId,
        key_id: &KeyId,
        height: Option<u32>,
    ) -> Result<Option<Plaintext>>;

    async fn mapping_key_count(&self, mapping_id: &MappingId) -> Result<u64>;

    /// Reads up to `count` current entries after `cursor`, with the cursor
    /// of the next page if there may be more.
    async fn mapping_page(
        &self,
        mapping_id: &MappingId,
        count: u32,
        cursor: u64,
    ) -> Result<(Vec<(KeyId, MappingEntry)>, Option<u64>)>;

    async fn block(&self, height: u32) -> Result<Option<BlockRecord>>;

    /// The highest block finalized at or before `timestamp`.
    async fn block_at_time(&self, timestamp: i64) -> Result<Option<BlockRecord>>;

    /// The most recently finalized block.
    async fn latest_block(&self) -> Result<Option<BlockRecord>>;

    async fn save_block(&self, block: &BlockRecord) -> Result<()>;

    /// Atomically applies one transaction's operations, storing the
    /// deployed program first when there is one.
    async fn commit(
        &self,
        operations: &[MappingOperation],
        deployed: Option<&Program>,
    ) -> Result<()>;
}

/// Runs a database closure on the blocking pool.
async fn blocking<T, F>(db: &Database, f: F) -> Result<T>
where
    F: FnOnce(&Database) -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    let db = db.clone();
    tokio::task::spawn_blocking(move || f(&db))
        .await
        .map_err(|e| FinalizeError::Task(e.to_string()))?
}

fn decode_entry(record: &MappingValueRecord) -> Result<MappingEntry> {
    Ok(MappingEntry {
        key: serde_json::from_str(&record.key)?,
        value: serde_json::from_str(&record.value)?,
    })
}

#[async_trait]
impl FinalizeStore for Database {
    async fn get_program(&self, program_id: &ProgramId) -> Result<Option<Program>> {
        let id = program_id.clone();
        let definition = blocking(self, move |db| {
            Ok(db.with_connection(|conn| conn.load_program(id.as_str()))?)
        })
        .await?;
        definition
            .map(|text| Program::from_json(&text).map_err(FinalizeError::from))
            .transpose()
    }

    async fn load_mapping(&self, mapping_id: &MappingId) -> Result<Option<MappingEntries>> {
        let mapping_id = *mapping_id;
        let records = blocking(self, move |db| {
            Ok(db.with_connection(|conn| {
                if !conn.mapping_exists(&mapping_id)? {
                    return Ok(None);
                }
                conn.load_mapping_values(&mapping_id).map(Some)
            })?)
        })
        .await?;
        let Some(records) = records else {
            return Ok(None);
        };
        debug!(mapping = %mapping_id, keys = records.len(), "Loaded mapping from storage");
        let mut entries = MappingEntries::new();
        for record in &records {
            entries.insert(record.key_id, decode_entry(record)?);
        }
        Ok(Some(entries))
    }

    async fn initialize_builtin_mapping(
        &self,
        mapping_id: &MappingId,
        program_id: &ProgramId,
        mapping: &Identifier,
    ) -> Result<bool> {
        let (mapping_id, program_id, mapping) = (*mapping_id, program_id.clone(), mapping.clone());
        blocking(self, move |db| {
            Ok(db.with_connection(|conn| {
                conn.initialize_builtin_mapping(&mapping_id, program_id.as_str(), mapping.as_str())
            })?)
        })
        .await
    }

    async fn save_builtin_program(&self, program: &Program) -> Result<()> {
        let id = program.id.clone();
        let definition = program.to_json()?;
        blocking(self, move |db| {
            Ok(db.with_connection(|conn| conn.store_program(id.as_str(), &definition, true))?)
        })
        .await
    }

    async fn get_mapping_value(
        &self,
        mapping_id: &MappingId,
        key_id: &KeyId,
        height: Option<u32>,
    ) -> Result<Option<Plaintext>> {
        let (mapping_id, key_id) = (*mapping_id, *key_id);
        let value = blocking(self, move |db| {
            Ok(db.with_connection(|conn| match height {
                Some(height) => conn.get_mapping_value_at(&mapping_id, &key_id, height),
                None => conn.get_mapping_value(&mapping_id, &key_id),
            })?)
        })
        .await?;
        value
            .map(|text| serde_json::from_str(&text).map_err(FinalizeError::from))
            .transpose()
    }

    async fn mapping_key_count(&self, mapping_id: &MappingId) -> Result<u64> {
        let mapping_id = *mapping_id;
        blocking(self, move |db| {
            Ok(db.with_connection(|conn| conn.mapping_key_count(&mapping_id))?)
        })
        .await
    }

    async fn mapping_page(
        &self,
        mapping_id: &MappingId,
        count: u32,
        cursor: u64,
    ) -> Result<(Vec<(KeyId, MappingEntry)>, Option<u64>)> {
        let mapping_id = *mapping_id;
        let page = blocking(self, move |db| {
            Ok(db.with_connection(|conn| conn.load_mapping_page(&mapping_id, count, cursor))?)
        })
        .await?;
        let entries = page
            .records
            .iter()
            .map(|record| Ok((record.key_id, decode_entry(record)?)))
            .collect::<Result<Vec<_>>>()?;
        Ok((entries, page.next_cursor))
    }

    async fn block(&self, height: u32) -> Result<Option<BlockRecord>> {
        blocking(self, move |db| Ok(db.with_connection(|conn| conn.load_block(height))?)).await
    }

    async fn block_at_time(&self, timestamp: i64) -> Result<Option<BlockRecord>> {
        blocking(self, move |db| {
            Ok(db.with_connection(|conn| conn.load_block_at_time(timestamp))?)
        })
        .await
    }

    async fn latest_block(&self) -> Result<Option<BlockRecord>> {
        blocking(self, |db| Ok(db.with_connection(|conn| conn.load_latest_block())?)).await
    }

    async fn save_block(&self, block: &BlockRecord) -> Result<()> {
        let block = block.clone();
        blocking(self, move |db| {
            Ok(db.with_connection(|conn| conn.store_block(&block))?)
        })
        .await
    }

    async fn commit(
        &self,
        operations: &[MappingOperation],
        deployed: Option<&Program>,
    ) -> Result<()> {
        let operations = operations.to_vec();
        let deployed = deployed
            .map(|program| Ok::<_, FinalizeError>((program.id.clone(), program.to_json()?)))
            .transpose()?;
        blocking(self, move |db| {
            let mut conn = db.connection()?;
            let tx = conn.transaction().map_err(finalize_db::DbError::from)?;
            if let Some((id, definition)) = &deployed {
                tx.store_program(id.as_str(), definition, false)?;
            }
            applier::apply_operations(&*tx, &operations)?;
            tx.commit().map_err(finalize_db::DbError::from)?;
            Ok(())
        })
        .await
    }
}
