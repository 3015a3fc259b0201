//! Read-only mapping queries.
//!
//! These resolve a mapping and key given by name and text, the way an
//! explorer or wallet asks for them, and read committed storage directly.
//! The mapping cache is not consulted, and programs are loaded through an
//! overlay so the shared program cache is never written.

use finalize_vm::{
    ids, Identifier, Literal, MappingEntries, MappingEntry, Plaintext, PlaintextType, Program,
    ProgramId,
};
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;

use crate::error::FinalizeError;
use crate::programs::ProgramCache;
use crate::store::FinalizeStore;

/// Page size of [`mapping_values`] when none is given.
pub const DEFAULT_PAGE_SIZE: u32 = 50;

/// Largest page [`mapping_values`] returns.
pub const MAX_PAGE_SIZE: u32 = 100;

/// Query failures.
#[derive(Debug, Error)]
pub enum QueryError {
    #[error("program {0} not found")]
    ProgramNotFound(ProgramId),

    #[error("mapping {program}/{mapping} not found")]
    MappingNotFound {
        program: ProgramId,
        mapping: Identifier,
    },

    #[error("invalid key: {0}")]
    InvalidKey(String),

    #[error("block {0} not found")]
    BlockNotFound(u32),

    #[error("no block finalized at or before time {0}")]
    NoBlockAtTime(i64),

    #[error(transparent)]
    Store(FinalizeError),
}

impl From<FinalizeError> for QueryError {
    fn from(err: FinalizeError) -> Self {
        match err {
            FinalizeError::ProgramNotFound(id) => Self::ProgramNotFound(id),
            other => Self::Store(other),
        }
    }
}

/// The point in history a value is read at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReadAt {
    /// The latest committed state.
    #[default]
    Latest,
    /// The end of block `height`.
    Height(u32),
    /// The end of the last block finalized at or before a Unix timestamp.
    Time(i64),
}

/// A mapping value with the block it was read at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MappingValue {
    /// `None` when read before the first block.
    pub height: Option<u32>,
    pub timestamp: Option<i64>,
    /// `None` if the key is not set.
    pub value: Option<Plaintext>,
}

/// One page of a mapping's contents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MappingValuePage {
    pub entries: Vec<MappingEntry>,
    /// Pass back to [`mapping_values`] for the next page; `None` at the end.
    pub cursor: Option<u64>,
}

async fn declared_program<S>(
    store: &S,
    programs: &ProgramCache,
    program_id: &ProgramId,
    mapping: &Identifier,
) -> Result<Arc<Program>, QueryError>
where
    S: FinalizeStore + ?Sized,
{
    let program = programs.overlay().load(store, program_id).await?;
    if program.mapping(mapping).is_none() {
        return Err(QueryError::MappingNotFound {
            program: program_id.clone(),
            mapping: mapping.clone(),
        });
    }
    Ok(program)
}

/// Parses a key given as text.
///
/// Literal keys may omit their type suffix. Struct keys are JSON objects.
pub fn parse_key(program: &Program, ty: &PlaintextType, text: &str) -> Result<Plaintext, QueryError> {
    match ty {
        PlaintextType::Literal(literal_type) => Literal::parse_as(*literal_type, text.trim())
            .map(Plaintext::Literal)
            .map_err(|e| QueryError::InvalidKey(e.to_string())),
        PlaintextType::Struct(_) => {
            let json: serde_json::Value =
                serde_json::from_str(text).map_err(|e| QueryError::InvalidKey(e.to_string()))?;
            Plaintext::from_json(&json, ty, &program.structs)
                .map_err(|e| QueryError::InvalidKey(e.to_string()))
        }
    }
}

/// Reads one mapping value at `at`, along with the height and timestamp of
/// the block the read reflects.
pub async fn mapping_value<S>(
    store: &S,
    programs: &ProgramCache,
    program_id: &ProgramId,
    mapping: &Identifier,
    key: &str,
    at: ReadAt,
) -> Result<MappingValue, QueryError>
where
    S: FinalizeStore + ?Sized,
{
    let program = declared_program(store, programs, program_id, mapping).await?;
    let declaration = program
        .mapping(mapping)
        .ok_or_else(|| QueryError::MappingNotFound {
            program: program_id.clone(),
            mapping: mapping.clone(),
        })?;
    let key = parse_key(&program, &declaration.key, key)?;
    let mapping_id = ids::mapping_id(program_id, mapping);
    let key_id = ids::key_id(program_id, mapping, &key);

    let (block, height) = match at {
        ReadAt::Latest => (store.latest_block().await?, None),
        ReadAt::Height(height) => {
            let block = store
                .block(height)
                .await?
                .ok_or(QueryError::BlockNotFound(height))?;
            (Some(block), Some(height))
        }
        ReadAt::Time(timestamp) => {
            let block = store
                .block_at_time(timestamp)
                .await?
                .ok_or(QueryError::NoBlockAtTime(timestamp))?;
            let height = block.height;
            (Some(block), Some(height))
        }
    };
    let value = store.get_mapping_value(&mapping_id, &key_id, height).await?;
    Ok(MappingValue {
        height: block.as_ref().map(|b| b.height),
        timestamp: block.as_ref().map(|b| b.timestamp),
        value,
    })
}

/// Lists a mapping's current entries a page at a time, in the order keys
/// were first set.
///
/// `count` defaults to [`DEFAULT_PAGE_SIZE`] and is capped at
/// [`MAX_PAGE_SIZE`]. A missing cursor starts from the beginning.
pub async fn mapping_values<S>(
    store: &S,
    programs: &ProgramCache,
    program_id: &ProgramId,
    mapping: &Identifier,
    count: Option<u32>,
    cursor: Option<u64>,
) -> Result<MappingValuePage, QueryError>
where
    S: FinalizeStore + ?Sized,
{
    declared_program(store, programs, program_id, mapping).await?;
    let count = count.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
    let (entries, cursor) = store
        .mapping_page(
            &ids::mapping_id(program_id, mapping),
            count,
            cursor.unwrap_or(0),
        )
        .await?;
    Ok(MappingValuePage {
        entries: entries.into_iter().map(|(_, entry)| entry).collect(),
        cursor,
    })
}

/// The full current contents of a mapping, keyed by key id.
///
/// A declared mapping that was never initialized reads as empty.
pub async fn mapping_contents<S>(
    store: &S,
    programs: &ProgramCache,
    program_id: &ProgramId,
    mapping: &Identifier,
) -> Result<MappingEntries, QueryError>
where
    S: FinalizeStore + ?Sized,
{
    declared_program(store, programs, program_id, mapping).await?;
    Ok(store
        .load_mapping(&ids::mapping_id(program_id, mapping))
        .await?
        .unwrap_or_default())
}

/// Names of the mappings a program declares, in declaration order.
pub async fn mapping_names<S>(
    store: &S,
    programs: &ProgramCache,
    program_id: &ProgramId,
) -> Result<Vec<Identifier>, QueryError>
where
    S: FinalizeStore + ?Sized,
{
    let program = programs.overlay().load(store, program_id).await?;
    Ok(program.mappings.iter().map(|m| m.name.clone()).collect())
}

/// Number of keys currently set in a mapping.
pub async fn mapping_key_count<S>(
    store: &S,
    programs: &ProgramCache,
    program_id: &ProgramId,
    mapping: &Identifier,
) -> Result<u64, QueryError>
where
    S: FinalizeStore + ?Sized,
{
    declared_program(store, programs, program_id, mapping).await?;
    Ok(store
        .mapping_key_count(&ids::mapping_id(program_id, mapping))
        .await?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_key_forms() {
        let program = Program::from_json(
            r#"{
                "id": "grid.aleo",
                "structs": [{ "name": "cell", "members": [
                    { "name": "row", "type": "u8" },
                    { "name": "col", "type": "u8" }
                ]}]
            }"#,
        )
        .unwrap();
        let u64_type: PlaintextType = "u64".parse().unwrap();
        assert_eq!(
            parse_key(&program, &u64_type, "7").unwrap(),
            parse_key(&program, &u64_type, "7u64").unwrap()
        );
        assert!(matches!(
            parse_key(&program, &u64_type, "7u32"),
            Err(QueryError::InvalidKey(_))
        ));

        let cell: PlaintextType = "cell".parse().unwrap();
        let key = parse_key(&program, &cell, r#"{"row": 1, "col": "2u8"}"#).unwrap();
        assert!(matches!(key, Plaintext::Struct(ref members) if members.len() == 2));
        assert!(parse_key(&program, &cell, "not json").is_err());
    }
}
