//! Finalized block queries.

use finalize_common::Hash256;
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::error::DbError;

/// The recorded context of a finalized block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockRecord {
    pub height: u32,
    pub hash: Hash256,
    /// Seconds since the Unix epoch.
    pub timestamp: i64,
    pub seed: Hash256,
}

/// Query trait for the `block` table.
pub trait BlockQueries {
    /// Records a finalized block, replacing any record at the same height.
    fn store_block(&self, block: &BlockRecord) -> Result<(), DbError>;

    /// Loads the block at `height`.
    fn load_block(&self, height: u32) -> Result<Option<BlockRecord>, DbError>;

    /// Loads the highest block finalized at or before `timestamp`.
    fn load_block_at_time(&self, timestamp: i64) -> Result<Option<BlockRecord>, DbError>;

    /// Loads the highest finalized block.
    ///
    /// Returns `None` if no block has been finalized yet.
    fn load_latest_block(&self) -> Result<Option<BlockRecord>, DbError>;
}

const BLOCK_COLUMNS: &str = "height, hash, timestamp, seed";

impl BlockQueries for Connection {
    fn store_block(&self, block: &BlockRecord) -> Result<(), DbError> {
        self.execute(
            "INSERT OR REPLACE INTO block (height, hash, timestamp, seed) VALUES (?1, ?2, ?3, ?4)",
            params![
                block.height,
                block.hash.to_hex(),
                block.timestamp,
                block.seed.to_hex()
            ],
        )?;
        Ok(())
    }

    fn load_block(&self, height: u32) -> Result<Option<BlockRecord>, DbError> {
        let row = self
            .query_row(
                &format!("SELECT {} FROM block WHERE height = ?1", BLOCK_COLUMNS),
                params![height],
                raw_block,
            )
            .optional()?;
        row.map(decode_block).transpose()
    }

    fn load_block_at_time(&self, timestamp: i64) -> Result<Option<BlockRecord>, DbError> {
        let row = self
            .query_row(
                &format!(
                    "SELECT {} FROM block WHERE timestamp <= ?1 ORDER BY height DESC LIMIT 1",
                    BLOCK_COLUMNS
                ),
                params![timestamp],
                raw_block,
            )
            .optional()?;
        row.map(decode_block).transpose()
    }

    fn load_latest_block(&self) -> Result<Option<BlockRecord>, DbError> {
        let row = self
            .query_row(
                &format!(
                    "SELECT {} FROM block ORDER BY height DESC LIMIT 1",
                    BLOCK_COLUMNS
                ),
                [],
                raw_block,
            )
            .optional()?;
        row.map(decode_block).transpose()
    }
}

type RawBlock = (u32, String, i64, String);

fn raw_block(row: &Row<'_>) -> rusqlite::Result<RawBlock> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
}

fn decode_block((height, hash, timestamp, seed): RawBlock) -> Result<BlockRecord, DbError> {
    let parse = |field: &str, hex: &str| {
        Hash256::from_hex(hex).map_err(|e| {
            DbError::Integrity(format!("invalid block {} at height {}: {}", field, height, e))
        })
    };
    Ok(BlockRecord {
        height,
        hash: parse("hash", &hash)?,
        timestamp,
        seed: parse("seed", &seed)?,
    })
}
