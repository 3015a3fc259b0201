//! Operation applier.
//!
//! Writes one transaction's validated operations to storage, in order, and
//! mirrors them into the process-wide mapping cache once the storage
//! transaction has committed.

use finalize_db::{KeyRemoval, KeyValueUpdate, MappingQueries};
use finalize_vm::{MappingCache, MappingEntry, MappingOperation};
use tracing::trace;

use crate::error::Result;

/// Applies operations through the mapping queries of `conn`.
///
/// Callers run this inside a storage transaction so a failure leaves no
/// partial writes.
pub fn apply_operations<C>(conn: &C, operations: &[MappingOperation]) -> Result<()>
where
    C: MappingQueries + ?Sized,
{
    for operation in operations {
        trace!(kind = %operation.kind(), mapping = %operation.mapping_id(), "Applying operation");
        match operation {
            MappingOperation::InitializeMapping {
                mapping_id,
                program_id,
                mapping,
            } => {
                conn.initialize_mapping(mapping_id, program_id.as_str(), mapping.as_str())?;
            }
            MappingOperation::UpdateKeyValue {
                mapping_id,
                key_id,
                value_id,
                key,
                value,
                height,
                from_transaction,
                ..
            } => {
                let key = serde_json::to_string(key)?;
                let value = serde_json::to_string(value)?;
                conn.update_mapping_key_value(&KeyValueUpdate {
                    mapping_id,
                    key_id,
                    value_id,
                    key: &key,
                    value: &value,
                    height: *height,
                    from_transaction: *from_transaction,
                })?;
            }
            MappingOperation::RemoveKeyValue {
                mapping_id,
                key_id,
                key,
                height,
                from_transaction,
                ..
            } => {
                let key = serde_json::to_string(key)?;
                conn.remove_mapping_key_value(&KeyRemoval {
                    mapping_id,
                    key_id,
                    key: &key,
                    height: *height,
                    from_transaction: *from_transaction,
                })?;
            }
        }
    }
    Ok(())
}

/// Mirrors committed operations into the shared cache.
///
/// Writes made during execution already reached the cache; replaying them
/// is idempotent and also covers operations that bypass execution, such as
/// mapping initialization.
pub fn sync_cache(cache: &mut MappingCache, operations: &[MappingOperation]) {
    for operation in operations {
        match operation {
            MappingOperation::InitializeMapping { mapping_id, .. } => {
                cache.initialize_mapping(*mapping_id);
            }
            MappingOperation::UpdateKeyValue {
                mapping_id,
                key_id,
                key,
                value,
                ..
            } => cache.upsert(
                *mapping_id,
                *key_id,
                MappingEntry {
                    key: key.clone(),
                    value: value.clone(),
                },
            ),
            MappingOperation::RemoveKeyValue {
                mapping_id, key_id, ..
            } => {
                cache.remove(mapping_id, key_id);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use finalize_db::Database;
    use finalize_vm::{ids, Identifier, Literal, Plaintext, ProgramId};

    fn names() -> (ProgramId, Identifier) {
        (
            ProgramId::new("token.aleo").unwrap(),
            Identifier::new("supply").unwrap(),
        )
    }

    fn update(key: u64, value: u64, height: u32) -> MappingOperation {
        let (program_id, mapping) = names();
        let key: Plaintext = Literal::U64(key).into();
        let value: Plaintext = Literal::U64(value).into();
        let key_id = ids::key_id(&program_id, &mapping, &key);
        MappingOperation::UpdateKeyValue {
            mapping_id: ids::mapping_id(&program_id, &mapping),
            key_id,
            value_id: ids::value_id(&key_id, &value),
            program_id,
            mapping,
            key,
            value,
            height,
            from_transaction: true,
        }
    }

    #[test]
    fn test_apply_and_sync() {
        let db = Database::open_in_memory().unwrap();
        let (program_id, mapping) = names();
        let mapping_id = ids::mapping_id(&program_id, &mapping);
        let init = MappingOperation::InitializeMapping {
            mapping_id,
            program_id: program_id.clone(),
            mapping: mapping.clone(),
        };
        let key: Plaintext = Literal::U64(1).into();
        let key_id = ids::key_id(&program_id, &mapping, &key);
        let remove = MappingOperation::RemoveKeyValue {
            mapping_id,
            key_id,
            program_id,
            mapping,
            key,
            height: 3,
            from_transaction: true,
        };
        let operations = vec![init, update(1, 10, 2), update(2, 20, 2), remove];

        db.with_connection(|conn| {
            apply_operations(conn, &operations).unwrap();
            assert_eq!(conn.mapping_key_count(&mapping_id)?, 1);
            assert_eq!(conn.get_mapping_value(&mapping_id, &key_id)?, None);
            assert_eq!(
                conn.get_mapping_value_at(&mapping_id, &key_id, 2)?,
                Some("\"10u64\"".to_string())
            );
            Ok(())
        })
        .unwrap();

        let mut cache = MappingCache::new();
        sync_cache(&mut cache, &operations);
        let entries = cache.get(&mapping_id).unwrap();
        assert_eq!(entries.len(), 1);
        assert!(!entries.contains_key(&key_id));
    }

    #[test]
    fn test_update_without_mapping_fails() {
        let db = Database::open_in_memory().unwrap();
        let result = db.with_connection(|conn| {
            Ok(apply_operations(conn, &[update(1, 1, 1)]).is_err())
        });
        assert!(result.unwrap());
    }
}
