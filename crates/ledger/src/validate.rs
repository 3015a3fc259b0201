//! Validation of re-derived operations against consensus.

use finalize_common::{KeyId, MappingId, ValueId};
use finalize_vm::{FinalizeOperation, MappingOperation, OperationKind};
use thiserror::Error;

/// The first divergence between expected and actual operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("expected {expected} operations, derived {actual}")]
    Length { expected: usize, actual: usize },

    #[error("operation #{index}: expected {expected}, derived {actual}")]
    Kind {
        index: usize,
        expected: OperationKind,
        actual: OperationKind,
    },

    #[error("operation #{index}: expected mapping {expected}, derived {actual}")]
    Mapping {
        index: usize,
        expected: MappingId,
        actual: MappingId,
    },

    #[error("operation #{index}: expected key {expected}, derived {actual}")]
    Key {
        index: usize,
        expected: KeyId,
        actual: KeyId,
    },

    #[error("operation #{index}: expected value {expected}, derived {actual}")]
    Value {
        index: usize,
        expected: ValueId,
        actual: ValueId,
    },

    /// An operation kind this engine never applies.
    #[error("operation #{index}: unsupported operation {kind}")]
    Unsupported { index: usize, kind: OperationKind },
}

/// Checks that `actual` reproduces `expected` exactly.
///
/// Lengths must match. Then, position by position, the kinds and mapping
/// ids must match, plus the key and value ids of updates and the key id of
/// removals.
pub fn validate_operations(
    expected: &[FinalizeOperation],
    actual: &[MappingOperation],
) -> Result<(), ValidationError> {
    if expected.len() != actual.len() {
        return Err(ValidationError::Length {
            expected: expected.len(),
            actual: actual.len(),
        });
    }

    for (index, (expected, actual)) in expected.iter().zip(actual).enumerate() {
        if let FinalizeOperation::RemoveMapping { .. } = expected {
            return Err(ValidationError::Unsupported {
                index,
                kind: expected.kind(),
            });
        }
        if expected.kind() != actual.kind() {
            return Err(ValidationError::Kind {
                index,
                expected: expected.kind(),
                actual: actual.kind(),
            });
        }
        if expected.mapping_id() != actual.mapping_id() {
            return Err(ValidationError::Mapping {
                index,
                expected: *expected.mapping_id(),
                actual: *actual.mapping_id(),
            });
        }
        match (expected, actual) {
            (FinalizeOperation::InitializeMapping { .. }, _) => {}
            (
                FinalizeOperation::UpdateKeyValue {
                    key_id, value_id, ..
                },
                MappingOperation::UpdateKeyValue {
                    key_id: actual_key,
                    value_id: actual_value,
                    ..
                },
            ) => {
                if key_id != actual_key {
                    return Err(ValidationError::Key {
                        index,
                        expected: *key_id,
                        actual: *actual_key,
                    });
                }
                if value_id != actual_value {
                    return Err(ValidationError::Value {
                        index,
                        expected: *value_id,
                        actual: *actual_value,
                    });
                }
            }
            (
                FinalizeOperation::RemoveKeyValue { key_id, .. },
                MappingOperation::RemoveKeyValue {
                    key_id: actual_key, ..
                },
            ) => {
                if key_id != actual_key {
                    return Err(ValidationError::Key {
                        index,
                        expected: *key_id,
                        actual: *actual_key,
                    });
                }
            }
            // Kinds already match.
            _ => {}
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use finalize_common::Hash256;
    use finalize_vm::{Identifier, Literal, ProgramId};

    fn actual_update(value: u64) -> MappingOperation {
        let key = Literal::U64(1).into();
        let value = Literal::U64(value).into();
        MappingOperation::UpdateKeyValue {
            mapping_id: Hash256::hash(b"m"),
            key_id: Hash256::hash(b"k"),
            value_id: finalize_vm::ids::value_id(&Hash256::hash(b"k"), &value),
            program_id: ProgramId::new("token.aleo").unwrap(),
            mapping: Identifier::new("balances").unwrap(),
            key,
            value,
            height: 1,
            from_transaction: true,
        }
    }

    #[test]
    fn test_matching_operations_pass() {
        let actual = vec![actual_update(5)];
        let expected: Vec<_> = actual.iter().map(MappingOperation::to_expected).collect();
        assert_eq!(validate_operations(&expected, &actual), Ok(()));
        assert_eq!(validate_operations(&[], &[]), Ok(()));
    }

    #[test]
    fn test_length_mismatch() {
        let err = validate_operations(&[], &[actual_update(5)]).unwrap_err();
        assert_eq!(
            err,
            ValidationError::Length {
                expected: 0,
                actual: 1
            }
        );
    }

    #[test]
    fn test_value_mismatch() {
        let expected = vec![actual_update(5).to_expected()];
        let err = validate_operations(&expected, &[actual_update(6)]).unwrap_err();
        assert!(matches!(err, ValidationError::Value { index: 0, .. }));
    }

    #[test]
    fn test_kind_and_mapping_mismatch() {
        let expected = vec![FinalizeOperation::InitializeMapping {
            mapping_id: Hash256::hash(b"m"),
        }];
        let err = validate_operations(&expected, &[actual_update(5)]).unwrap_err();
        assert!(matches!(err, ValidationError::Kind { index: 0, .. }));

        let expected = vec![FinalizeOperation::UpdateKeyValue {
            mapping_id: Hash256::hash(b"other"),
            key_id: Hash256::hash(b"k"),
            value_id: Hash256::hash(b"v"),
        }];
        let err = validate_operations(&expected, &[actual_update(5)]).unwrap_err();
        assert!(matches!(err, ValidationError::Mapping { .. }));
    }

    #[test]
    fn test_removal_key_mismatch() {
        let removal = |key: &[u8]| MappingOperation::RemoveKeyValue {
            mapping_id: Hash256::hash(b"m"),
            key_id: Hash256::hash(key),
            program_id: ProgramId::new("token.aleo").unwrap(),
            mapping: Identifier::new("balances").unwrap(),
            key: Literal::U64(1).into(),
            height: 1,
            from_transaction: true,
        };
        let expected = vec![actual_update(5).to_expected(), removal(b"k").to_expected()];
        let actual = vec![actual_update(5), removal(b"other")];
        let err = validate_operations(&expected, &actual).unwrap_err();
        assert_eq!(
            err,
            ValidationError::Key {
                index: 1,
                expected: Hash256::hash(b"k"),
                actual: Hash256::hash(b"other"),
            }
        );
        assert_eq!(validate_operations(&expected[1..], &[removal(b"k")]), Ok(()));
    }

    #[test]
    fn test_expected_mapping_removal_is_unsupported() {
        let expected = vec![FinalizeOperation::RemoveMapping {
            mapping_id: Hash256::hash(b"m"),
        }];
        let err = validate_operations(&expected, &[actual_update(5)]).unwrap_err();
        assert_eq!(
            err,
            ValidationError::Unsupported {
                index: 0,
                kind: OperationKind::RemoveMapping,
            }
        );
    }
}
