//! Finalize operations.
//!
//! Two closed sum types describe mapping mutations:
//!
//! - [`FinalizeOperation`]: the expected operations agreed by consensus and
//!   shipped with the block. They carry identifiers only.
//! - [`MappingOperation`]: the actual operations re-derived by this engine.
//!   They carry identifiers plus the content and provenance needed to apply
//!   them to storage.
//!
//! Validation compares the two position by position on [`OperationKind`]
//! and identifiers.

use finalize_common::{KeyId, MappingId, ValueId};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::identifier::{Identifier, ProgramId};
use crate::plaintext::Plaintext;

/// The kind of a finalize operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    InitializeMapping,
    UpdateKeyValue,
    RemoveKeyValue,
    RemoveMapping,
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::InitializeMapping => "InitializeMapping",
            Self::UpdateKeyValue => "UpdateKeyValue",
            Self::RemoveKeyValue => "RemoveKeyValue",
            Self::RemoveMapping => "RemoveMapping",
        };
        f.write_str(name)
    }
}

/// An expected operation, as recorded in a confirmed transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FinalizeOperation {
    InitializeMapping {
        mapping_id: MappingId,
    },
    UpdateKeyValue {
        mapping_id: MappingId,
        key_id: KeyId,
        value_id: ValueId,
    },
    RemoveKeyValue {
        mapping_id: MappingId,
        key_id: KeyId,
    },
    RemoveMapping {
        mapping_id: MappingId,
    },
}

impl FinalizeOperation {
    pub fn kind(&self) -> OperationKind {
        match self {
            Self::InitializeMapping { .. } => OperationKind::InitializeMapping,
            Self::UpdateKeyValue { .. } => OperationKind::UpdateKeyValue,
            Self::RemoveKeyValue { .. } => OperationKind::RemoveKeyValue,
            Self::RemoveMapping { .. } => OperationKind::RemoveMapping,
        }
    }

    pub fn mapping_id(&self) -> &MappingId {
        match self {
            Self::InitializeMapping { mapping_id }
            | Self::UpdateKeyValue { mapping_id, .. }
            | Self::RemoveKeyValue { mapping_id, .. }
            | Self::RemoveMapping { mapping_id } => mapping_id,
        }
    }
}

/// An operation produced by finalize execution or deployment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MappingOperation {
    InitializeMapping {
        mapping_id: MappingId,
        program_id: ProgramId,
        mapping: Identifier,
    },
    UpdateKeyValue {
        mapping_id: MappingId,
        key_id: KeyId,
        value_id: ValueId,
        program_id: ProgramId,
        mapping: Identifier,
        key: Plaintext,
        value: Plaintext,
        height: u32,
        /// `false` only for mutations made outside of a transaction.
        from_transaction: bool,
    },
    RemoveKeyValue {
        mapping_id: MappingId,
        key_id: KeyId,
        program_id: ProgramId,
        mapping: Identifier,
        key: Plaintext,
        height: u32,
        from_transaction: bool,
    },
}

impl MappingOperation {
    pub fn kind(&self) -> OperationKind {
        match self {
            Self::InitializeMapping { .. } => OperationKind::InitializeMapping,
            Self::UpdateKeyValue { .. } => OperationKind::UpdateKeyValue,
            Self::RemoveKeyValue { .. } => OperationKind::RemoveKeyValue,
        }
    }

    pub fn mapping_id(&self) -> &MappingId {
        match self {
            Self::InitializeMapping { mapping_id, .. }
            | Self::UpdateKeyValue { mapping_id, .. }
            | Self::RemoveKeyValue { mapping_id, .. } => mapping_id,
        }
    }

    /// The identifier-only view of this operation.
    pub fn to_expected(&self) -> FinalizeOperation {
        match self {
            Self::InitializeMapping { mapping_id, .. } => FinalizeOperation::InitializeMapping {
                mapping_id: *mapping_id,
            },
            Self::UpdateKeyValue {
                mapping_id,
                key_id,
                value_id,
                ..
            } => FinalizeOperation::UpdateKeyValue {
                mapping_id: *mapping_id,
                key_id: *key_id,
                value_id: *value_id,
            },
            Self::RemoveKeyValue {
                mapping_id, key_id, ..
            } => FinalizeOperation::RemoveKeyValue {
                mapping_id: *mapping_id,
                key_id: *key_id,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use finalize_common::Hash256;

    #[test]
    fn test_expected_json_shape() {
        let op = FinalizeOperation::UpdateKeyValue {
            mapping_id: Hash256::hash(b"m"),
            key_id: Hash256::hash(b"k"),
            value_id: Hash256::hash(b"v"),
        };
        let json = serde_json::to_value(&op).unwrap();
        assert_eq!(json["type"], "update_key_value");
        assert_eq!(json["key_id"], Hash256::hash(b"k").to_hex());
        let back: FinalizeOperation = serde_json::from_value(json).unwrap();
        assert_eq!(back, op);
    }

    #[test]
    fn test_to_expected_keeps_ids() {
        let op = MappingOperation::InitializeMapping {
            mapping_id: Hash256::hash(b"m"),
            program_id: ProgramId::new("token.aleo").unwrap(),
            mapping: Identifier::new("balances").unwrap(),
        };
        assert_eq!(op.kind(), OperationKind::InitializeMapping);
        assert_eq!(
            op.to_expected(),
            FinalizeOperation::InitializeMapping {
                mapping_id: Hash256::hash(b"m")
            }
        );
    }
}
