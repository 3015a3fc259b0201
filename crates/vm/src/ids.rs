//! Deterministic mapping, key and value identifiers.
//!
//! Every id is a domain-separated SHA-256 over canonical bytes, so it is a
//! pure function of its inputs. The same ids appear in the expected
//! operations of a block and are compared byte for byte during validation.

use finalize_common::{Hash256, KeyId, MappingId, ValueId};

use crate::identifier::{Identifier, ProgramId};
use crate::plaintext::Plaintext;

const MAPPING_ID_DOMAIN: &str = "finalize.mapping_id";
const KEY_ID_DOMAIN: &str = "finalize.key_id";
const VALUE_ID_DOMAIN: &str = "finalize.value_id";

/// Id of `program/mapping`.
pub fn mapping_id(program: &ProgramId, mapping: &Identifier) -> MappingId {
    Hash256::hash_domain(
        MAPPING_ID_DOMAIN,
        &[program.as_str().as_bytes(), mapping.as_str().as_bytes()],
    )
}

/// Id of `key` within `program/mapping`.
pub fn key_id(program: &ProgramId, mapping: &Identifier, key: &Plaintext) -> KeyId {
    Hash256::hash_domain(
        KEY_ID_DOMAIN,
        &[
            program.as_str().as_bytes(),
            mapping.as_str().as_bytes(),
            &key.to_bytes(),
        ],
    )
}

/// Id of `value` stored under `key_id`.
pub fn value_id(key_id: &KeyId, value: &Plaintext) -> ValueId {
    Hash256::hash_domain(VALUE_ID_DOMAIN, &[key_id.as_bytes(), &value.to_bytes()])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::literal::Literal;

    fn names() -> (ProgramId, Identifier) {
        (
            ProgramId::new("token.aleo").unwrap(),
            Identifier::new("balances").unwrap(),
        )
    }

    #[test]
    fn test_ids_are_pure() {
        let (program, mapping) = names();
        let key = Plaintext::from(Literal::U64(1));
        assert_eq!(mapping_id(&program, &mapping), mapping_id(&program, &mapping));
        assert_eq!(
            key_id(&program, &mapping, &key),
            key_id(&program, &mapping, &key.clone())
        );
        let k = key_id(&program, &mapping, &key);
        let value = Plaintext::from(Literal::U64(10));
        assert_eq!(value_id(&k, &value), value_id(&k, &value));
    }

    #[test]
    fn test_ids_separate_inputs() {
        let (program, mapping) = names();
        let other = Identifier::new("allowances").unwrap();
        assert_ne!(mapping_id(&program, &mapping), mapping_id(&program, &other));

        let one = Plaintext::from(Literal::U64(1));
        let two = Plaintext::from(Literal::U64(2));
        assert_ne!(
            key_id(&program, &mapping, &one),
            key_id(&program, &mapping, &two)
        );
        assert_ne!(
            key_id(&program, &mapping, &one),
            key_id(&program, &other, &one)
        );

        // A key id and a mapping id never coincide for the same names.
        assert_ne!(
            mapping_id(&program, &mapping),
            key_id(&program, &mapping, &one)
        );

        let k = key_id(&program, &mapping, &one);
        assert_ne!(value_id(&k, &one), value_id(&k, &two));
    }
}
