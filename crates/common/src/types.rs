//! Common types for the finalize engine.
//!
//! This module provides [`Hash256`], the content identifier used for
//! mappings, keys, values and transitions. Every identifier is a SHA-256
//! digest, so identical serialized content always yields identical bytes.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;

/// A 32-byte SHA-256 hash.
///
/// # Examples
///
/// ```rust
/// use finalize_common::Hash256;
///
/// let hash = Hash256::hash(b"hello world");
/// assert!(!hash.is_zero());
///
/// let parsed = Hash256::from_hex(&hash.to_hex()).unwrap();
/// assert_eq!(hash, parsed);
/// ```
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
pub struct Hash256(pub [u8; 32]);

/// Identifier of a mapping: a function of (program id, mapping name).
pub type MappingId = Hash256;

/// Identifier of a mapping key: a function of (program id, mapping name, key).
pub type KeyId = Hash256;

/// Identifier of a mapping value: a function of (key id, value).
pub type ValueId = Hash256;

/// Identifier of a transition, assigned after proof generation.
pub type TransitionId = Hash256;

impl Hash256 {
    /// The zero hash (all bytes are 0x00).
    ///
    /// Used as the placeholder transition id of preview runs.
    pub const ZERO: Self = Self([0u8; 32]);

    /// Compute the SHA-256 hash of arbitrary data.
    pub fn hash(data: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(data);
        Self(hasher.finalize().into())
    }

    /// Compute a domain-separated hash over several byte strings.
    ///
    /// The domain and every part are length-prefixed (u32 little endian), so
    /// `["ab", "c"]` and `["a", "bc"]` never collide.
    pub fn hash_domain(domain: &str, parts: &[&[u8]]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update((domain.len() as u32).to_le_bytes());
        hasher.update(domain.as_bytes());
        for part in parts {
            hasher.update((part.len() as u32).to_le_bytes());
            hasher.update(part);
        }
        Self(hasher.finalize().into())
    }

    /// Returns a reference to the underlying 32-byte array.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Creates a `Hash256` from a 32-byte array.
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Creates a `Hash256` from a hexadecimal string.
    ///
    /// The string must be exactly 64 hex characters (representing 32 bytes).
    pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
        let bytes = hex::decode(s)?;
        if bytes.len() != 32 {
            return Err(hex::FromHexError::InvalidStringLength);
        }
        let mut arr = [0u8; 32];
        arr.copy_from_slice(&bytes);
        Ok(Self(arr))
    }

    /// Converts the hash to a lowercase hexadecimal string.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Returns `true` if this is the zero hash.
    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 32]
    }
}

impl fmt::Debug for Hash256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash256({})", self.to_hex())
    }
}

impl fmt::Display for Hash256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl FromStr for Hash256 {
    type Err = hex::FromHexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl From<[u8; 32]> for Hash256 {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

impl AsRef<[u8]> for Hash256 {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl Serialize for Hash256 {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Hash256 {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}
