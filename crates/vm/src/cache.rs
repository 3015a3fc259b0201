//! In-memory mapping contents.
//!
//! A [`MappingCache`] maps a mapping id to its key-value contents. The
//! process-wide instance mirrors committed storage and persists across
//! blocks; short-lived instances serve as overlays for work whose writes
//! must stay invisible to the committed view (rejected executions, fee
//! dry-runs, previews).
//!
//! [`FinalizeCaches`] pairs the shared cache with an optional overlay and
//! decides where reads come from and where writes go.

use finalize_common::{KeyId, MappingId};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

use crate::plaintext::Plaintext;

/// A stored key and its value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MappingEntry {
    pub key: Plaintext,
    pub value: Plaintext,
}

/// The contents of one mapping, ordered by key id.
pub type MappingEntries = BTreeMap<KeyId, MappingEntry>;

/// Mapping id to mapping contents.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MappingCache {
    mappings: HashMap<MappingId, MappingEntries>,
}

impl MappingCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Contents of a mapping, if loaded.
    pub fn get(&self, mapping_id: &MappingId) -> Option<&MappingEntries> {
        self.mappings.get(mapping_id)
    }

    pub fn contains_mapping(&self, mapping_id: &MappingId) -> bool {
        self.mappings.contains_key(mapping_id)
    }

    /// Install a mapping's full contents, replacing any previous view.
    pub fn insert_mapping(&mut self, mapping_id: MappingId, entries: MappingEntries) {
        self.mappings.insert(mapping_id, entries);
    }

    /// Register a newly created mapping. Existing contents are kept.
    pub fn initialize_mapping(&mut self, mapping_id: MappingId) {
        self.mappings.entry(mapping_id).or_default();
    }

    /// Insert or replace one key, creating the mapping's entry if needed.
    pub fn upsert(&mut self, mapping_id: MappingId, key_id: KeyId, entry: MappingEntry) {
        self.mappings
            .entry(mapping_id)
            .or_default()
            .insert(key_id, entry);
    }

    /// Remove one key. Returns the previous entry, if any.
    pub fn remove(&mut self, mapping_id: &MappingId, key_id: &KeyId) -> Option<MappingEntry> {
        self.mappings
            .get_mut(mapping_id)
            .and_then(|entries| entries.remove(key_id))
    }

    /// Drop every loaded mapping, forcing a cold reload on next access.
    pub fn clear(&mut self) {
        self.mappings.clear();
    }

    /// Number of loaded mappings.
    pub fn len(&self) -> usize {
        self.mappings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mappings.is_empty()
    }
}

/// The caches visible to one finalize execution.
///
/// Reads consult the overlay first, then the shared cache. Writes with
/// state change allowed reach the shared cache and, when present, the
/// overlay. Writes without it reach the overlay only.
#[derive(Debug)]
pub struct FinalizeCaches<'a> {
    shared: &'a mut MappingCache,
    local: Option<&'a mut MappingCache>,
}

impl<'a> FinalizeCaches<'a> {
    /// Execute directly against the shared cache.
    pub fn shared(shared: &'a mut MappingCache) -> Self {
        Self {
            shared,
            local: None,
        }
    }

    /// Execute with a transaction-local overlay.
    pub fn with_local(shared: &'a mut MappingCache, local: &'a mut MappingCache) -> Self {
        Self {
            shared,
            local: Some(local),
        }
    }

    pub fn has_local(&self) -> bool {
        self.local.is_some()
    }

    /// Whether the mapping is known to either cache.
    pub fn contains_mapping(&self, mapping_id: &MappingId) -> bool {
        self.local
            .as_deref()
            .is_some_and(|local| local.contains_mapping(mapping_id))
            || self.shared.contains_mapping(mapping_id)
    }

    /// Look up one key.
    pub fn get(&self, mapping_id: &MappingId, key_id: &KeyId) -> Option<&MappingEntry> {
        self.local
            .as_deref()
            .and_then(|local| local.get(mapping_id))
            .and_then(|entries| entries.get(key_id))
            .or_else(|| {
                self.shared
                    .get(mapping_id)
                    .and_then(|entries| entries.get(key_id))
            })
    }

    /// Record a write.
    pub fn write(
        &mut self,
        mapping_id: MappingId,
        key_id: KeyId,
        entry: MappingEntry,
        allow_state_change: bool,
    ) {
        if allow_state_change {
            if let Some(local) = self.local.as_deref_mut() {
                local.upsert(mapping_id, key_id, entry.clone());
            }
            self.shared.upsert(mapping_id, key_id, entry);
        } else if let Some(local) = self.local.as_deref_mut() {
            local.upsert(mapping_id, key_id, entry);
        }
    }

    /// Shorter-lived view over the same caches.
    pub fn reborrow(&mut self) -> FinalizeCaches<'_> {
        FinalizeCaches {
            shared: &mut *self.shared,
            local: self.local.as_deref_mut(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::literal::Literal;
    use finalize_common::Hash256;

    fn entry(key: u64, value: u64) -> MappingEntry {
        MappingEntry {
            key: Literal::U64(key).into(),
            value: Literal::U64(value).into(),
        }
    }

    #[test]
    fn test_cache_basic_operations() {
        let mapping = Hash256::hash(b"mapping");
        let key = Hash256::hash(b"key");
        let mut cache = MappingCache::new();
        assert!(cache.is_empty());

        cache.initialize_mapping(mapping);
        assert!(cache.contains_mapping(&mapping));
        assert!(cache.get(&mapping).unwrap().is_empty());

        cache.upsert(mapping, key, entry(1, 10));
        cache.initialize_mapping(mapping);
        assert_eq!(cache.get(&mapping).unwrap().len(), 1);

        assert_eq!(cache.remove(&mapping, &key), Some(entry(1, 10)));
        assert_eq!(cache.remove(&mapping, &key), None);

        cache.clear();
        assert_eq!(cache.len(), 0);
        assert!(!cache.contains_mapping(&mapping));
    }

    #[test]
    fn test_overlay_reads_prefer_local() {
        let mapping = Hash256::hash(b"mapping");
        let key = Hash256::hash(b"key");
        let mut shared = MappingCache::new();
        shared.upsert(mapping, key, entry(1, 10));
        let mut local = MappingCache::new();
        local.upsert(mapping, key, entry(1, 20));

        let caches = FinalizeCaches::with_local(&mut shared, &mut local);
        assert_eq!(caches.get(&mapping, &key), Some(&entry(1, 20)));

        let other = Hash256::hash(b"other");
        assert_eq!(caches.get(&mapping, &other), None);
    }

    #[test]
    fn test_suppressed_writes_stay_local() {
        let mapping = Hash256::hash(b"mapping");
        let key = Hash256::hash(b"key");
        let mut shared = MappingCache::new();
        shared.initialize_mapping(mapping);
        let mut local = MappingCache::new();

        {
            let mut caches = FinalizeCaches::with_local(&mut shared, &mut local);
            caches.write(mapping, key, entry(1, 5), false);
            assert_eq!(caches.get(&mapping, &key), Some(&entry(1, 5)));
        }
        assert!(shared.get(&mapping).unwrap().is_empty());
        assert_eq!(local.get(&mapping).unwrap().len(), 1);
    }

    #[test]
    fn test_allowed_writes_reach_both() {
        let mapping = Hash256::hash(b"mapping");
        let key = Hash256::hash(b"key");
        let mut shared = MappingCache::new();
        let mut local = MappingCache::new();
        {
            let mut caches = FinalizeCaches::with_local(&mut shared, &mut local);
            caches.reborrow().write(mapping, key, entry(1, 5), true);
        }
        assert_eq!(shared.get(&mapping).unwrap().get(&key), Some(&entry(1, 5)));
        assert_eq!(local.get(&mapping).unwrap().get(&key), Some(&entry(1, 5)));

        let mut caches = FinalizeCaches::shared(&mut shared);
        assert!(!caches.has_local());
        caches.write(mapping, key, entry(1, 6), true);
        assert_eq!(caches.get(&mapping, &key), Some(&entry(1, 6)));
    }
}
