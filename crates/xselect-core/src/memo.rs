//! Stamp-validated memo table.
//!
//! Each key holds one cached value together with the stamp it was computed
//! under (typically a store version plus whatever identities the computation
//! read). A lookup with a different stamp is a miss and the entry is
//! recomputed in place, so the table never holds more than one value per key.

use std::collections::hash_map::Entry;
use std::hash::Hash;

use ahash::AHashMap;

#[derive(Debug, Clone)]
pub struct VersionedCache<K, V, S = u64> {
    entries: AHashMap<K, (S, V)>,
    hits: u64,
    misses: u64,
}

impl<K, V, S> Default for VersionedCache<K, V, S> {
    fn default() -> Self {
        Self {
            entries: AHashMap::new(),
            hits: 0,
            misses: 0,
        }
    }
}

impl<K: Eq + Hash, V, S: PartialEq> VersionedCache<K, V, S> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The value cached for `key` if it was computed under `stamp`.
    #[must_use]
    pub fn get(&self, key: &K, stamp: &S) -> Option<&V> {
        self.entries
            .get(key)
            .filter(|(s, _)| s == stamp)
            .map(|(_, v)| v)
    }

    /// Return the value for `key` under `stamp`, computing it on a miss.
    pub fn get_or_insert_with(&mut self, key: K, stamp: S, compute: impl FnOnce() -> V) -> &V {
        match self.entries.entry(key) {
            Entry::Occupied(mut slot) => {
                if slot.get().0 == stamp {
                    self.hits += 1;
                } else {
                    self.misses += 1;
                    *slot.get_mut() = (stamp, compute());
                }
                &slot.into_mut().1
            }
            Entry::Vacant(slot) => {
                self.misses += 1;
                &slot.insert((stamp, compute())).1
            }
        }
    }

    /// Drop the entry for `key`.
    pub fn invalidate(&mut self, key: &K) {
        self.entries.remove(key);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// `(hits, misses)` since creation.
    #[must_use]
    pub fn stats(&self) -> (u64, u64) {
        (self.hits, self.misses)
    }
}
