//! Sharded dispatch table
//!
//! Maps identity keys to in-flight entries. Every operation is atomic per
//! key: callers never see a half-applied insert or a double removal.
//!
//! # Design
//!
//! - Keys are spread across `shard_count` independently locked maps
//! - Shard is `xxh3_64(key) % shard_count`, so a key always lands in the same shard
//! - Duplicate callbacks run under the shard lock and must not touch the table
//! - Whole-table iteration (`drain`) is for shutdown only

use std::collections::HashMap;
use std::collections::hash_map::Entry;

use herald_protocol::IdentityKey;
use parking_lot::Mutex;
use xxhash_rust::xxh3::xxh3_64;

/// Result of `put_if_absent`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PutOutcome {
    /// The value was stored under the key
    Inserted,
    /// The key was already present; the existing value is untouched
    Duplicate,
}

/// Concurrent map from identity key to in-flight entry
pub struct DispatchTable<V> {
    shards: Vec<Mutex<HashMap<IdentityKey, V>>>,
}

impl<V> DispatchTable<V> {
    /// Create a table with `shard_count` shards (0 is treated as 1)
    pub fn new(shard_count: usize) -> Self {
        let shard_count = shard_count.max(1);
        let shards = (0..shard_count).map(|_| Mutex::new(HashMap::new())).collect();
        Self { shards }
    }

    /// Number of shards
    #[inline]
    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }

    /// Shard index for a key
    #[inline]
    pub fn shard_index(&self, key: &IdentityKey) -> usize {
        (xxh3_64(key.as_str().as_bytes()) % self.shards.len() as u64) as usize
    }

    #[inline]
    fn shard(&self, key: &IdentityKey) -> &Mutex<HashMap<IdentityKey, V>> {
        &self.shards[self.shard_index(key)]
    }

    /// Insert `value` unless the key is present
    ///
    /// On a duplicate, `on_duplicate(key, existing, rejected)` runs
    /// synchronously while the shard is locked, and receives ownership of the
    /// rejected value. It must not call back into this table.
    pub fn put_if_absent<F>(&self, key: IdentityKey, value: V, on_duplicate: F) -> PutOutcome
    where
        F: FnOnce(&IdentityKey, &V, V),
    {
        let mut shard = self.shard(&key).lock();
        match shard.entry(key) {
            Entry::Vacant(slot) => {
                slot.insert(value);
                PutOutcome::Inserted
            }
            Entry::Occupied(slot) => {
                on_duplicate(slot.key(), slot.get(), value);
                PutOutcome::Duplicate
            }
        }
    }

    /// Run `f` against the entry for `key`, if present
    pub fn get<T>(&self, key: &IdentityKey, f: impl FnOnce(&V) -> T) -> Option<T> {
        self.shard(key).lock().get(key).map(f)
    }

    /// Check if a key is present
    pub fn contains(&self, key: &IdentityKey) -> bool {
        self.shard(key).lock().contains_key(key)
    }

    /// Remove and return the entry for `key`
    ///
    /// Of several concurrent removers of the same key, exactly one gets the value.
    pub fn remove(&self, key: &IdentityKey) -> Option<V> {
        self.shard(key).lock().remove(key)
    }

    /// Number of entries across all shards
    ///
    /// Shards are locked one at a time, so the result is approximate while
    /// writers are active.
    pub fn len(&self) -> usize {
        self.shards.iter().map(|s| s.lock().len()).sum()
    }

    /// Check if the table has no entries
    pub fn is_empty(&self) -> bool {
        self.shards.iter().all(|s| s.lock().is_empty())
    }

    /// Remove and return every entry
    ///
    /// Shutdown only: entries inserted concurrently may or may not be included.
    pub fn drain(&self) -> Vec<(IdentityKey, V)> {
        let mut drained = Vec::new();
        for shard in &self.shards {
            drained.extend(shard.lock().drain());
        }
        drained
    }
}

#[cfg(test)]
#[path = "table_test.rs"]
mod table_test;
