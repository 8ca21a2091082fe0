//! Entry Store Module
//!
//! The key -> entry table shared by the in-memory policies: size accounting,
//! expiry-aware lookup and hit/miss/eviction counters. Ordering state lives
//! in each policy.

use std::collections::HashMap;

use chrono::Utc;

use crate::cache::{CacheEntry, CacheStats};

/// Outcome of a lookup against the table.
#[derive(Debug)]
pub enum Lookup {
    /// Live entry; access bookkeeping already applied
    Hit(CacheEntry),
    /// Entry existed but its TTL had elapsed; it has been removed
    Expired,
    Missing,
}

// == Entry Store ==
/// Entry table with size accounting and statistics.
#[derive(Debug, Default)]
pub struct EntryStore {
    entries: HashMap<String, CacheEntry>,
    /// Sum of resident entry sizes
    current_size: u64,
    stats: CacheStats,
}

impl EntryStore {
    // == Constructor ==
    #[cfg(test)]
    pub fn new() -> Self {
        Self::default()
    }

    // == Lookup ==
    /// Looks a key up, recording exactly one hit or miss.
    ///
    /// Expired entries are removed and reported as misses.
    pub fn lookup(&mut self, key: &str) -> Lookup {
        let now = Utc::now();
        let expired = match self.entries.get(key) {
            Some(entry) => entry.is_expired_at(now),
            None => {
                self.stats.record_miss();
                return Lookup::Missing;
            }
        };

        if expired {
            self.stats.record_miss();
            self.remove(key);
            return Lookup::Expired;
        }

        match self.entries.get_mut(key) {
            Some(entry) => {
                entry.touch();
                self.stats.record_hit();
                Lookup::Hit(entry.clone())
            }
            None => Lookup::Missing,
        }
    }

    /// Records a miss that was decided outside the table (ARC ghost hits).
    pub fn record_miss(&mut self) {
        self.stats.record_miss();
    }

    // == Insert ==
    /// Inserts or replaces an entry, releasing the old entry's size first.
    pub fn insert(&mut self, entry: CacheEntry) -> Option<CacheEntry> {
        self.current_size += entry.size;
        let old = self.entries.insert(entry.key.clone(), entry);
        if let Some(old) = &old {
            self.current_size -= old.size;
        }
        old
    }

    // == Remove ==
    /// Removes an entry without counting it as an eviction.
    pub fn remove(&mut self, key: &str) -> Option<CacheEntry> {
        let entry = self.entries.remove(key)?;
        self.current_size -= entry.size;
        Some(entry)
    }

    // == Evict ==
    /// Removes an entry on behalf of the policy and counts the eviction.
    pub fn evict(&mut self, key: &str) -> Option<CacheEntry> {
        let entry = self.remove(key)?;
        self.stats.record_eviction();
        tracing::debug!(key = %key, size = entry.size, "evicted cache entry");
        Some(entry)
    }

    /// Bytes that must be freed before an entry of `incoming` bytes fits
    /// under `max_size`, given that `key` (if present) is being replaced.
    pub fn overflow_for(&self, key: &str, incoming: u64, max_size: u64) -> u64 {
        let replaced = self.entries.get(key).map_or(0, |e| e.size);
        (self.current_size - replaced + incoming).saturating_sub(max_size)
    }

    /// True if the key is resident and not expired.
    pub fn is_live(&self, key: &str) -> bool {
        self.entries
            .get(key)
            .is_some_and(|entry| !entry.is_expired())
    }

    pub fn entries(&self) -> impl Iterator<Item = &CacheEntry> {
        self.entries.values()
    }

    /// Drops every entry, keeping cumulative counters.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.current_size = 0;
    }

    pub fn current_size(&self) -> u64 {
        self.current_size
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        self.stats.snapshot(self.current_size, self.entries.len())
    }
}
