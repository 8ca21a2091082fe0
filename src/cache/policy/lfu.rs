//! LFU Policy
//!
//! Evicts the least frequently read entries; ties go to the older entry.

use std::collections::HashMap;

use parking_lot::Mutex;

use super::{warn_if_over_budget, EvictionPolicy};
use crate::cache::store::{EntryStore, Lookup};
use crate::cache::{CacheEntry, CacheStats, CacheValue, SetOptions};
use crate::error::Result;

#[derive(Debug, Default)]
struct LfuState {
    store: EntryStore,
    /// Reads per key since insertion
    frequency: HashMap<String, u64>,
}

impl LfuState {
    fn reclaim(&mut self, needed: u64) {
        let mut candidates: Vec<(u64, chrono::DateTime<chrono::Utc>, String)> = self
            .store
            .entries()
            .map(|entry| {
                let freq = self.frequency.get(&entry.key).copied().unwrap_or(0);
                (freq, entry.created_at, entry.key.clone())
            })
            .collect();
        candidates.sort();

        let mut freed = 0;
        for (_, _, key) in candidates {
            if freed >= needed {
                break;
            }
            if let Some(entry) = self.store.evict(&key) {
                freed += entry.size;
            }
            self.frequency.remove(&key);
        }
    }
}

/// Byte-bounded least-frequently-used cache.
#[derive(Debug)]
pub struct LfuPolicy {
    max_size: u64,
    state: Mutex<LfuState>,
}

impl LfuPolicy {
    pub fn new(max_size: u64) -> Self {
        Self {
            max_size,
            state: Mutex::new(LfuState::default()),
        }
    }

    /// Current read frequency of a key, if resident.
    pub fn frequency(&self, key: &str) -> Option<u64> {
        self.state.lock().frequency.get(key).copied()
    }
}

impl EvictionPolicy for LfuPolicy {
    fn name(&self) -> &'static str {
        "lfu"
    }

    fn get_entry(&self, key: &str) -> Option<CacheEntry> {
        let mut state = self.state.lock();
        match state.store.lookup(key) {
            Lookup::Hit(entry) => {
                *state.frequency.entry(key.to_string()).or_insert(0) += 1;
                Some(entry)
            }
            Lookup::Expired => {
                state.frequency.remove(key);
                None
            }
            Lookup::Missing => None,
        }
    }

    fn set(&self, key: &str, value: CacheValue, options: SetOptions) -> Result<()> {
        let entry = CacheEntry::new(key, value, options);
        let mut state = self.state.lock();

        state.store.remove(key);
        let needed = state.store.overflow_for(key, entry.size, self.max_size);
        if needed > 0 {
            state.reclaim(needed);
        }

        state.store.insert(entry);
        state.frequency.insert(key.to_string(), 0);
        warn_if_over_budget(self.name(), key, state.store.current_size(), self.max_size);
        Ok(())
    }

    fn delete(&self, key: &str) -> bool {
        let mut state = self.state.lock();
        state.frequency.remove(key);
        state.store.remove(key).is_some()
    }

    fn clear(&self) {
        let mut state = self.state.lock();
        state.store.clear();
        state.frequency.clear();
    }

    fn contains(&self, key: &str) -> bool {
        self.state.lock().store.is_live(key)
    }

    fn stats(&self) -> CacheStats {
        self.state.lock().store.stats()
    }
}
