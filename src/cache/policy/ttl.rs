//! TTL Policy
//!
//! Every entry gets an expiry instant (caller TTL or the policy default).
//! Reclamation drops expired entries first, then the oldest by creation.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use super::{warn_if_over_budget, EvictionPolicy};
use crate::cache::store::{EntryStore, Lookup};
use crate::cache::{CacheEntry, CacheStats, CacheValue, SetOptions};
use crate::error::Result;

#[derive(Debug, Default)]
struct TtlState {
    store: EntryStore,
    expiry: HashMap<String, DateTime<Utc>>,
}

impl TtlState {
    fn forget(&mut self, key: &str) -> Option<CacheEntry> {
        self.expiry.remove(key);
        self.store.evict(key)
    }

    fn reclaim(&mut self, needed: u64) {
        let now = Utc::now();
        let mut freed = 0;

        let expired: Vec<String> = self
            .expiry
            .iter()
            .filter(|(_, expires)| **expires < now)
            .map(|(key, _)| key.clone())
            .collect();
        for key in expired {
            if let Some(entry) = self.forget(&key) {
                freed += entry.size;
            }
        }

        if freed >= needed {
            return;
        }

        let mut by_age: Vec<(DateTime<Utc>, String)> = self
            .store
            .entries()
            .map(|entry| (entry.created_at, entry.key.clone()))
            .collect();
        by_age.sort();

        for (_, key) in by_age {
            if freed >= needed {
                break;
            }
            if let Some(entry) = self.forget(&key) {
                freed += entry.size;
            }
        }
    }
}

/// Byte-bounded cache where every entry expires.
#[derive(Debug)]
pub struct TtlPolicy {
    max_size: u64,
    default_ttl: Duration,
    state: Mutex<TtlState>,
}

impl TtlPolicy {
    pub fn new(max_size: u64, default_ttl: Duration) -> Self {
        Self {
            max_size,
            default_ttl,
            state: Mutex::new(TtlState::default()),
        }
    }

    /// Expiry instant recorded for a key.
    pub fn expires_at(&self, key: &str) -> Option<DateTime<Utc>> {
        self.state.lock().expiry.get(key).copied()
    }
}

impl EvictionPolicy for TtlPolicy {
    fn name(&self) -> &'static str {
        "ttl"
    }

    fn get_entry(&self, key: &str) -> Option<CacheEntry> {
        let mut state = self.state.lock();
        match state.store.lookup(key) {
            Lookup::Hit(entry) => Some(entry),
            Lookup::Expired => {
                state.expiry.remove(key);
                None
            }
            Lookup::Missing => None,
        }
    }

    fn set(&self, key: &str, value: CacheValue, mut options: SetOptions) -> Result<()> {
        options.ttl = Some(options.ttl.unwrap_or(self.default_ttl));
        let entry = CacheEntry::new(key, value, options);
        let expires_at = entry.expires_at().unwrap_or(DateTime::<Utc>::MAX_UTC);
        let mut state = self.state.lock();

        state.store.remove(key);
        state.expiry.remove(key);
        let needed = state.store.overflow_for(key, entry.size, self.max_size);
        if needed > 0 {
            state.reclaim(needed);
        }

        state.store.insert(entry);
        state.expiry.insert(key.to_string(), expires_at);
        warn_if_over_budget(self.name(), key, state.store.current_size(), self.max_size);
        Ok(())
    }

    fn delete(&self, key: &str) -> bool {
        let mut state = self.state.lock();
        state.expiry.remove(key);
        state.store.remove(key).is_some()
    }

    fn clear(&self) {
        let mut state = self.state.lock();
        state.store.clear();
        state.expiry.clear();
    }

    fn contains(&self, key: &str) -> bool {
        self.state.lock().store.is_live(key)
    }

    fn stats(&self) -> CacheStats {
        self.state.lock().store.stats()
    }
}
