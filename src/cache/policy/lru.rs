//! LRU Policy
//!
//! Evicts from the least recently used end until the incoming entry fits.

use parking_lot::Mutex;

use super::{warn_if_over_budget, EvictionPolicy};
use crate::cache::store::{EntryStore, Lookup};
use crate::cache::{CacheEntry, CacheStats, CacheValue, LruTracker, SetOptions};
use crate::error::Result;

#[derive(Debug, Default)]
struct LruState {
    store: EntryStore,
    order: LruTracker,
}

impl LruState {
    fn reclaim(&mut self, needed: u64) {
        let mut freed = 0;
        while freed < needed {
            let Some(victim) = self.order.evict_oldest() else {
                break;
            };
            if let Some(entry) = self.store.evict(&victim) {
                freed += entry.size;
            }
        }
    }
}

/// Byte-bounded least-recently-used cache.
#[derive(Debug)]
pub struct LruPolicy {
    max_size: u64,
    state: Mutex<LruState>,
}

impl LruPolicy {
    pub fn new(max_size: u64) -> Self {
        Self {
            max_size,
            state: Mutex::new(LruState::default()),
        }
    }
}

impl EvictionPolicy for LruPolicy {
    fn name(&self) -> &'static str {
        "lru"
    }

    fn get_entry(&self, key: &str) -> Option<CacheEntry> {
        let mut state = self.state.lock();
        match state.store.lookup(key) {
            Lookup::Hit(entry) => {
                state.order.touch(key);
                Some(entry)
            }
            Lookup::Expired => {
                state.order.remove(key);
                None
            }
            Lookup::Missing => None,
        }
    }

    fn set(&self, key: &str, value: CacheValue, options: SetOptions) -> Result<()> {
        let entry = CacheEntry::new(key, value, options);
        let mut state = self.state.lock();

        if state.store.remove(key).is_some() {
            state.order.remove(key);
        }

        let needed = state.store.overflow_for(key, entry.size, self.max_size);
        if needed > 0 {
            state.reclaim(needed);
        }

        state.store.insert(entry);
        state.order.touch(key);
        warn_if_over_budget(self.name(), key, state.store.current_size(), self.max_size);
        Ok(())
    }

    fn delete(&self, key: &str) -> bool {
        let mut state = self.state.lock();
        state.order.remove(key);
        state.store.remove(key).is_some()
    }

    fn clear(&self) {
        let mut state = self.state.lock();
        state.store.clear();
        state.order.clear();
    }

    fn contains(&self, key: &str) -> bool {
        self.state.lock().store.is_live(key)
    }

    fn stats(&self) -> CacheStats {
        self.state.lock().store.stats()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    // Every value below is a 4-byte string, so a 12-byte budget holds three.
    fn four(tag: &str) -> CacheValue {
        json!(format!("{:_<4}", tag))
    }

    #[test]
    fn test_lru_set_and_get() {
        let lru = LruPolicy::new(100);
        lru.set("key1", json!("value1"), SetOptions::default()).unwrap();

        assert_eq!(lru.get("key1"), Some(json!("value1")));
        assert_eq!(lru.stats().current_size, 6);
    }

    #[test]
    fn test_lru_touch_on_get_protects_entry() {
        let lru = LruPolicy::new(12);
        lru.set("a", four("a"), SetOptions::default()).unwrap();
        lru.set("b", four("b"), SetOptions::default()).unwrap();
        lru.set("c", four("c"), SetOptions::default()).unwrap();

        assert!(lru.get("a").is_some());
        lru.set("d", four("d"), SetOptions::default()).unwrap();

        assert!(lru.get("b").is_none());
        assert!(lru.get("a").is_some());
        assert!(lru.get("c").is_some());
        assert!(lru.get("d").is_some());
        assert_eq!(lru.stats().evictions, 1);
    }

    #[test]
    fn test_lru_evicts_until_enough_space() {
        let lru = LruPolicy::new(12);
        lru.set("a", four("a"), SetOptions::default()).unwrap();
        lru.set("b", four("b"), SetOptions::default()).unwrap();
        lru.set("c", four("c"), SetOptions::default()).unwrap();

        // 8 bytes incoming: the two oldest have to go
        lru.set("big", json!("12345678"), SetOptions::default()).unwrap();

        let stats = lru.stats();
        assert_eq!(stats.evictions, 2);
        assert_eq!(stats.current_size, 12);
        assert!(!lru.contains("a"));
        assert!(!lru.contains("b"));
        assert!(lru.contains("c"));
    }

    #[test]
    fn test_lru_overwrite_replaces_size_accounting() {
        let lru = LruPolicy::new(12);
        lru.set("a", four("a"), SetOptions::default()).unwrap();
        lru.set("b", four("b"), SetOptions::default()).unwrap();
        lru.set("c", four("c"), SetOptions::default()).unwrap();
        lru.set("a", four("x"), SetOptions::default()).unwrap();

        let stats = lru.stats();
        assert_eq!(stats.evictions, 0);
        assert_eq!(stats.item_count, 3);
        assert_eq!(lru.get("a"), Some(four("x")));
    }

    #[test]
    fn test_lru_oversized_entry_is_admitted() {
        let lru = LruPolicy::new(8);
        lru.set("a", four("a"), SetOptions::default()).unwrap();
        lru.set("huge", json!("0123456789abcdef"), SetOptions::default()).unwrap();

        let stats = lru.stats();
        assert_eq!(stats.item_count, 1);
        assert_eq!(stats.current_size, 16);
        assert!(lru.contains("huge"));
    }

    #[test]
    fn test_lru_clear_preserves_counters() {
        let lru = LruPolicy::new(100);
        lru.set("a", four("a"), SetOptions::default()).unwrap();
        let _ = lru.get("a");
        let _ = lru.get("zzz");
        lru.clear();

        let stats = lru.stats();
        assert_eq!(stats.item_count, 0);
        assert_eq!(stats.current_size, 0);
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert!(lru.get("a").is_none());
    }
}
