//! ARC Policy
//!
//! Adaptive Replacement Cache bounded by item count. Resident keys live in
//! T1 (seen once) or T2 (seen at least twice); B1 and B2 remember the
//! identities of keys recently evicted from each. Hits on those ghost lists
//! move the target size `p` of T1 toward whichever side was undersized.
//!
//! A ghost hit on `get` moves the key into T2 before its value is known.
//! Such a key holds a T2 slot with no value until the caller supplies one
//! through `set`; it reads as a miss meanwhile.

use parking_lot::Mutex;
use serde::Serialize;

use super::EvictionPolicy;
use crate::cache::store::{EntryStore, Lookup};
use crate::cache::{CacheEntry, CacheStats, CacheValue, LruTracker, SetOptions};
use crate::error::Result;

/// List sizes and adaptive target of an ARC policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ArcSnapshot {
    pub p: usize,
    pub t1: usize,
    pub t2: usize,
    pub b1: usize,
    pub b2: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Ghost {
    B1,
    B2,
}

#[derive(Debug, Default)]
struct ArcState {
    store: EntryStore,
    t1: LruTracker,
    t2: LruTracker,
    b1: LruTracker,
    b2: LruTracker,
    /// Target size of T1, in `[0, capacity]`
    p: usize,
}

impl ArcState {
    fn resident(&self) -> usize {
        self.t1.len() + self.t2.len()
    }

    fn tracked(&self) -> usize {
        self.resident() + self.b1.len() + self.b2.len()
    }

    /// Demotes one resident key into its ghost list.
    fn replace(&mut self) {
        let from_t1 =
            !self.t1.is_empty() && (self.t1.len() >= self.p.max(1) || self.t2.is_empty());

        if from_t1 {
            if let Some(victim) = self.t1.evict_oldest() {
                self.store.evict(&victim);
                self.b1.touch(&victim);
            }
        } else if let Some(victim) = self.t2.evict_oldest() {
            self.store.evict(&victim);
            self.b2.touch(&victim);
        }
    }

    /// Adapts `p` for a hit on a ghost list and moves the key into T2.
    fn ghost_hit(&mut self, key: &str, ghost: Ghost, capacity: usize) {
        let (b1, b2) = (self.b1.len(), self.b2.len());
        match ghost {
            Ghost::B1 => {
                let delta = (b2 / b1.max(1)).max(1);
                self.p = (self.p + delta).min(capacity);
                self.b1.remove(key);
            }
            Ghost::B2 => {
                let delta = (b1 / b2.max(1)).max(1);
                self.p = self.p.saturating_sub(delta);
                self.b2.remove(key);
            }
        }

        if self.resident() >= capacity {
            self.replace();
        }
        self.t2.touch(key);
        tracing::debug!(key, ?ghost, p = self.p, "arc ghost hit");
    }

    fn ghost_of(&self, key: &str) -> Option<Ghost> {
        if self.b1.contains(key) {
            Some(Ghost::B1)
        } else if self.b2.contains(key) {
            Some(Ghost::B2)
        } else {
            None
        }
    }

    /// Makes room for a key seen for the first time.
    fn admit_new(&mut self, capacity: usize) {
        let l1 = self.t1.len() + self.b1.len();

        if l1 >= capacity {
            if self.t1.len() < capacity {
                self.b1.evict_oldest();
                if self.resident() >= capacity {
                    self.replace();
                }
            } else if let Some(victim) = self.t1.evict_oldest() {
                self.store.evict(&victim);
            }
        } else if self.tracked() >= capacity {
            if self.tracked() >= 2 * capacity {
                self.b2.evict_oldest();
            }
            if self.resident() >= capacity {
                self.replace();
            }
        }
    }
}

/// Item-bounded adaptive replacement cache.
#[derive(Debug)]
pub struct ArcPolicy {
    max_items: usize,
    state: Mutex<ArcState>,
}

impl ArcPolicy {
    pub fn new(max_items: usize) -> Self {
        Self {
            max_items: max_items.max(1),
            state: Mutex::new(ArcState::default()),
        }
    }

    pub fn max_items(&self) -> usize {
        self.max_items
    }

    pub fn snapshot(&self) -> ArcSnapshot {
        let state = self.state.lock();
        ArcSnapshot {
            p: state.p,
            t1: state.t1.len(),
            t2: state.t2.len(),
            b1: state.b1.len(),
            b2: state.b2.len(),
        }
    }
}

impl EvictionPolicy for ArcPolicy {
    fn name(&self) -> &'static str {
        "arc"
    }

    fn get_entry(&self, key: &str) -> Option<CacheEntry> {
        let mut state = self.state.lock();

        if state.t1.contains(key) || state.t2.contains(key) {
            return match state.store.lookup(key) {
                Lookup::Hit(entry) => {
                    state.t1.remove(key);
                    state.t2.touch(key);
                    Some(entry)
                }
                Lookup::Expired => {
                    state.t1.remove(key);
                    state.t2.remove(key);
                    None
                }
                // Pending T2 slot from an earlier ghost hit
                Lookup::Missing => None,
            };
        }

        state.store.record_miss();
        if let Some(ghost) = state.ghost_of(key) {
            state.ghost_hit(key, ghost, self.max_items);
        }
        None
    }

    fn set(&self, key: &str, value: CacheValue, options: SetOptions) -> Result<()> {
        let entry = CacheEntry::new(key, value, options);
        let mut state = self.state.lock();

        if state.t1.contains(key) {
            state.t1.touch(key);
        } else if state.t2.contains(key) {
            state.t2.touch(key);
        } else if let Some(ghost) = state.ghost_of(key) {
            state.ghost_hit(key, ghost, self.max_items);
        } else {
            state.admit_new(self.max_items);
            state.t1.touch(key);
        }

        state.store.insert(entry);
        Ok(())
    }

    fn delete(&self, key: &str) -> bool {
        let mut state = self.state.lock();
        state.t1.remove(key);
        state.t2.remove(key);
        state.b1.remove(key);
        state.b2.remove(key);
        state.store.remove(key).is_some()
    }

    fn clear(&self) {
        let mut state = self.state.lock();
        state.store.clear();
        state.t1.clear();
        state.t2.clear();
        state.b1.clear();
        state.b2.clear();
        state.p = 0;
    }

    fn contains(&self, key: &str) -> bool {
        self.state.lock().store.is_live(key)
    }

    fn stats(&self) -> CacheStats {
        self.state.lock().store.stats()
    }
}
