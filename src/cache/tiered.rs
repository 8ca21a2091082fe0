//! Tiered Cache Module
//!
//! Composes a fast memory tier, the persistent disk tier and an optional
//! third tier. Reads probe the tiers fastest first and promote hits into
//! every faster tier; writes fan out to all tiers or target one.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::cache::{
    CacheEntry, CacheStats, CacheValue, EvictionPolicy, MemoryPolicy, PersistentTier, SetOptions,
};
use crate::config::Config;
use crate::error::{CacheError, Result};

// == Tier ==
/// Storage layer, ordered fastest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Memory,
    Disk,
    Distributed,
}

impl Tier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Memory => "memory",
            Tier::Disk => "disk",
            Tier::Distributed => "distributed",
        }
    }
}

impl FromStr for Tier {
    type Err = CacheError;

    fn from_str(raw: &str) -> Result<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(Tier::Memory),
            "disk" => Ok(Tier::Disk),
            "distributed" => Ok(Tier::Distributed),
            other => Err(CacheError::InvalidRequest(format!("unknown tier '{}'", other))),
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// == Stats ==
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TierStats {
    pub tier: Tier,
    pub policy: &'static str,
    pub stats: CacheStats,
}

/// Aggregate view over every configured tier.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TieredStats {
    pub tiers: Vec<TierStats>,
    /// Lookups answered by each tier
    pub hits_by_tier: BTreeMap<Tier, u64>,
    /// Lookups no tier could answer
    pub misses: u64,
    pub overall_hit_rate: f64,
}

struct TierSlot {
    tier: Tier,
    policy: Box<dyn EvictionPolicy>,
    hits: AtomicU64,
}

// == Tiered Cache ==
pub struct TieredCache {
    /// Sorted fastest first
    slots: Vec<TierSlot>,
    disk: Option<PersistentTier>,
    misses: AtomicU64,
}

impl TieredCache {
    // == Constructors ==
    pub fn new(memory: Box<dyn EvictionPolicy>) -> Self {
        Self {
            slots: Vec::new(),
            disk: None,
            misses: AtomicU64::new(0),
        }
        .with_tier(Tier::Memory, memory)
    }

    pub fn with_disk(mut self, disk: PersistentTier) -> Self {
        self.disk = Some(disk.clone());
        self.with_tier(Tier::Disk, Box::new(disk))
    }

    /// Adds or replaces the policy serving `tier`.
    pub fn with_tier(mut self, tier: Tier, policy: Box<dyn EvictionPolicy>) -> Self {
        self.slots.retain(|slot| slot.tier != tier);
        self.slots.push(TierSlot {
            tier,
            policy,
            hits: AtomicU64::new(0),
        });
        self.slots.sort_by_key(|slot| slot.tier);
        self
    }

    /// Builds the tiers described by `config`. The distributed tier is a
    /// second in-memory policy with the memory tier's settings.
    pub fn from_config(config: &Config) -> Result<Self> {
        let mut tiered = Self::new(Box::new(MemoryPolicy::from_config(&config.memory)));

        if config.disk.enabled {
            tiered = tiered.with_disk(PersistentTier::open(&config.disk)?);
        }
        if config.distributed_enabled {
            tiered = tiered.with_tier(
                Tier::Distributed,
                Box::new(MemoryPolicy::from_config(&config.memory)),
            );
        }

        Ok(tiered)
    }

    pub fn tiers(&self) -> Vec<Tier> {
        self.slots.iter().map(|slot| slot.tier).collect()
    }

    pub fn disk(&self) -> Option<&PersistentTier> {
        self.disk.as_ref()
    }

    fn slot(&self, tier: Tier) -> Result<&TierSlot> {
        self.slots
            .iter()
            .find(|slot| slot.tier == tier)
            .ok_or_else(|| CacheError::InvalidRequest(format!("tier '{}' is not configured", tier)))
    }

    /// Slots addressed by an optional tier filter.
    fn targets(&self, tier: Option<Tier>) -> Result<Vec<&TierSlot>> {
        match tier {
            Some(tier) => Ok(vec![self.slot(tier)?]),
            None => Ok(self.slots.iter().collect()),
        }
    }

    // == Get ==
    pub fn get(&self, key: &str) -> Option<CacheValue> {
        self.get_entry(key).map(|entry| entry.value)
    }

    /// Probes the tiers fastest first. A hit below the first tier is
    /// written back into every faster tier before returning.
    pub fn get_entry(&self, key: &str) -> Option<CacheEntry> {
        for (position, slot) in self.slots.iter().enumerate() {
            if let Some(entry) = slot.policy.get_entry(key) {
                slot.hits.fetch_add(1, Ordering::Relaxed);
                self.promote(&entry, &self.slots[..position]);
                return Some(entry);
            }
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        None
    }

    fn promote(&self, entry: &CacheEntry, faster: &[TierSlot]) {
        if faster.is_empty() {
            return;
        }

        let ttl = entry.remaining_ttl(Utc::now());
        if ttl == Some(Duration::ZERO) {
            return;
        }
        let options = SetOptions {
            ttl,
            metadata: entry.metadata.clone(),
        };

        for slot in faster {
            match slot.policy.set(&entry.key, entry.value.clone(), options.clone()) {
                Ok(()) => tracing::debug!(key = %entry.key, tier = %slot.tier, "promoted entry"),
                Err(e) => tracing::warn!(
                    key = %entry.key,
                    tier = %slot.tier,
                    error = %e,
                    "promotion write failed, skipping tier"
                ),
            }
        }
    }

    // == Set ==
    /// Writes to one tier or to all. A tier whose write fails is logged and
    /// skipped. Returns the number of tiers written.
    pub fn set(
        &self,
        key: &str,
        value: CacheValue,
        tier: Option<Tier>,
        options: SetOptions,
    ) -> Result<usize> {
        let mut written = 0;
        for slot in self.targets(tier)? {
            match slot.policy.set(key, value.clone(), options.clone()) {
                Ok(()) => written += 1,
                Err(e) => tracing::warn!(
                    key,
                    tier = %slot.tier,
                    error = %e,
                    "tier write failed, skipping tier"
                ),
            }
        }
        Ok(written)
    }

    // == Delete ==
    /// Returns the number of tiers the key was actually removed from.
    pub fn delete(&self, key: &str, tier: Option<Tier>) -> Result<usize> {
        Ok(self
            .targets(tier)?
            .into_iter()
            .filter(|slot| slot.policy.delete(key))
            .count())
    }

    pub fn clear(&self, tier: Option<Tier>) -> Result<()> {
        for slot in self.targets(tier)? {
            slot.policy.clear();
            tracing::info!(tier = %slot.tier, "cleared tier");
        }
        Ok(())
    }

    /// True if any tier holds a live entry for the key.
    pub fn contains(&self, key: &str) -> bool {
        self.slots.iter().any(|slot| slot.policy.contains(key))
    }

    /// Reads every key through the tiers so lower-tier hits get promoted.
    /// Returns how many were found.
    pub fn prefetch<I, K>(&self, keys: I) -> usize
    where
        I: IntoIterator<Item = K>,
        K: AsRef<str>,
    {
        keys.into_iter()
            .filter(|key| self.get_entry(key.as_ref()).is_some())
            .count()
    }

    // == Stats ==
    pub fn tier_stats(&self, tier: Tier) -> Option<CacheStats> {
        self.slot(tier).ok().map(|slot| slot.policy.stats())
    }

    pub fn stats(&self) -> TieredStats {
        let tiers = self
            .slots
            .iter()
            .map(|slot| TierStats {
                tier: slot.tier,
                policy: slot.policy.name(),
                stats: slot.policy.stats(),
            })
            .collect();
        let hits_by_tier: BTreeMap<Tier, u64> = self
            .slots
            .iter()
            .map(|slot| (slot.tier, slot.hits.load(Ordering::Relaxed)))
            .collect();
        let hits: u64 = hits_by_tier.values().sum();
        let misses = self.misses.load(Ordering::Relaxed);

        TieredStats {
            tiers,
            hits_by_tier,
            misses,
            overall_hit_rate: CacheStats::hit_rate_of(hits, misses),
        }
    }

    // == Lifecycle ==
    pub fn start_sweeper(&self, interval: Duration) {
        if let Some(disk) = &self.disk {
            disk.start_sweeper(interval);
        }
    }

    pub fn shutdown(&self) {
        if let Some(disk) = &self.disk {
            disk.shutdown();
        }
    }
}
