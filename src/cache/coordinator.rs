//! Cache Coordinator Module
//!
//! Public entry point of the engine. Wraps a [`TieredCache`] and adds named
//! groups of keys for bulk invalidation and prefetch, aggregate statistics
//! and a hit-rate driven `optimize` pass.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::time::Duration;

use parking_lot::Mutex;
use serde::Serialize;

use crate::cache::{CacheValue, Metadata, SetOptions, Tier, TieredCache, TieredStats};
use crate::config::Config;
use crate::error::Result;

/// Default hit rate under which `optimize` clears a tier.
pub const DEFAULT_LOW_WATER_MARK: f64 = 0.1;

/// Default number of lookups a tier must have served before `optimize`
/// judges its hit rate.
pub const DEFAULT_MIN_REQUESTS: u64 = 100;

/// Optional arguments to [`CacheCoordinator::set`].
#[derive(Debug, Clone, Default)]
pub struct WriteOptions {
    /// Single target tier; every tier when `None`
    pub tier: Option<Tier>,
    pub ttl: Option<Duration>,
    /// Group the key joins once written
    pub group: Option<String>,
    pub metadata: Metadata,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupStats {
    pub name: String,
    /// Tracked keys
    pub size: usize,
    /// Tracked keys still present in some tier
    pub live: usize,
    pub keys: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CoordinatorStats {
    pub tiered: TieredStats,
    /// Group name -> tracked key count
    pub groups: BTreeMap<String, usize>,
}

/// What an `optimize` pass changed.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct OptimizeReport {
    pub cleared_tiers: Vec<Tier>,
    pub pruned_keys: usize,
    pub dropped_groups: Vec<String>,
}

/// Configuration, statistics and group names in one document.
#[derive(Debug, Clone, Serialize)]
pub struct CacheExport {
    /// `None` when the coordinator was assembled by hand
    pub config: Option<Config>,
    pub stats: CoordinatorStats,
    pub groups: Vec<String>,
}

// == Cache Coordinator ==
pub struct CacheCoordinator {
    tiered: TieredCache,
    config: Option<Config>,
    /// Group name -> member keys. Membership is loose: a key may have been
    /// evicted from every tier and still be listed until pruned.
    groups: Mutex<HashMap<String, HashSet<String>>>,
    low_water_mark: f64,
    min_requests: u64,
}

impl CacheCoordinator {
    // == Constructors ==
    pub fn new(tiered: TieredCache) -> Self {
        Self {
            tiered,
            config: None,
            groups: Mutex::new(HashMap::new()),
            low_water_mark: DEFAULT_LOW_WATER_MARK,
            min_requests: DEFAULT_MIN_REQUESTS,
        }
    }

    pub fn with_optimize_thresholds(mut self, low_water_mark: f64, min_requests: u64) -> Self {
        self.low_water_mark = low_water_mark;
        self.min_requests = min_requests;
        self
    }

    /// Validates `config`, builds its tiers and starts the disk sweeper.
    pub fn from_config(config: &Config) -> Result<Self> {
        config.validate()?;

        let tiered = TieredCache::from_config(config)?;
        tiered.start_sweeper(config.sweep_interval);

        tracing::info!(
            policy = %config.memory.policy,
            tiers = ?tiered.tiers(),
            "cache coordinator ready"
        );

        let mut coordinator = Self::new(tiered)
            .with_optimize_thresholds(config.low_water_mark, config.min_requests);
        coordinator.config = Some(config.clone());
        Ok(coordinator)
    }

    /// The configuration this coordinator was built from, if any.
    pub fn config(&self) -> Option<&Config> {
        self.config.as_ref()
    }

    pub fn tiered(&self) -> &TieredCache {
        &self.tiered
    }

    fn join_group(&self, group: &str, key: &str) {
        self.groups
            .lock()
            .entry(group.to_string())
            .or_default()
            .insert(key.to_string());
    }

    /// Removes `key` from every group.
    fn leave_groups(&self, key: &str) {
        for members in self.groups.lock().values_mut() {
            members.remove(key);
        }
    }

    fn group_keys(&self, name: &str) -> Option<Vec<String>> {
        self.groups
            .lock()
            .get(name)
            .map(|members| members.iter().cloned().collect())
    }

    // == Get / Set / Delete ==
    /// Reads through the tiers. A hit joins `group` when one is given.
    pub fn get(&self, key: &str, group: Option<&str>) -> Option<CacheValue> {
        let value = self.tiered.get(key)?;
        if let Some(group) = group {
            self.join_group(group, key);
        }
        Some(value)
    }

    /// Writes through the tiers, then records group membership. Returns the
    /// number of tiers written.
    pub fn set(&self, key: &str, value: CacheValue, options: WriteOptions) -> Result<usize> {
        let set_options = SetOptions {
            ttl: options.ttl,
            metadata: options.metadata,
        };
        let written = self.tiered.set(key, value, options.tier, set_options)?;

        if let Some(group) = &options.group {
            self.join_group(group, key);
        }
        Ok(written)
    }

    /// Removes the key from every tier and every group.
    pub fn delete(&self, key: &str) -> bool {
        let removed = self.tiered.delete(key, None).unwrap_or_default();
        self.leave_groups(key);
        removed > 0
    }

    // == Groups ==
    /// Deletes every key tracked under the group, then discards the group.
    /// Returns how many of those keys were present in some tier.
    pub fn delete_group(&self, name: &str) -> usize {
        let Some(members) = self.groups.lock().remove(name) else {
            return 0;
        };

        let mut deleted = 0;
        for key in &members {
            if self.delete(key) {
                deleted += 1;
            }
        }

        tracing::info!(group = name, tracked = members.len(), deleted, "deleted cache group");
        deleted
    }

    /// Forgets the group without touching its entries.
    pub fn clear_group(&self, name: &str) -> bool {
        self.groups.lock().remove(name).is_some()
    }

    pub fn groups(&self) -> Vec<String> {
        let mut names: Vec<String> = self.groups.lock().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn group_stats(&self, name: &str) -> Option<GroupStats> {
        let mut keys = self.group_keys(name)?;
        keys.sort();
        let live = keys.iter().filter(|key| self.tiered.contains(key)).count();

        Some(GroupStats {
            name: name.to_string(),
            size: keys.len(),
            live,
            keys,
        })
    }

    /// Reads every member of the group so slower-tier hits get promoted.
    pub fn prefetch_group(&self, name: &str) -> usize {
        match self.group_keys(name) {
            Some(keys) => self.tiered.prefetch(&keys),
            None => 0,
        }
    }

    // == Stats ==
    pub fn stats(&self) -> CoordinatorStats {
        let groups = self
            .groups
            .lock()
            .iter()
            .map(|(name, members)| (name.clone(), members.len()))
            .collect();

        CoordinatorStats {
            tiered: self.tiered.stats(),
            groups,
        }
    }

    /// Snapshot of the configuration, statistics and group names.
    pub fn export(&self) -> CacheExport {
        CacheExport {
            config: self.config.clone(),
            stats: self.stats(),
            groups: self.groups(),
        }
    }

    // == Optimize ==
    /// Clears every tier whose hit rate sits below the low-water mark once
    /// it has served enough lookups, then prunes group members that no tier
    /// holds any more and drops groups left empty.
    pub fn optimize(&self) -> OptimizeReport {
        let mut report = OptimizeReport::default();

        for tier in self.tiered.tiers() {
            let Some(stats) = self.tiered.tier_stats(tier) else {
                continue;
            };
            let hit_rate = stats.compute_hit_rate();
            if stats.requests() < self.min_requests || hit_rate >= self.low_water_mark {
                continue;
            }
            if self.tiered.clear(Some(tier)).is_ok() {
                tracing::info!(%tier, hit_rate, requests = stats.requests(), "optimize cleared tier");
                report.cleared_tiers.push(tier);
            }
        }

        let mut groups = self.groups.lock();
        for members in groups.values_mut() {
            let before = members.len();
            members.retain(|key| self.tiered.contains(key));
            report.pruned_keys += before - members.len();
        }
        groups.retain(|name, members| {
            if members.is_empty() {
                report.dropped_groups.push(name.clone());
                false
            } else {
                true
            }
        });
        report.dropped_groups.sort();

        tracing::info!(
            cleared_tiers = report.cleared_tiers.len(),
            pruned_keys = report.pruned_keys,
            dropped_groups = report.dropped_groups.len(),
            "optimize finished"
        );
        report
    }

    pub fn shutdown(&self) {
        self.tiered.shutdown();
    }
}
