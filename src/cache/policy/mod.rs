//! Eviction Policies
//!
//! Size-bounded containers of [`CacheEntry`] behind one contract. Each
//! implementation owns a single mutex guarding all of its state, so every
//! operation is individually atomic.
//!
//! # Policies
//! - `lru`: evicts the least recently read entries
//! - `lfu`: evicts the least frequently read entries, oldest first on ties
//! - `ttl`: evicts expired entries, then the oldest ones
//! - `arc`: Adaptive Replacement Cache bounded by item count

mod arc;
mod lfu;
mod lru;
mod ttl;

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::cache::{CacheEntry, CacheStats, CacheValue, SetOptions};
use crate::config::MemoryTierConfig;
use crate::error::{CacheError, Result};

pub use arc::{ArcPolicy, ArcSnapshot};
pub use lfu::LfuPolicy;
pub use lru::LruPolicy;
pub use ttl::TtlPolicy;

// == Eviction Policy Contract ==
/// Uniform get/set/delete contract shared by every tier.
pub trait EvictionPolicy: Send + Sync {
    /// Short policy name used in stats and logs.
    fn name(&self) -> &'static str;

    /// Returns a snapshot of the live entry and records a hit, or records
    /// a miss. Never fails: absent, expired and corrupted all read as `None`.
    fn get_entry(&self, key: &str) -> Option<CacheEntry>;

    /// Returns the live value, see [`EvictionPolicy::get_entry`].
    fn get(&self, key: &str) -> Option<CacheValue> {
        self.get_entry(key).map(|entry| entry.value)
    }

    /// Inserts or replaces, reclaiming space first when the policy is full.
    ///
    /// An entry larger than the whole budget is still admitted (soft bound).
    fn set(&self, key: &str, value: CacheValue, options: SetOptions) -> Result<()>;

    /// Removes the key, returning whether anything was removed.
    fn delete(&self, key: &str) -> bool;

    /// Removes every entry; cumulative counters are preserved.
    fn clear(&self);

    /// Live-membership probe without stats side effects.
    fn contains(&self, key: &str) -> bool;

    fn stats(&self) -> CacheStats;
}

/// Logs the documented soft-bound overflow after an admission.
pub(crate) fn warn_if_over_budget(policy: &str, key: &str, current_size: u64, max_size: u64) {
    if current_size > max_size {
        tracing::warn!(
            policy,
            key,
            current_size,
            max_size,
            "entry admitted over the size budget"
        );
    }
}

// == Policy Kind ==
/// Configured eviction algorithm for an in-memory tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PolicyKind {
    Lru,
    Lfu,
    Ttl,
    Arc,
}

impl PolicyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PolicyKind::Lru => "lru",
            PolicyKind::Lfu => "lfu",
            PolicyKind::Ttl => "ttl",
            PolicyKind::Arc => "arc",
        }
    }
}

impl FromStr for PolicyKind {
    type Err = CacheError;

    fn from_str(raw: &str) -> Result<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "lru" => Ok(PolicyKind::Lru),
            "lfu" => Ok(PolicyKind::Lfu),
            "ttl" => Ok(PolicyKind::Ttl),
            "arc" => Ok(PolicyKind::Arc),
            other => Err(CacheError::Config(format!(
                "unknown eviction policy '{}' (expected lru, lfu, ttl or arc)",
                other
            ))),
        }
    }
}

impl fmt::Display for PolicyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// == Memory Policy ==
/// The four in-memory policies, selected once from configuration.
#[derive(Debug)]
pub enum MemoryPolicy {
    Lru(LruPolicy),
    Lfu(LfuPolicy),
    Ttl(TtlPolicy),
    Arc(ArcPolicy),
}

macro_rules! dispatch {
    ($self:ident, $policy:ident => $body:expr) => {
        match $self {
            MemoryPolicy::Lru($policy) => $body,
            MemoryPolicy::Lfu($policy) => $body,
            MemoryPolicy::Ttl($policy) => $body,
            MemoryPolicy::Arc($policy) => $body,
        }
    };
}

impl MemoryPolicy {
    pub fn from_config(config: &MemoryTierConfig) -> Self {
        match config.policy {
            PolicyKind::Lru => MemoryPolicy::Lru(LruPolicy::new(config.max_size)),
            PolicyKind::Lfu => MemoryPolicy::Lfu(LfuPolicy::new(config.max_size)),
            PolicyKind::Ttl => {
                MemoryPolicy::Ttl(TtlPolicy::new(config.max_size, config.default_ttl))
            }
            PolicyKind::Arc => MemoryPolicy::Arc(ArcPolicy::new(config.max_items)),
        }
    }

    pub fn kind(&self) -> PolicyKind {
        match self {
            MemoryPolicy::Lru(_) => PolicyKind::Lru,
            MemoryPolicy::Lfu(_) => PolicyKind::Lfu,
            MemoryPolicy::Ttl(_) => PolicyKind::Ttl,
            MemoryPolicy::Arc(_) => PolicyKind::Arc,
        }
    }
}

impl EvictionPolicy for MemoryPolicy {
    fn name(&self) -> &'static str {
        self.kind().as_str()
    }

    fn get_entry(&self, key: &str) -> Option<CacheEntry> {
        dispatch!(self, policy => policy.get_entry(key))
    }

    fn set(&self, key: &str, value: CacheValue, options: SetOptions) -> Result<()> {
        dispatch!(self, policy => policy.set(key, value, options))
    }

    fn delete(&self, key: &str) -> bool {
        dispatch!(self, policy => policy.delete(key))
    }

    fn clear(&self) {
        dispatch!(self, policy => policy.clear())
    }

    fn contains(&self, key: &str) -> bool {
        dispatch!(self, policy => policy.contains(key))
    }

    fn stats(&self) -> CacheStats {
        dispatch!(self, policy => policy.stats())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;

    #[test]
    fn test_policy_kind_parse() {
        assert_eq!("lru".parse::<PolicyKind>().unwrap(), PolicyKind::Lru);
        assert_eq!(" LFU ".parse::<PolicyKind>().unwrap(), PolicyKind::Lfu);
        assert_eq!("Ttl".parse::<PolicyKind>().unwrap(), PolicyKind::Ttl);
        assert_eq!("arc".parse::<PolicyKind>().unwrap(), PolicyKind::Arc);
        assert!("fifo".parse::<PolicyKind>().is_err());
        assert_eq!(PolicyKind::Arc.to_string(), "arc");
    }

    #[test]
    fn test_memory_policy_from_config() {
        for kind in [PolicyKind::Lru, PolicyKind::Lfu, PolicyKind::Ttl, PolicyKind::Arc] {
            let config = MemoryTierConfig {
                policy: kind,
                max_size: 1024,
                max_items: 16,
                default_ttl: Duration::from_secs(60),
            };
            let policy = MemoryPolicy::from_config(&config);
            assert_eq!(policy.kind(), kind);
            assert_eq!(policy.name(), kind.as_str());

            policy.set("k", json!("v"), SetOptions::default()).unwrap();
            assert!(policy.contains("k"));
            assert_eq!(policy.get("k"), Some(json!("v")));
            assert!(policy.delete("k"));
            assert!(!policy.delete("k"));
            assert_eq!(policy.get("k"), None);

            let stats = policy.stats();
            assert_eq!(stats.hits, 1);
            assert_eq!(stats.misses, 1);
        }
    }
}
