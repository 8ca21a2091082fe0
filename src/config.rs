//! Configuration Module
//!
//! Handles loading and validating engine and server configuration from
//! environment variables.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use serde::{Serialize, Serializer};

use crate::cache::PolicyKind;
use crate::error::{CacheError, Result};

/// Settings for the in-memory tier (`tier.memory.*`).
#[derive(Debug, Clone, Serialize)]
pub struct MemoryTierConfig {
    /// Eviction policy used by the tier
    pub policy: PolicyKind,
    /// Byte budget for `lru`, `lfu` and `ttl`
    pub max_size: u64,
    /// Item budget for `arc`
    pub max_items: usize,
    /// TTL applied by the `ttl` policy when the caller gives none
    #[serde(serialize_with = "as_secs")]
    pub default_ttl: Duration,
}

impl Default for MemoryTierConfig {
    fn default() -> Self {
        Self {
            policy: PolicyKind::Lru,
            max_size: 100 * 1024 * 1024,
            max_items: 1000,
            default_ttl: Duration::from_secs(3600),
        }
    }
}

/// Settings for the persistent tier (`tier.disk.*`).
#[derive(Debug, Clone, Serialize)]
pub struct DiskTierConfig {
    pub enabled: bool,
    /// Directory exclusively owned by one disk tier
    pub root_dir: PathBuf,
    pub max_size: u64,
    /// Compress blobs with LZ4 before writing them
    pub compression: bool,
}

impl Default for DiskTierConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            root_dir: PathBuf::from("data/cache/disk"),
            max_size: 1024 * 1024 * 1024,
            compression: true,
        }
    }
}

/// Engine and server configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
/// Serializes with durations in whole seconds, matching the env vars.
#[derive(Debug, Clone, Serialize)]
pub struct Config {
    pub memory: MemoryTierConfig,
    pub disk: DiskTierConfig,
    /// Enables the stub third tier
    pub distributed_enabled: bool,
    /// Interval between disk tier expiry sweeps
    #[serde(serialize_with = "as_secs")]
    pub sweep_interval: Duration,
    /// Tiers whose hit rate falls below this are cleared by `optimize`
    pub low_water_mark: f64,
    /// Lookups a tier must have served before `optimize` judges it
    pub min_requests: u64,
    /// HTTP server port
    pub server_port: u16,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `TIER_MEMORY_POLICY` - `lru`, `lfu`, `ttl` or `arc` (default: lru)
    /// - `TIER_MEMORY_MAX_SIZE` - Memory tier bytes (default: 100 MiB)
    /// - `TIER_MEMORY_MAX_ITEMS` - Memory tier items for arc (default: 1000)
    /// - `TIER_MEMORY_DEFAULT_TTL` - Seconds (default: 3600)
    /// - `TIER_DISK_ENABLED` - (default: true)
    /// - `TIER_DISK_ROOT_DIR` - (default: data/cache/disk)
    /// - `TIER_DISK_MAX_SIZE` - Disk tier bytes (default: 1 GiB)
    /// - `TIER_DISK_COMPRESSION` - (default: true)
    /// - `TIER_DISTRIBUTED_ENABLED` - (default: false)
    /// - `SWEEP_INTERVAL` - Seconds between disk sweeps (default: 3600)
    /// - `OPTIMIZE_LOW_WATER_MARK` - (default: 0.1)
    /// - `OPTIMIZE_MIN_REQUESTS` - (default: 100)
    /// - `SERVER_PORT` - HTTP server port (default: 3000)
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Builds a Config from an arbitrary variable source.
    ///
    /// Unparseable values fall back to their defaults; an unknown policy
    /// name is rejected.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Config::default();
        let flag = |name: &str, default: bool| {
            lookup(name)
                .and_then(|v| parse_flag(&v))
                .unwrap_or(default)
        };

        let policy = match lookup("TIER_MEMORY_POLICY") {
            Some(raw) => PolicyKind::from_str(&raw)?,
            None => defaults.memory.policy,
        };

        Ok(Self {
            memory: MemoryTierConfig {
                policy,
                max_size: parse_var(&lookup, "TIER_MEMORY_MAX_SIZE").unwrap_or(defaults.memory.max_size),
                max_items: parse_var(&lookup, "TIER_MEMORY_MAX_ITEMS").unwrap_or(defaults.memory.max_items),
                default_ttl: parse_var(&lookup, "TIER_MEMORY_DEFAULT_TTL")
                    .map(Duration::from_secs)
                    .unwrap_or(defaults.memory.default_ttl),
            },
            disk: DiskTierConfig {
                enabled: flag("TIER_DISK_ENABLED", defaults.disk.enabled),
                root_dir: lookup("TIER_DISK_ROOT_DIR")
                    .map(PathBuf::from)
                    .unwrap_or(defaults.disk.root_dir),
                max_size: parse_var(&lookup, "TIER_DISK_MAX_SIZE").unwrap_or(defaults.disk.max_size),
                compression: flag("TIER_DISK_COMPRESSION", defaults.disk.compression),
            },
            distributed_enabled: flag("TIER_DISTRIBUTED_ENABLED", defaults.distributed_enabled),
            sweep_interval: parse_var(&lookup, "SWEEP_INTERVAL")
                .map(Duration::from_secs)
                .unwrap_or(defaults.sweep_interval),
            low_water_mark: parse_var(&lookup, "OPTIMIZE_LOW_WATER_MARK").unwrap_or(defaults.low_water_mark),
            min_requests: parse_var(&lookup, "OPTIMIZE_MIN_REQUESTS").unwrap_or(defaults.min_requests),
            server_port: parse_var(&lookup, "SERVER_PORT").unwrap_or(defaults.server_port),
        })
    }

    /// Rejects settings the engine cannot be built from.
    pub fn validate(&self) -> Result<()> {
        if self.memory.max_size == 0 {
            return Err(CacheError::Config("tier.memory.max_size must be > 0".into()));
        }
        if self.memory.policy == PolicyKind::Arc && self.memory.max_items == 0 {
            return Err(CacheError::Config("tier.memory.max_items must be > 0".into()));
        }
        if self.disk.enabled {
            if self.disk.root_dir.as_os_str().is_empty() {
                return Err(CacheError::Config("tier.disk.root_dir must be set".into()));
            }
            if self.disk.max_size == 0 {
                return Err(CacheError::Config("tier.disk.max_size must be > 0".into()));
            }
        }
        if self.sweep_interval.is_zero() {
            return Err(CacheError::Config("sweep.interval must be > 0".into()));
        }
        if !(0.0..=1.0).contains(&self.low_water_mark) {
            return Err(CacheError::Config(
                "optimize.low_water_mark must be within [0, 1]".into(),
            ));
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            memory: MemoryTierConfig::default(),
            disk: DiskTierConfig::default(),
            distributed_enabled: false,
            sweep_interval: Duration::from_secs(3600),
            low_water_mark: 0.1,
            min_requests: 100,
            server_port: 3000,
        }
    }
}

fn parse_var<T, F>(lookup: &F, name: &str) -> Option<T>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    lookup(name).and_then(|v| v.trim().parse().ok())
}

fn as_secs<S: Serializer>(duration: &Duration, serializer: S) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_u64(duration.as_secs())
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
