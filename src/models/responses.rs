//! Response DTOs for the cache server API
//!
//! Defines the structure of outgoing HTTP response bodies. Group stats and
//! optimize reports are serialized straight from the engine types.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::cache::{CacheValue, CoordinatorStats, Tier, TierStats};

/// Response body for the GET operation (GET /get/:key)
#[derive(Debug, Clone, Serialize)]
pub struct GetResponse {
    /// The requested key
    pub key: String,
    /// The stored value
    pub value: CacheValue,
}

impl GetResponse {
    /// Creates a new GetResponse
    pub fn new(key: impl Into<String>, value: CacheValue) -> Self {
        Self {
            key: key.into(),
            value,
        }
    }
}

/// Response body for the SET operation (PUT /set)
#[derive(Debug, Clone, Serialize)]
pub struct SetResponse {
    /// Success message
    pub message: String,
    /// The key that was set
    pub key: String,
    /// Tiers that accepted the write
    pub tiers_written: usize,
}

impl SetResponse {
    /// Creates a new SetResponse
    pub fn new(key: impl Into<String>, tiers_written: usize) -> Self {
        let key = key.into();
        Self {
            message: format!("Key '{}' set successfully", key),
            key,
            tiers_written,
        }
    }
}

/// Response body for the DELETE operation (DELETE /del/:key)
#[derive(Debug, Clone, Serialize)]
pub struct DeleteResponse {
    /// Success message
    pub message: String,
    /// The key that was deleted
    pub key: String,
}

impl DeleteResponse {
    /// Creates a new DeleteResponse
    pub fn new(key: impl Into<String>) -> Self {
        let key = key.into();
        Self {
            message: format!("Key '{}' deleted successfully", key),
            key,
        }
    }
}

/// Response body for DELETE /group/:name
#[derive(Debug, Clone, Serialize)]
pub struct DeleteGroupResponse {
    pub message: String,
    pub group: String,
    /// Member keys that were present in some tier
    pub deleted: usize,
}

impl DeleteGroupResponse {
    pub fn new(group: impl Into<String>, deleted: usize) -> Self {
        let group = group.into();
        Self {
            message: format!("Group '{}' deleted ({} keys)", group, deleted),
            group,
            deleted,
        }
    }
}

/// Response body for the stats endpoint (GET /stats)
#[derive(Debug, Clone, Serialize)]
pub struct StatsResponse {
    /// Lookups answered by some tier
    pub hits: u64,
    /// Lookups no tier could answer
    pub misses: u64,
    /// Hit rate (hits / (hits + misses))
    pub hit_rate: f64,
    pub hits_by_tier: BTreeMap<Tier, u64>,
    /// Per-tier policy counters
    pub tiers: Vec<TierStats>,
    /// Group name -> tracked key count
    pub groups: BTreeMap<String, usize>,
}

impl From<CoordinatorStats> for StatsResponse {
    fn from(stats: CoordinatorStats) -> Self {
        let tiered = stats.tiered;
        Self {
            hits: tiered.hits_by_tier.values().sum(),
            misses: tiered.misses,
            hit_rate: tiered.overall_hit_rate,
            hits_by_tier: tiered.hits_by_tier,
            tiers: tiered.tiers,
            groups: stats.groups,
        }
    }
}

/// Response body for the health endpoint (GET /health)
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Health status (e.g., "healthy")
    pub status: String,
    /// Current timestamp in ISO 8601 format
    pub timestamp: String,
}

impl HealthResponse {
    /// Creates a new HealthResponse with current timestamp
    pub fn healthy() -> Self {
        Self {
            status: "healthy".to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// Error response body for all error conditions
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    /// Error message describing what went wrong
    pub error: String,
}

impl ErrorResponse {
    /// Creates a new ErrorResponse
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}
