//! Cache Entry Module
//!
//! Defines the unit of storage shared by every tier: the value, its size
//! estimate, access bookkeeping and optional expiry.

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde_json::Value;

/// Opaque payload stored by the cache. The engine only measures and
/// serializes it.
pub type CacheValue = Value;

/// Free-form caller annotations (provenance tags and the like).
pub type Metadata = BTreeMap<String, Value>;

/// Per-slot overhead charged for each element of an array or object.
const SLOT_OVERHEAD: u64 = 8;

// == Set Options ==
/// Optional arguments to `EvictionPolicy::set`.
#[derive(Debug, Clone, Default)]
pub struct SetOptions {
    /// Time to live; `None` means the entry never expires by time
    /// (the `ttl` policy substitutes its default)
    pub ttl: Option<Duration>,
    pub metadata: Metadata,
}

impl SetOptions {
    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            ttl: Some(ttl),
            metadata: Metadata::new(),
        }
    }
}

// == Cache Entry ==
/// Represents a single cache entry with value and metadata.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub key: String,
    /// The stored value, immutable after insertion
    pub value: CacheValue,
    /// Byte estimate computed once at insertion
    pub size: u64,
    pub created_at: DateTime<Utc>,
    pub last_accessed_at: DateTime<Utc>,
    /// Successful `get` calls since insertion
    pub access_count: u64,
    pub ttl: Option<Duration>,
    pub metadata: Metadata,
}

impl CacheEntry {
    // == Constructor ==
    /// Creates a new entry, measuring the value once.
    pub fn new(key: impl Into<String>, value: CacheValue, options: SetOptions) -> Self {
        let now = Utc::now();
        let size = estimate_size(&value);

        Self {
            key: key.into(),
            value,
            size,
            created_at: now,
            last_accessed_at: now,
            access_count: 0,
            ttl: options.ttl,
            metadata: options.metadata,
        }
    }

    // == Touch ==
    /// Records a successful read.
    pub fn touch(&mut self) {
        let now = Utc::now();
        if now > self.last_accessed_at {
            self.last_accessed_at = now;
        }
        self.access_count += 1;
    }

    // == Expiry ==
    /// Instant after which the entry is expired, if it has a TTL.
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.ttl.map(|ttl| add_duration(self.created_at, ttl))
    }

    /// Checks if the entry has expired at `now`.
    ///
    /// An entry is expired once strictly more than its TTL has elapsed
    /// since creation.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        match self.expires_at() {
            Some(expires) => now > expires,
            None => false,
        }
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    /// TTL left at `now`, used when a value is promoted into another tier.
    ///
    /// Returns `None` for entries without TTL and `Some(ZERO)` once expired.
    pub fn remaining_ttl(&self, now: DateTime<Utc>) -> Option<Duration> {
        self.expires_at()
            .map(|expires| (expires - now).to_std().unwrap_or(Duration::ZERO))
    }
}

/// Adds a std duration to a timestamp, saturating at the far future.
pub(crate) fn add_duration(at: DateTime<Utc>, ttl: Duration) -> DateTime<Utc> {
    chrono::Duration::from_std(ttl)
        .ok()
        .and_then(|ttl| at.checked_add_signed(ttl))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

// == Size Estimation ==
/// Estimates the in-memory footprint of a value.
///
/// Scalars are charged their byte length; arrays and objects (tabular
/// payloads) are walked deeply with a per-slot overhead.
pub fn estimate_size(value: &CacheValue) -> u64 {
    deep_size(value).max(1)
}

fn deep_size(value: &CacheValue) -> u64 {
    match value {
        Value::Null | Value::Bool(_) => 1,
        Value::Number(_) => 8,
        Value::String(s) => s.len() as u64,
        Value::Array(items) => items
            .iter()
            .map(|item| SLOT_OVERHEAD + deep_size(item))
            .sum(),
        Value::Object(fields) => fields
            .iter()
            .map(|(name, item)| SLOT_OVERHEAD + name.len() as u64 + deep_size(item))
            .sum(),
    }
}
