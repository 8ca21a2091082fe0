//! Request DTOs for the cache server API
//!
//! Defines the structure of incoming HTTP request bodies and query strings.

use std::time::Duration;

use serde::Deserialize;

use crate::cache::{CacheValue, Metadata, Tier, WriteOptions, MAX_KEY_LENGTH};

/// Request body for the SET operation (PUT /set)
///
/// # Fields
/// - `key`: The cache key to store the value under
/// - `value`: Any JSON value
/// - `ttl`: Optional TTL in seconds (entries without one never expire,
///   except under the `ttl` policy which applies its default)
/// - `group`: Optional group the key joins
/// - `tier`: Optional single tier to write; all tiers when absent
/// - `metadata`: Optional free-form annotations
#[derive(Debug, Clone, Deserialize)]
pub struct SetRequest {
    pub key: String,
    pub value: CacheValue,
    #[serde(default)]
    pub ttl: Option<u64>,
    #[serde(default)]
    pub group: Option<String>,
    #[serde(default)]
    pub tier: Option<Tier>,
    #[serde(default)]
    pub metadata: Metadata,
}

impl SetRequest {
    /// Validates the request data
    ///
    /// Returns an error message if validation fails, None if valid.
    pub fn validate(&self) -> Option<String> {
        if let Some(message) = validate_key(&self.key) {
            return Some(message);
        }
        if self.ttl == Some(0) {
            return Some("TTL must be at least one second".to_string());
        }
        if self.group.as_deref() == Some("") {
            return Some("Group name cannot be empty".to_string());
        }
        None
    }

    /// Splits the request into the key, the value and the write options.
    pub fn into_parts(self) -> (String, CacheValue, WriteOptions) {
        let options = WriteOptions {
            tier: self.tier,
            ttl: self.ttl.map(Duration::from_secs),
            group: self.group,
            metadata: self.metadata,
        };
        (self.key, self.value, options)
    }
}

/// Query string for GET /get/:key
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GetQuery {
    /// Group the key joins on a hit
    #[serde(default)]
    pub group: Option<String>,
}

/// Returns an error message for keys the server refuses.
pub fn validate_key(key: &str) -> Option<String> {
    if key.is_empty() {
        return Some("Key cannot be empty".to_string());
    }
    if key.len() > MAX_KEY_LENGTH {
        return Some(format!(
            "Key exceeds maximum length of {} characters",
            MAX_KEY_LENGTH
        ));
    }
    None
}
