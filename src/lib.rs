//! Tiercache - a tiered cache and eviction engine
//!
//! In-memory LRU/LFU/TTL/ARC policies, a persistent disk tier with
//! background expiry sweeping, read-through promotion across tiers and
//! group-based bulk invalidation, served over a small HTTP API.

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod models;
pub mod tasks;

pub use api::AppState;
pub use cache::{CacheCoordinator, TieredCache};
pub use config::Config;
pub use error::{CacheError, Result};
