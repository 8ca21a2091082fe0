//! Cache Module
//!
//! Tiered cache and eviction engine: four in-memory eviction policies, a
//! persistent disk tier, read-through promotion across tiers and the
//! group-aware coordinator in front of them.

mod coordinator;
mod disk;
mod entry;
mod lru;
pub mod policy;
mod stats;
mod store;
mod tiered;

#[cfg(test)]
mod property_tests;

// Re-export public types
pub use coordinator::{
    CacheCoordinator, CacheExport, CoordinatorStats, GroupStats, OptimizeReport, WriteOptions,
    DEFAULT_LOW_WATER_MARK, DEFAULT_MIN_REQUESTS,
};
pub use disk::{blob_file_name, IndexRecord, PersistentTier, WeakPersistentTier, INDEX_FILE};
pub use entry::{estimate_size, CacheEntry, CacheValue, Metadata, SetOptions};
pub use lru::LruTracker;
pub use policy::{
    ArcPolicy, ArcSnapshot, EvictionPolicy, LfuPolicy, LruPolicy, MemoryPolicy, PolicyKind,
    TtlPolicy,
};
pub use stats::CacheStats;
pub use tiered::{Tier, TierStats, TieredCache, TieredStats};

// == Public Constants ==
/// Maximum allowed key length in bytes
pub const MAX_KEY_LENGTH: usize = 256;
