//! Cache Statistics Module
//!
//! Tracks per-policy performance metrics including hits, misses, evictions
//! and size accounting.

use serde::Serialize;

// == Cache Stats ==
/// Counters and gauges reported by every eviction policy.
///
/// `hits`, `misses` and `evictions` are cumulative and survive `clear()`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CacheStats {
    /// Number of successful cache retrievals
    pub hits: u64,
    /// Number of failed cache retrievals (absent, expired or corrupted)
    pub misses: u64,
    /// Number of entries reclaimed by the policy or an expiry sweep
    pub evictions: u64,
    /// Sum of the size estimates of resident entries, in bytes
    pub current_size: u64,
    /// Current number of resident entries
    pub item_count: usize,
    /// hits / (hits + misses)
    pub hit_rate: f64,
}

impl CacheStats {
    // == Constructor ==
    /// Creates a new CacheStats with all counters at zero.
    pub fn new() -> Self {
        Self::default()
    }

    // == Hit Rate ==
    /// Calculates the cache hit rate.
    ///
    /// Returns hits / (hits + misses), or 0.0 if no requests have been made.
    pub fn compute_hit_rate(&self) -> f64 {
        Self::hit_rate_of(self.hits, self.misses)
    }

    pub fn hit_rate_of(hits: u64, misses: u64) -> f64 {
        let total = hits + misses;
        if total == 0 {
            0.0
        } else {
            hits as f64 / total as f64
        }
    }

    /// Total number of lookups served.
    pub fn requests(&self) -> u64 {
        self.hits + self.misses
    }

    pub fn record_hit(&mut self) {
        self.hits += 1;
    }

    pub fn record_miss(&mut self) {
        self.misses += 1;
    }

    pub fn record_eviction(&mut self) {
        self.evictions += 1;
    }

    // == Snapshot ==
    /// Returns a copy with the gauges filled in and the hit rate computed.
    pub fn snapshot(&self, current_size: u64, item_count: usize) -> Self {
        let mut stats = self.clone();
        stats.current_size = current_size;
        stats.item_count = item_count;
        stats.hit_rate = stats.compute_hit_rate();
        stats
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_new() {
        let stats = CacheStats::new();
        assert_eq!(stats.hits, 0);
        assert_eq!(stats.misses, 0);
        assert_eq!(stats.evictions, 0);
        assert_eq!(stats.item_count, 0);
    }

    #[test]
    fn test_hit_rate_no_requests() {
        let stats = CacheStats::new();
        assert_eq!(stats.compute_hit_rate(), 0.0);
    }

    #[test]
    fn test_hit_rate_mixed() {
        let mut stats = CacheStats::new();
        stats.record_hit();
        stats.record_hit();
        stats.record_hit();
        stats.record_miss();
        assert_eq!(stats.compute_hit_rate(), 0.75);
        assert_eq!(stats.requests(), 4);
    }

    #[test]
    fn test_snapshot_fills_gauges() {
        let mut stats = CacheStats::new();
        stats.record_hit();
        stats.record_miss();
        stats.record_eviction();

        let snapshot = stats.snapshot(128, 3);
        assert_eq!(snapshot.current_size, 128);
        assert_eq!(snapshot.item_count, 3);
        assert_eq!(snapshot.evictions, 1);
        assert_eq!(snapshot.hit_rate, 0.5);
    }
}
