//! Property-Based Tests for Cache Module
//!
//! Uses proptest to check the size bounds, statistics and list invariants
//! of the eviction policies over arbitrary operation sequences.

use proptest::prelude::*;
use serde_json::json;
use std::collections::VecDeque;

use crate::cache::{
    ArcPolicy, EvictionPolicy, LfuPolicy, LruPolicy, PersistentTier, SetOptions, TtlPolicy,
};
use crate::config::DiskTierConfig;

// == Test Configuration ==
const TEST_MAX_SIZE: u64 = 64;
const TEST_MAX_ITEMS: usize = 4;

// == Strategies ==
/// Small key space so sequences revisit keys
fn key_strategy() -> impl Strategy<Value = String> {
    "[a-h]".prop_map(|s| s)
}

/// String values of 1..=16 bytes, always below the budget
fn value_strategy() -> impl Strategy<Value = String> {
    "[a-z]{1,16}".prop_map(|s| s)
}

#[derive(Debug, Clone)]
enum CacheOp {
    Set { key: String, value: String },
    Get { key: String },
    Delete { key: String },
}

fn cache_op_strategy() -> impl Strategy<Value = CacheOp> {
    prop_oneof![
        3 => (key_strategy(), value_strategy())
            .prop_map(|(key, value)| CacheOp::Set { key, value }),
        2 => key_strategy().prop_map(|key| CacheOp::Get { key }),
        1 => key_strategy().prop_map(|key| CacheOp::Delete { key }),
    ]
}

/// Runs the ops, returning the number of gets that hit and missed.
fn apply(policy: &dyn EvictionPolicy, ops: &[CacheOp]) -> (u64, u64) {
    let (mut hits, mut misses) = (0, 0);
    for op in ops {
        match op {
            CacheOp::Set { key, value } => {
                policy.set(key, json!(value), SetOptions::default()).unwrap();
            }
            CacheOp::Get { key } => match policy.get(key) {
                Some(_) => hits += 1,
                None => misses += 1,
            },
            CacheOp::Delete { key } => {
                policy.delete(key);
            }
        }
    }
    (hits, misses)
}

fn byte_bounded_policies() -> Vec<Box<dyn EvictionPolicy>> {
    vec![
        Box::new(LruPolicy::new(TEST_MAX_SIZE)),
        Box::new(LfuPolicy::new(TEST_MAX_SIZE)),
        Box::new(TtlPolicy::new(TEST_MAX_SIZE, std::time::Duration::from_secs(3600))),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    // Size bound: byte-bounded policies never exceed max_size when every
    // value fits the budget.
    #[test]
    fn prop_size_bound_holds(ops in prop::collection::vec(cache_op_strategy(), 1..80)) {
        for policy in byte_bounded_policies() {
            let mut peak = 0;
            for op in &ops {
                apply(policy.as_ref(), std::slice::from_ref(op));
                peak = peak.max(policy.stats().current_size);
            }
            prop_assert!(
                peak <= TEST_MAX_SIZE,
                "{} reached {} bytes",
                policy.name(),
                peak
            );
        }
    }

    // Statistics consistency: hits and misses match what get returned, and
    // the gauges match the live contents.
    #[test]
    fn prop_statistics_consistency(ops in prop::collection::vec(cache_op_strategy(), 1..80)) {
        let mut policies = byte_bounded_policies();
        policies.push(Box::new(ArcPolicy::new(TEST_MAX_ITEMS)));

        for policy in policies {
            let (hits, misses) = apply(policy.as_ref(), &ops);
            let stats = policy.stats();

            prop_assert_eq!(stats.hits, hits, "{} hits", policy.name());
            prop_assert_eq!(stats.misses, misses, "{} misses", policy.name());

            let live: Vec<char> = ('a'..='h')
                .filter(|key| policy.contains(&key.to_string()))
                .collect();
            prop_assert_eq!(stats.item_count, live.len(), "{} item_count", policy.name());
        }
    }

    // LRU contents always match a reference recency list.
    #[test]
    fn prop_lru_matches_reference_model(ops in prop::collection::vec(cache_op_strategy(), 1..80)) {
        let lru = LruPolicy::new(TEST_MAX_SIZE);
        let mut model: VecDeque<(String, u64)> = VecDeque::new();

        for op in &ops {
            apply(&lru, std::slice::from_ref(op));
            match op {
                CacheOp::Set { key, value } => {
                    model.retain(|(k, _)| k != key);
                    let size = value.len() as u64;
                    while model.iter().map(|(_, s)| s).sum::<u64>() + size > TEST_MAX_SIZE {
                        model.pop_front();
                    }
                    model.push_back((key.clone(), size));
                }
                CacheOp::Get { key } => {
                    if let Some(pos) = model.iter().position(|(k, _)| k == key) {
                        if let Some(item) = model.remove(pos) {
                            model.push_back(item);
                        }
                    }
                }
                CacheOp::Delete { key } => model.retain(|(k, _)| k != key),
            }
        }

        for key in ('a'..='h').map(|c| c.to_string()) {
            let expected = model.iter().any(|(k, _)| *k == key);
            prop_assert_eq!(lru.contains(&key), expected, "key {}", key);
        }
    }

    // ARC keeps resident keys within max_items and all four lists within
    // twice that.
    #[test]
    fn prop_arc_lists_bounded(ops in prop::collection::vec(cache_op_strategy(), 1..120)) {
        let arc = ArcPolicy::new(TEST_MAX_ITEMS);

        for op in &ops {
            apply(&arc, std::slice::from_ref(op));
            let snap = arc.snapshot();

            prop_assert!(snap.p <= TEST_MAX_ITEMS);
            prop_assert!(snap.t1 + snap.t2 <= TEST_MAX_ITEMS, "{:?}", snap);
            prop_assert!(snap.t1 + snap.t2 + snap.b1 + snap.b2 <= 2 * TEST_MAX_ITEMS, "{:?}", snap);
            prop_assert!(arc.stats().item_count <= TEST_MAX_ITEMS);
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    // The disk tier honours its byte budget and its index matches its blobs.
    #[test]
    fn prop_disk_size_bound(ops in prop::collection::vec(cache_op_strategy(), 1..40)) {
        let dir = tempfile::TempDir::new().unwrap();
        let tier = PersistentTier::open(&DiskTierConfig {
            enabled: true,
            root_dir: dir.path().to_path_buf(),
            max_size: TEST_MAX_SIZE,
            compression: false,
        })
        .unwrap();

        let (hits, misses) = apply(&tier, &ops);
        let stats = tier.stats();

        prop_assert!(stats.current_size <= TEST_MAX_SIZE);
        prop_assert_eq!(stats.hits, hits);
        prop_assert_eq!(stats.misses, misses);

        let blobs = std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.path().extension().is_some_and(|ext| ext == "cache"))
            .count();
        prop_assert_eq!(blobs, stats.item_count);
    }
}
