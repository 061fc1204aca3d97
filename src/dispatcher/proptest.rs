//! Property-Based Tests for the Dispatcher
//!
//! Uses proptest to verify the ratio-realization invariants over the
//! whole split-ratio range:
//!
//! 1. **Realization bound**: for a fixed ratio and zero misses, the
//!    cache count deviates from `N * ratio / SPLIT_SCALE` by at most
//!    `max_pattern + 1`
//! 2. **Accounting**: counts always balance and quotas never exceed the
//!    window
//! 3. **Pattern geometry**: `pattern_size` lands in `1..=max_pattern`
//!    with cache and backend slots summing to it
//! 4. **gcd edge cases**: `gcd(x,0)=x`, `gcd(0,y)=y`, `gcd(0,0)=1`

#![cfg(test)]

use proptest::prelude::*;

use super::{gcd, Dispatcher};
use crate::config::SplitterConfig;
use crate::ratio::SPLIT_SCALE;

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn prop_gcd_edges_and_divisibility(x in 0u32..1000, y in 0u32..1000) {
        let g = gcd(x, y);
        prop_assert!(g >= 1);
        if x == 0 && y == 0 {
            prop_assert_eq!(g, 1);
        } else {
            if x > 0 {
                prop_assert_eq!(x % g, 0);
            }
            if y > 0 {
                prop_assert_eq!(y % g, 0);
            }
        }
        prop_assert_eq!(gcd(x, 0), if x == 0 { 1 } else { x });
        prop_assert_eq!(gcd(0, y), if y == 0 { 1 } else { y });
    }

    #[test]
    fn prop_pattern_geometry(ratio in 0u64..=SPLIT_SCALE) {
        let d = Dispatcher::new(&SplitterConfig::default());
        d.dispatch(ratio, false);

        let stats = d.stats();
        prop_assert!(stats.pattern_size >= 1);
        prop_assert!(stats.pattern_size <= 10);
        prop_assert_eq!(stats.pattern_cache + stats.pattern_backend, stats.pattern_size);
    }

    #[test]
    fn prop_realization_bounded(ratio in 0u64..=SPLIT_SCALE, n in 100u64..2000) {
        let d = Dispatcher::new(&SplitterConfig::default());
        let pct = ratio * 100 / SPLIT_SCALE;

        let mut cache = 0u64;
        for _ in 0..n {
            if !d.dispatch(ratio, false).is_backend() {
                cache += 1;
            }
        }

        let expected = n * pct / 100;
        let deviation = cache.abs_diff(expected);
        prop_assert!(
            deviation <= 11,
            "deviation {} for ratio {} over {} requests",
            deviation,
            ratio,
            n
        );
    }

    #[test]
    fn prop_accounting_balances(
        ratio in 0u64..=SPLIT_SCALE,
        misses in prop::collection::vec(any::<bool>(), 1..500),
    ) {
        let d = Dispatcher::new(&SplitterConfig::default());

        for (i, miss) in misses.iter().enumerate() {
            d.dispatch(ratio, *miss);

            let stats = d.stats();
            prop_assert!(stats.cache_count + stats.backend_count <= stats.total);
            prop_assert!(stats.cache_quota + stats.backend_quota <= 100);
            prop_assert_eq!(stats.request_counter, i as u64 + 1);
            // windows never outlive their hundred requests
            prop_assert!(stats.total <= 100);
        }
    }

    #[test]
    fn prop_ratio_store_snapshot_always_in_range(raw in any::<u64>()) {
        let store = crate::ratio::RatioStore::new();
        store.store(raw);
        prop_assert!(store.load() <= SPLIT_SCALE);
    }
}
