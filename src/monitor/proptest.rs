//! Property-Based Tests for the Performance Monitor
//!
//! Uses proptest to verify the baseline invariants over arbitrary
//! telemetry sequences:
//!
//! 1. **Throughput baseline**: `max_bw_avg` is monotone non-decreasing
//! 2. **Latency baseline**: once established, `min_lat_avg` is monotone
//!    non-increasing
//! 3. **Window arithmetic**: the running average always matches a naive
//!    recomputation over the live samples

#![cfg(test)]

use proptest::prelude::*;

use super::{MovingWindow, PerfMonitor};
use crate::telemetry::PerfSample;

// =============================================================================
// Property Strategies
// =============================================================================

/// Strategy for throughput values spanning idle to saturated
fn bw_strategy() -> impl Strategy<Value = Vec<u64>> {
    prop::collection::vec(0u64..1_000_000, 1..400)
}

/// Strategy for latency values; includes 0, the "no reading" sentinel
fn lat_strategy() -> impl Strategy<Value = Vec<u64>> {
    prop::collection::vec(0u64..10_000_000, 50..400)
}

fn sample(bw: u64, lat: u64) -> PerfSample {
    PerfSample {
        rdma_bw: bw,
        rdma_lat_ns: lat,
        iops: 0,
        wall_ms: 0,
    }
}

// =============================================================================
// Baseline Properties
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// Property: the throughput baseline never decreases, whatever the
    /// sample sequence does.
    #[test]
    fn prop_max_bw_avg_monotone(values in bw_strategy()) {
        let mut monitor = PerfMonitor::new(100, 40);
        let mut previous = 0u64;

        for v in values {
            monitor.observe(&sample(v, 0));
            prop_assert!(monitor.max_bw_avg() >= previous);
            prop_assert!(monitor.max_bw_avg() >= monitor.bw_average());
            previous = monitor.max_bw_avg();
        }
    }

    /// Property: once the latency baseline is established it only moves
    /// down.
    #[test]
    fn prop_min_lat_avg_monotone_once_established(values in lat_strategy()) {
        let mut monitor = PerfMonitor::new(100, 40);
        let mut previous: Option<u64> = None;

        for v in values {
            monitor.observe(&sample(0, v));
            if monitor.baseline_established() {
                if let Some(p) = previous {
                    prop_assert!(monitor.min_lat_avg() <= p);
                }
                previous = Some(monitor.min_lat_avg());
            } else {
                prop_assert_eq!(monitor.min_lat_avg(), u64::MAX);
            }
        }
    }

    /// Property: derived permil metrics never panic and the drop never
    /// exceeds 1000 permil.
    #[test]
    fn prop_permil_metrics_bounded(bw in bw_strategy(), lat in lat_strategy()) {
        let mut monitor = PerfMonitor::new(100, 40);
        for (b, l) in bw.iter().zip(lat.iter()) {
            monitor.observe(&sample(*b, *l));
            prop_assert!(monitor.bw_drop_permil() <= 1000);
            let _ = monitor.lat_increase_permil();
        }
    }
}

// =============================================================================
// Window Properties
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// Property: the incremental average equals a naive average over the
    /// most recent `capacity` samples.
    #[test]
    fn prop_window_average_matches_naive(
        capacity in 1usize..50,
        values in prop::collection::vec(0u64..1_000_000, 1..200),
    ) {
        let mut window = MovingWindow::new(capacity);

        for (i, v) in values.iter().enumerate() {
            window.push(*v);

            let live = &values[i.saturating_sub(capacity - 1)..=i];
            let expected = live.iter().sum::<u64>() / live.len() as u64;
            prop_assert_eq!(window.average(), expected);
            prop_assert_eq!(window.count(), live.len());
        }
    }
}
