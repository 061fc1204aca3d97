//! Shared split-ratio store

use std::sync::atomic::{AtomicU64, Ordering};

/// Split-ratio scale: 10_000 means 100% of eligible requests to the cache.
/// Hundredths of a percent give the optimizer enough resolution without
/// leaving integer arithmetic.
pub const SPLIT_SCALE: u64 = 10_000;

/// Concurrent holder for the current optimal split ratio.
///
/// Read on every dispatch, written only by the control path. The ratio
/// is a single word and needs no consistency with other control state,
/// so a plain atomic stands in for a reader-writer lock: dispatch-path
/// loads never contend with control-path stores.
#[derive(Debug)]
pub struct RatioStore {
    ratio: AtomicU64,
}

impl RatioStore {
    /// Create a store holding the default ratio (everything to the cache)
    pub fn new() -> Self {
        Self {
            ratio: AtomicU64::new(SPLIT_SCALE),
        }
    }

    /// Current ratio, always in `0..=SPLIT_SCALE`
    pub fn load(&self) -> u64 {
        self.ratio.load(Ordering::Relaxed)
    }

    /// Store a new ratio, clamped to `0..=SPLIT_SCALE`
    pub fn store(&self, ratio: u64) {
        self.ratio.store(ratio.min(SPLIT_SCALE), Ordering::Relaxed);
    }

    /// Return to the default ratio
    pub fn reset(&self) {
        self.store(SPLIT_SCALE);
    }
}

impl Default for RatioStore {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Tests
// =============================================================================
