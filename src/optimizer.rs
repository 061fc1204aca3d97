//! Ratio optimizer
//!
//! Computes the cache fraction that maximizes aggregate throughput from
//! two table rows: `A`, the IOPS with everything on the cache, and `B`,
//! the IOPS with everything on the backend. The optimum is `A / (A + B)`
//! on the split scale. While the interconnect is congested the backend
//! figure is discounted by the observed bandwidth drop, pulling the
//! split toward the cache.

use std::sync::Arc;

use tracing::debug;

use crate::ratio::SPLIT_SCALE;
use crate::table::BandwidthLookup;

/// Computes the optimal split ratio from bandwidth-table figures
pub struct RatioOptimizer {
    table: Arc<dyn BandwidthLookup>,
    lat_congestion_permil: u64,
}

impl RatioOptimizer {
    /// Create an optimizer over the given table. `lat_congestion_permil`
    /// is the latency increase beyond which the backend penalty applies.
    pub fn new(table: Arc<dyn BandwidthLookup>, lat_congestion_permil: u64) -> Self {
        Self {
            table,
            lat_congestion_permil,
        }
    }

    /// Optimal ratio on the `0..=SPLIT_SCALE` scale.
    ///
    /// Degenerate table figures (`A + B == 0`) return `SPLIT_SCALE`:
    /// with no data, everything stays on the cache.
    pub fn optimal_ratio(
        &self,
        io_depth: u64,
        numjobs: u64,
        bw_drop_permil: u64,
        lat_increase_permil: u64,
    ) -> u64 {
        let cache_only = self.table.lookup_bw(io_depth, numjobs, 100);
        let mut backend_only = self.table.lookup_bw(io_depth, numjobs, 0);

        if lat_increase_permil > self.lat_congestion_permil {
            backend_only = backend_only * 1000u64.saturating_sub(bw_drop_permil) / 1000;
        }

        let ratio = if cache_only + backend_only == 0 {
            SPLIT_SCALE
        } else {
            (cache_only * SPLIT_SCALE / (cache_only + backend_only)).min(SPLIT_SCALE)
        };

        debug!(
            cache_only,
            backend_only, bw_drop_permil, lat_increase_permil, ratio, "split ratio computed"
        );

        ratio
    }
}

// =============================================================================
// Tests
// =============================================================================
