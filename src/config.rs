//! Splitter configuration

use crate::error::{Error, Result};

/// Tunable parameters for the adaptive splitter.
///
/// The defaults describe the operating point the bandwidth table was
/// profiled at (`io_depth = 16`, `numjobs = 1`) and the thresholds the
/// mode controller was tuned with. All permil values are parts per
/// thousand (70 permil = 7.0%).
#[derive(Debug, Clone)]
pub struct SplitterConfig {
    /// Capacity of the throughput and latency moving-average windows, in samples
    pub sample_window: usize,

    /// Dispatch accounting window, in requests
    pub dispatch_window: u32,

    /// Maximum length of the repeating cache/backend pattern
    pub max_pattern: u32,

    /// Monitor tick interval in milliseconds
    pub monitor_interval_ms: u64,

    /// Metrics log interval in milliseconds
    pub log_interval_ms: u64,

    /// Interconnect throughput at or below this counts as no traffic
    pub rdma_low: u64,

    /// IOPS at or below this counts as no traffic
    pub iops_low: u64,

    /// Latency increase (permil) above which congestion is entered
    pub lat_congestion_permil: u64,

    /// Latency increase (permil) below which congestion is exited
    pub lat_recovery_permil: u64,

    /// Bandwidth drop (permil) congestion threshold (reserved, not consulted)
    pub bw_congestion_permil: u64,

    /// Bandwidth drop (permil) recovery threshold (reserved, not consulted)
    pub bw_recovery_permil: u64,

    /// Latency samples to observe before freezing a baseline
    pub lat_stabilization_samples: u64,

    /// Queue depth the bandwidth table was profiled at
    pub io_depth: u64,

    /// Job count the bandwidth table was profiled at
    pub numjobs: u64,

    /// Host signal that the cache device has failed (reserved)
    pub caching_failed: bool,
}

impl Default for SplitterConfig {
    fn default() -> Self {
        Self {
            sample_window: 100,
            dispatch_window: 100,
            max_pattern: 10,
            monitor_interval_ms: 100,
            log_interval_ms: 1000,
            rdma_low: 100,
            iops_low: 1000,
            lat_congestion_permil: 70,
            lat_recovery_permil: 50,
            bw_congestion_permil: 90,
            bw_recovery_permil: 70,
            lat_stabilization_samples: 40,
            io_depth: 16,
            numjobs: 1,
            caching_failed: false,
        }
    }
}

impl SplitterConfig {
    /// Validate the configuration. Zero-sized windows or intervals would
    /// break the interval checks and window arithmetic.
    pub fn validate(&self) -> Result<()> {
        if self.sample_window == 0 {
            return Err(Error::Config("sample_window must be positive".into()));
        }
        if self.dispatch_window == 0 {
            return Err(Error::Config("dispatch_window must be positive".into()));
        }
        if self.max_pattern == 0 {
            return Err(Error::Config("max_pattern must be positive".into()));
        }
        if self.monitor_interval_ms == 0 {
            return Err(Error::Config("monitor_interval_ms must be positive".into()));
        }
        if self.log_interval_ms == 0 {
            return Err(Error::Config("log_interval_ms must be positive".into()));
        }
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================
