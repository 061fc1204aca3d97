//! Performance monitor
//!
//! Feeds interconnect samples into two moving-average windows and keeps
//! the best observation of each as the uncongested reference: the
//! maximum average throughput ever seen, and the minimum average latency
//! after a stabilization delay. The permil distances from those
//! baselines are what the mode controller and optimizer consume.

pub mod window;

#[cfg(test)]
mod proptest;

pub use window::MovingWindow;

use tracing::debug;

use crate::telemetry::PerfSample;

/// Moving windows plus congestion baselines over recent telemetry
#[derive(Debug, Clone)]
pub struct PerfMonitor {
    bw: MovingWindow,
    max_bw_avg: u64,
    lat: MovingWindow,
    min_lat_avg: u64,
    lat_established: bool,
    lat_samples_seen: u64,
    stabilization: u64,
}

impl PerfMonitor {
    /// Create a monitor with the given window capacity and latency
    /// stabilization delay (in samples)
    pub fn new(sample_window: usize, stabilization: u64) -> Self {
        Self {
            bw: MovingWindow::new(sample_window),
            max_bw_avg: 0,
            lat: MovingWindow::new(sample_window),
            min_lat_avg: u64::MAX,
            lat_established: false,
            lat_samples_seen: 0,
            stabilization,
        }
    }

    /// Feed one sample into both windows and refresh the baselines
    pub fn observe(&mut self, sample: &PerfSample) {
        let bw_avg = self.bw.push(sample.rdma_bw);
        if bw_avg > self.max_bw_avg {
            self.max_bw_avg = bw_avg;
            debug!(max_bw_avg = bw_avg, "new throughput baseline");
        }

        let lat_avg = self.lat.push(sample.rdma_lat_ns);
        self.lat_samples_seen += 1;

        // The first samples after startup carry warmup noise; freezing a
        // baseline from them would make every later reading look congested.
        if self.lat_samples_seen < self.stabilization {
            return;
        }

        if !self.lat_established {
            // a zero average means no valid latency reading yet
            if lat_avg > 0 {
                self.min_lat_avg = lat_avg;
                self.lat_established = true;
                debug!(
                    min_lat_avg = lat_avg,
                    samples = self.lat_samples_seen,
                    "latency baseline established"
                );
            }
        } else if lat_avg < self.min_lat_avg {
            self.min_lat_avg = lat_avg;
            debug!(min_lat_avg = lat_avg, "new latency baseline");
        }
    }

    /// Throughput drop below the best observed average, in permil
    pub fn bw_drop_permil(&self) -> u64 {
        if self.max_bw_avg == 0 {
            return 0;
        }
        self.max_bw_avg.saturating_sub(self.bw.average()) * 1000 / self.max_bw_avg
    }

    /// Latency increase above the established baseline, in permil.
    /// Zero until the baseline exists; saturates at zero when the
    /// current average sits below the baseline.
    pub fn lat_increase_permil(&self) -> u64 {
        if !self.lat_established || self.min_lat_avg == u64::MAX || self.min_lat_avg == 0 {
            return 0;
        }
        self.lat.average().saturating_sub(self.min_lat_avg) * 1000 / self.min_lat_avg
    }

    /// True once the throughput window holds a full capacity of samples
    pub fn window_full(&self) -> bool {
        self.bw.is_full()
    }

    /// Samples observed so far, up to the window capacity
    pub fn sample_count(&self) -> usize {
        self.bw.count()
    }

    /// Current throughput window average
    pub fn bw_average(&self) -> u64 {
        self.bw.average()
    }

    /// Current latency window average
    pub fn lat_average(&self) -> u64 {
        self.lat.average()
    }

    /// Best average throughput observed this run
    pub fn max_bw_avg(&self) -> u64 {
        self.max_bw_avg
    }

    /// Best average latency observed since the baseline was established;
    /// `u64::MAX` while unestablished
    pub fn min_lat_avg(&self) -> u64 {
        self.min_lat_avg
    }

    /// True once the latency baseline has been frozen
    pub fn baseline_established(&self) -> bool {
        self.lat_established
    }

    /// Discard all samples and baselines
    pub fn reset(&mut self) {
        self.bw.reset();
        self.max_bw_avg = 0;
        self.lat.reset();
        self.min_lat_avg = u64::MAX;
        self.lat_established = false;
        self.lat_samples_seen = 0;
    }
}

// =============================================================================
// Tests
// =============================================================================
