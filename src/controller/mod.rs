//! Mode controller - the splitter's coarse operating regime
//!
//! A small finite state machine over five modes, stepped once per
//! monitor tick from window statistics. The mode decides how and how
//! often the split ratio is recomputed: continuously while warming up or
//! congested, exactly once when the load stabilizes, never while idle
//! traffic persists or after a cache failure.

use std::fmt;

use tracing::debug;

use crate::config::SplitterConfig;

/// Operating regime of the control loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// No meaningful traffic; ratio parked at the default
    Idle,
    /// Traffic arrived but the windows are still filling
    Warmup,
    /// Windows full, latency near baseline; ratio frozen
    Stable,
    /// Latency well above baseline; ratio retuned every tick
    Congestion,
    /// Cache device reported failed; ratio held as-is
    Failure,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Idle => write!(f, "idle"),
            Mode::Warmup => write!(f, "warmup"),
            Mode::Stable => write!(f, "stable"),
            Mode::Congestion => write!(f, "congestion"),
            Mode::Failure => write!(f, "failure"),
        }
    }
}

/// Inputs to one controller step, derived each monitor tick
#[derive(Debug, Clone, Copy)]
pub struct TickMetrics {
    /// Raw throughput from the latest sample
    pub rdma_bw: u64,
    /// Raw IOPS from the latest sample
    pub iops: u64,
    /// Throughput drop below baseline, permil
    pub bw_drop_permil: u64,
    /// Latency increase above baseline, permil
    pub lat_increase_permil: u64,
    /// True once the throughput window is full
    pub window_full: bool,
    /// Host signal that the cache device failed
    pub caching_failed: bool,
}

/// Finite state machine over the five operating modes
#[derive(Debug)]
pub struct ModeController {
    mode: Mode,
    initialized: bool,
    stable_calc_done: bool,
    rdma_low: u64,
    iops_low: u64,
    lat_congestion_permil: u64,
    lat_recovery_permil: u64,
}

impl ModeController {
    /// Create a controller in `Idle`
    pub fn new(config: &SplitterConfig) -> Self {
        Self {
            mode: Mode::Idle,
            initialized: false,
            stable_calc_done: false,
            rdma_low: config.rdma_low,
            iops_low: config.iops_low,
            lat_congestion_permil: config.lat_congestion_permil,
            lat_recovery_permil: config.lat_recovery_permil,
        }
    }

    /// Advance the state machine by one tick and return the new mode.
    ///
    /// The low-traffic check runs first: any mode drops back to `Idle`
    /// when both throughput and IOPS sit at or below their floors. With
    /// traffic present, only the listed transitions fire; everything else
    /// keeps the current mode.
    pub fn step(&mut self, m: &TickMetrics) -> Mode {
        let previous = self.mode;

        if m.rdma_bw <= self.rdma_low && m.iops <= self.iops_low {
            self.mode = Mode::Idle;
        } else {
            match self.mode {
                Mode::Idle => {
                    self.mode = Mode::Warmup;
                    self.initialized = false;
                }
                Mode::Warmup if m.window_full => {
                    self.mode = Mode::Stable;
                    self.stable_calc_done = false;
                }
                Mode::Congestion if m.lat_increase_permil < self.lat_recovery_permil => {
                    self.mode = Mode::Stable;
                    self.stable_calc_done = false;
                }
                Mode::Stable if m.lat_increase_permil > self.lat_congestion_permil => {
                    self.mode = Mode::Congestion;
                    self.stable_calc_done = true;
                }
                _ if m.caching_failed => {
                    self.mode = Mode::Failure;
                }
                _ => {}
            }
        }

        if previous != self.mode {
            debug!(
                from = %previous,
                to = %self.mode,
                rdma_bw = m.rdma_bw,
                iops = m.iops,
                bw_drop_permil = m.bw_drop_permil,
                lat_increase_permil = m.lat_increase_permil,
                "mode transition"
            );
        }

        self.mode
    }

    /// Current mode
    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// True once the idle-mode default ratio has been applied
    pub fn initialized(&self) -> bool {
        self.initialized
    }

    /// Record that the idle-mode default ratio has been applied
    pub fn mark_initialized(&mut self) {
        self.initialized = true;
    }

    /// True once the one-shot stable-mode ratio computation has run
    pub fn stable_calc_done(&self) -> bool {
        self.stable_calc_done
    }

    /// Record that the one-shot stable-mode ratio computation has run
    pub fn mark_stable_calc_done(&mut self) {
        self.stable_calc_done = true;
    }

    /// Return to the post-construction state
    pub fn reset(&mut self) {
        self.mode = Mode::Idle;
        self.initialized = false;
        self.stable_calc_done = false;
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn controller() -> ModeController {
        ModeController::new(&SplitterConfig::default())
    }

    fn quiet() -> TickMetrics {
        TickMetrics {
            rdma_bw: 50,
            iops: 500,
            bw_drop_permil: 0,
            lat_increase_permil: 0,
            window_full: false,
            caching_failed: false,
        }
    }

    fn busy() -> TickMetrics {
        TickMetrics {
            rdma_bw: 10_000,
            iops: 20_000,
            bw_drop_permil: 0,
            lat_increase_permil: 0,
            window_full: false,
            caching_failed: false,
        }
    }

    #[test]
    fn test_starts_idle() {
        assert_eq!(controller().mode(), Mode::Idle);
    }

    #[test]
    fn test_idle_holds_without_traffic() {
        let mut ctl = controller();
        assert_eq!(ctl.step(&quiet()), Mode::Idle);
        assert_eq!(ctl.step(&quiet()), Mode::Idle);
    }

    #[test]
    fn test_idle_to_warmup_on_traffic() {
        let mut ctl = controller();
        assert_eq!(ctl.step(&busy()), Mode::Warmup);
        assert!(!ctl.initialized());
    }

    #[test]
    fn test_either_metric_above_floor_leaves_idle() {
        // low throughput but busy IOPS still counts as traffic
        let mut ctl = controller();
        let m = TickMetrics {
            rdma_bw: 50,
            iops: 20_000,
            ..busy()
        };
        assert_eq!(ctl.step(&m), Mode::Warmup);
    }

    #[test]
    fn test_warmup_holds_until_window_full() {
        let mut ctl = controller();
        ctl.step(&busy());
        assert_eq!(ctl.step(&busy()), Mode::Warmup);

        let full = TickMetrics {
            window_full: true,
            ..busy()
        };
        assert_eq!(ctl.step(&full), Mode::Stable);
        assert!(!ctl.stable_calc_done());
    }

    #[test]
    fn test_stable_to_congestion_on_latency() {
        let mut ctl = controller();
        ctl.step(&busy());
        ctl.step(&TickMetrics {
            window_full: true,
            ..busy()
        });
        assert_eq!(ctl.mode(), Mode::Stable);

        // at the threshold: no transition
        let at = TickMetrics {
            window_full: true,
            lat_increase_permil: 70,
            ..busy()
        };
        assert_eq!(ctl.step(&at), Mode::Stable);

        let over = TickMetrics {
            window_full: true,
            lat_increase_permil: 71,
            ..busy()
        };
        assert_eq!(ctl.step(&over), Mode::Congestion);
        assert!(ctl.stable_calc_done());
    }

    #[test]
    fn test_congestion_to_stable_on_recovery() {
        let mut ctl = controller();
        ctl.step(&busy());
        ctl.step(&TickMetrics {
            window_full: true,
            ..busy()
        });
        ctl.step(&TickMetrics {
            window_full: true,
            lat_increase_permil: 100,
            ..busy()
        });
        assert_eq!(ctl.mode(), Mode::Congestion);

        // still above the recovery floor: stay congested
        let lingering = TickMetrics {
            window_full: true,
            lat_increase_permil: 50,
            ..busy()
        };
        assert_eq!(ctl.step(&lingering), Mode::Congestion);

        let recovered = TickMetrics {
            window_full: true,
            lat_increase_permil: 49,
            ..busy()
        };
        assert_eq!(ctl.step(&recovered), Mode::Stable);
        assert!(!ctl.stable_calc_done());
    }

    #[test]
    fn test_any_mode_drops_to_idle_on_low_traffic() {
        let mut ctl = controller();
        ctl.step(&busy());
        assert_eq!(ctl.mode(), Mode::Warmup);
        assert_eq!(ctl.step(&quiet()), Mode::Idle);

        ctl.step(&busy());
        ctl.step(&TickMetrics {
            window_full: true,
            ..busy()
        });
        ctl.step(&TickMetrics {
            window_full: true,
            lat_increase_permil: 100,
            ..busy()
        });
        assert_eq!(ctl.mode(), Mode::Congestion);
        assert_eq!(ctl.step(&quiet()), Mode::Idle);
    }

    #[test]
    fn test_caching_failure_enters_failure_mode() {
        let mut ctl = controller();
        ctl.step(&busy());
        assert_eq!(ctl.mode(), Mode::Warmup);

        let failed = TickMetrics {
            caching_failed: true,
            ..busy()
        };
        assert_eq!(ctl.step(&failed), Mode::Failure);
        // failure is sticky while traffic persists
        assert_eq!(ctl.step(&failed), Mode::Failure);
        assert_eq!(ctl.step(&busy()), Mode::Failure);
    }

    #[test]
    fn test_failure_still_drops_to_idle() {
        let mut ctl = controller();
        ctl.step(&busy());
        ctl.step(&TickMetrics {
            caching_failed: true,
            ..busy()
        });
        assert_eq!(ctl.mode(), Mode::Failure);
        assert_eq!(ctl.step(&quiet()), Mode::Idle);
    }

    #[test]
    fn test_window_progress_beats_failure_flag() {
        let mut ctl = controller();
        ctl.step(&busy());
        let m = TickMetrics {
            window_full: true,
            caching_failed: true,
            ..busy()
        };
        // the warmup-to-stable transition is checked first
        assert_eq!(ctl.step(&m), Mode::Stable);
    }

    #[test]
    fn test_reset() {
        let mut ctl = controller();
        ctl.step(&busy());
        ctl.mark_initialized();
        ctl.mark_stable_calc_done();

        ctl.reset();
        assert_eq!(ctl.mode(), Mode::Idle);
        assert!(!ctl.initialized());
        assert!(!ctl.stable_calc_done());
    }
}
