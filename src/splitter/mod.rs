//! Splitter facade
//!
//! Owns the whole control loop and exposes the host-facing API: a
//! per-request cache-or-backend verdict and a periodic tick that keeps
//! the split ratio tuned to the interconnect. All state lives in this
//! one value; hosts share it across submitter threads behind an `Arc`.
//!
//! ```text
//! should_send_to_backend(req)
//!   └─ periodic tick (rate-limited)
//!        ├─ PerfSource::measure  → PerfMonitor::observe
//!        ├─ ModeController::step → per-mode ratio action
//!        └─ metrics log line (1 Hz)
//!   └─ ratio snapshot → Dispatcher::dispatch → bool
//! ```
//!
//! There is no timer thread: the tick piggybacks on dispatch calls, so a
//! quiet device simply stops retuning.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info};

use crate::clock::{MonotonicClock, SystemClock};
use crate::config::SplitterConfig;
use crate::controller::{Mode, ModeController, TickMetrics};
use crate::dispatcher::{DispatchStats, Dispatcher};
use crate::error::Result;
use crate::monitor::PerfMonitor;
use crate::optimizer::RatioOptimizer;
use crate::ratio::{RatioStore, SPLIT_SCALE};
use crate::table::BandwidthLookup;
use crate::telemetry::{PerfSample, PerfSource};

/// Hit/miss verdict for an opaque request handle, supplied by the host
/// cache engine's lookup path. Misses always bypass to the backend.
pub trait HitClassifier<R: ?Sized>: Send + Sync {
    /// True when the request cannot be served from the cache
    fn is_miss(&self, req: &R) -> bool;
}

/// Control-path state. One mutex guards all of it; updates run at the
/// monitor frequency, so coarse locking beats fine-grained here.
struct ControlState {
    monitor: PerfMonitor,
    controller: ModeController,
    last_monitor_ms: u64,
    last_log_ms: u64,
    last_sample: PerfSample,
    bw_drop_permil: u64,
    lat_increase_permil: u64,
}

/// Adaptive request splitter for a hybrid cache
pub struct Splitter<R: ?Sized> {
    config: SplitterConfig,
    clock: Arc<dyn MonotonicClock>,
    source: Arc<dyn PerfSource>,
    classifier: Arc<dyn HitClassifier<R>>,
    optimizer: RatioOptimizer,
    ratio: RatioStore,
    control: Mutex<ControlState>,
    dispatcher: Dispatcher,
    debug_enabled: AtomicBool,
}

impl<R: ?Sized> Splitter<R> {
    /// Create a splitter with the default configuration and system clock
    pub fn new(
        table: Arc<dyn BandwidthLookup>,
        source: Arc<dyn PerfSource>,
        classifier: Arc<dyn HitClassifier<R>>,
    ) -> Self {
        Self::build(
            SplitterConfig::default(),
            table,
            source,
            classifier,
            Arc::new(SystemClock::new()),
        )
    }

    /// Create a splitter with a custom configuration and clock
    pub fn with_config(
        config: SplitterConfig,
        table: Arc<dyn BandwidthLookup>,
        source: Arc<dyn PerfSource>,
        classifier: Arc<dyn HitClassifier<R>>,
        clock: Arc<dyn MonotonicClock>,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self::build(config, table, source, classifier, clock))
    }

    fn build(
        config: SplitterConfig,
        table: Arc<dyn BandwidthLookup>,
        source: Arc<dyn PerfSource>,
        classifier: Arc<dyn HitClassifier<R>>,
        clock: Arc<dyn MonotonicClock>,
    ) -> Self {
        let control = ControlState {
            monitor: PerfMonitor::new(config.sample_window, config.lat_stabilization_samples),
            controller: ModeController::new(&config),
            last_monitor_ms: 0,
            last_log_ms: 0,
            last_sample: PerfSample::default(),
            bw_drop_permil: 0,
            lat_increase_permil: 0,
        };

        Self {
            optimizer: RatioOptimizer::new(table, config.lat_congestion_permil),
            dispatcher: Dispatcher::new(&config),
            ratio: RatioStore::new(),
            control: Mutex::new(control),
            clock,
            source,
            classifier,
            debug_enabled: AtomicBool::new(false),
            config,
        }
    }

    /// Enable (non-zero) or disable (0) verbose per-request logging
    pub fn set_debug(&self, level: u8) {
        self.debug_enabled.store(level != 0, Ordering::Relaxed);
    }

    /// Decide whether a request bypasses the cache.
    ///
    /// Runs the periodic tick first, then realizes the current ratio.
    /// Infallible, allocation-free and safe under concurrent callers.
    pub fn should_send_to_backend(&self, req: &R) -> bool {
        self.update_split_ratio();

        let ratio = self.ratio.load();
        let miss = self.classifier.is_miss(req);
        let route = self.dispatcher.dispatch(ratio, miss);

        if self.debug_enabled.load(Ordering::Relaxed) {
            debug!(%route, miss, ratio, "dispatch");
        }

        route.is_backend()
    }

    /// Periodic tick: at most one monitor update per monitor interval
    /// and one metrics line per log interval.
    ///
    /// Contended calls return immediately; the lock holder is already
    /// doing this work, and the update is idempotent within an interval.
    pub fn update_split_ratio(&self) {
        let Some(mut ctl) = self.control.try_lock() else {
            return;
        };
        let now = self.clock.now_ms();

        if now.saturating_sub(ctl.last_monitor_ms) >= self.config.monitor_interval_ms {
            self.monitor_tick(&mut ctl);
            ctl.last_monitor_ms = now;
        }

        if now.saturating_sub(ctl.last_log_ms) >= self.config.log_interval_ms {
            self.log_metrics(&ctl);
            ctl.last_log_ms = now;
        }
    }

    /// Pull one sample, refresh the windows, step the mode machine and
    /// apply its ratio action
    fn monitor_tick(&self, ctl: &mut ControlState) {
        let sample = self.source.measure(self.config.monitor_interval_ms);
        ctl.monitor.observe(&sample);

        let metrics = TickMetrics {
            rdma_bw: sample.rdma_bw,
            iops: sample.iops,
            bw_drop_permil: ctl.monitor.bw_drop_permil(),
            lat_increase_permil: ctl.monitor.lat_increase_permil(),
            window_full: ctl.monitor.window_full(),
            caching_failed: self.config.caching_failed,
        };

        let mode = ctl.controller.step(&metrics);
        self.apply_mode_action(ctl, mode, &metrics);

        ctl.last_sample = sample;
        ctl.bw_drop_permil = metrics.bw_drop_permil;
        ctl.lat_increase_permil = metrics.lat_increase_permil;
    }

    fn apply_mode_action(&self, ctl: &mut ControlState, mode: Mode, m: &TickMetrics) {
        match mode {
            Mode::Idle => {
                if !ctl.controller.initialized() {
                    self.ratio.store(SPLIT_SCALE);
                    ctl.controller.mark_initialized();
                    debug!("idle: split ratio parked at default");
                }
            }
            Mode::Warmup => {
                // no-contention assumption while the windows fill
                let new = self
                    .optimizer
                    .optimal_ratio(self.config.io_depth, self.config.numjobs, 0, 0);
                if new != self.ratio.load() {
                    self.ratio.store(new);
                    debug!(ratio = new, rdma_bw = m.rdma_bw, iops = m.iops, "warmup: split ratio updated");
                }
            }
            Mode::Stable => {
                if !ctl.controller.stable_calc_done() && m.window_full {
                    let new = self.optimizer.optimal_ratio(
                        self.config.io_depth,
                        self.config.numjobs,
                        m.bw_drop_permil,
                        m.lat_increase_permil,
                    );
                    self.ratio.store(new);
                    ctl.controller.mark_stable_calc_done();
                    debug!(ratio = new, "stable: split ratio frozen");
                }
            }
            Mode::Congestion => {
                if m.window_full {
                    let new = self.optimizer.optimal_ratio(
                        self.config.io_depth,
                        self.config.numjobs,
                        m.bw_drop_permil,
                        m.lat_increase_permil,
                    );
                    if new != self.ratio.load() {
                        self.ratio.store(new);
                        debug!(
                            ratio = new,
                            bw_drop_permil = m.bw_drop_permil,
                            lat_increase_permil = m.lat_increase_permil,
                            "congestion: split ratio updated"
                        );
                    }
                }
            }
            Mode::Failure => {
                // hold the last good ratio
            }
        }
    }

    /// One human-readable line per log interval with the live metrics
    fn log_metrics(&self, ctl: &ControlState) {
        info!(
            rdma_bw = ctl.last_sample.rdma_bw,
            lat_avg_ns = ctl.monitor.lat_average(),
            lat_baseline_ns = ctl.monitor.min_lat_avg(),
            iops = ctl.last_sample.iops,
            bw_drop_permil = ctl.bw_drop_permil,
            lat_increase_permil = ctl.lat_increase_permil,
            mode = %ctl.controller.mode(),
            ratio = self.ratio.load(),
            "splitter metrics"
        );
    }

    /// Return to the post-construction state.
    ///
    /// Takes both the control and dispatch locks, so it serializes
    /// against any in-flight dispatch.
    pub fn reset(&self) {
        let mut ctl = self.control.lock();
        ctl.monitor.reset();
        ctl.controller.reset();
        ctl.last_monitor_ms = 0;
        ctl.last_log_ms = 0;
        ctl.last_sample = PerfSample::default();
        ctl.bw_drop_permil = 0;
        ctl.lat_increase_permil = 0;
        self.dispatcher.reset();
        self.ratio.reset();
        debug!("splitter reset");
    }

    /// Current split ratio on the `0..=SPLIT_SCALE` scale
    pub fn current_ratio(&self) -> u64 {
        self.ratio.load()
    }

    /// Current operating mode
    pub fn mode(&self) -> Mode {
        self.control.lock().controller.mode()
    }

    /// Snapshot of the dispatch accounting
    pub fn dispatch_stats(&self) -> DispatchStats {
        self.dispatcher.stats()
    }

    /// The active configuration
    pub fn config(&self) -> &SplitterConfig {
        &self.config
    }
}

// =============================================================================
// Tests
// =============================================================================
