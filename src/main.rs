//! CacheGate workload simulator
//!
//! Drives the adaptive splitter through a deterministic congestion
//! trace (idle, warmup, stable load, interconnect congestion, recovery)
//! and logs how the mode and split ratio respond. The clock is advanced
//! manually, one monitor interval per tick, so runs are instant and
//! reproducible.
//!
//! ```text
//! cachegate --requests-per-tick 64 --table profile.json
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use clap::Parser;
use tracing::{info, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cachegate::{
    BandwidthTable, HitClassifier, ManualClock, PerfSample, ReplaySource, Splitter,
    SplitterConfig, TableEntry,
};

// =============================================================================
// CLI Arguments
// =============================================================================

/// CacheGate simulator - replay a congestion trace against the splitter
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Bandwidth table JSON file (built-in profile when omitted)
    #[arg(long, env = "CACHEGATE_TABLE")]
    table: Option<String>,

    /// Requests dispatched per 100 ms monitor tick
    #[arg(long, env = "CACHEGATE_REQUESTS_PER_TICK", default_value = "64")]
    requests_per_tick: u32,

    /// Monitor ticks per trace phase
    #[arg(long, env = "CACHEGATE_PHASE_TICKS", default_value = "150")]
    phase_ticks: u32,

    /// Mark every Nth request a cache miss (0 disables misses)
    #[arg(long, env = "CACHEGATE_MISS_EVERY", default_value = "0")]
    miss_every: u64,

    /// Enable verbose per-request logging in the splitter
    #[arg(long, env = "CACHEGATE_DEBUG")]
    debug: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Output logs as JSON
    #[arg(long, env = "LOG_JSON")]
    log_json: bool,
}

// =============================================================================
// Collaborators
// =============================================================================

/// Classifier marking every Nth request a miss
struct ModuloMiss {
    every: u64,
    seen: AtomicU64,
}

impl ModuloMiss {
    fn new(every: u64) -> Self {
        Self {
            every,
            seen: AtomicU64::new(0),
        }
    }
}

impl HitClassifier<u64> for ModuloMiss {
    fn is_miss(&self, _req: &u64) -> bool {
        if self.every == 0 {
            return false;
        }
        let n = self.seen.fetch_add(1, Ordering::Relaxed) + 1;
        n % self.every == 0
    }
}

/// Built-in profile for the default operating point (io_depth 16, one job).
/// IOPS rise as more traffic lands on the cache device.
fn builtin_table() -> BandwidthTable {
    let points = [
        (0, 120_000),
        (10, 150_000),
        (20, 178_000),
        (30, 205_000),
        (40, 230_000),
        (50, 254_000),
        (60, 280_000),
        (70, 306_000),
        (80, 330_000),
        (90, 356_000),
        (100, 380_000),
    ];
    let entries = points.map(|(split_pct, iops)| TableEntry {
        io_depth: 16,
        numjobs: 1,
        split_pct,
        iops,
    });

    // the built-in entries are all within range
    BandwidthTable::from_entries(entries).unwrap_or_default()
}

/// The scripted trace: one sample per monitor tick, `ticks` per phase
fn queue_trace(source: &ReplaySource, ticks: u32) {
    let phases = [
        // idle: below both traffic floors
        (
            "idle",
            PerfSample {
                rdma_bw: 50,
                rdma_lat_ns: 0,
                iops: 500,
                wall_ms: 0,
            },
        ),
        // steady load: windows fill, baselines freeze
        (
            "steady",
            PerfSample {
                rdma_bw: 10_000,
                rdma_lat_ns: 500_000,
                iops: 20_000,
                wall_ms: 0,
            },
        ),
        // congestion: latency up, throughput down
        (
            "congestion",
            PerfSample {
                rdma_bw: 6_000,
                rdma_lat_ns: 1_200_000,
                iops: 12_000,
                wall_ms: 0,
            },
        ),
        // recovery: back to the steady operating point
        (
            "recovery",
            PerfSample {
                rdma_bw: 10_000,
                rdma_lat_ns: 500_000,
                iops: 20_000,
                wall_ms: 0,
            },
        ),
    ];

    for (name, sample) in phases {
        info!(phase = name, ticks, ?sample, "queued trace phase");
        source.push_repeated(sample, ticks as usize);
    }
}

// =============================================================================
// Main
// =============================================================================

fn main() -> cachegate::Result<()> {
    let args = Args::parse();

    init_logging(&args);

    info!("Starting CacheGate simulator");
    info!("  Requests per tick: {}", args.requests_per_tick);
    info!("  Ticks per phase: {}", args.phase_ticks);
    info!("  Miss every: {}", args.miss_every);

    let table = match &args.table {
        Some(path) => {
            let table = BandwidthTable::load_json(path)?;
            info!("Loaded bandwidth table from {} ({} points)", path, table.len());
            table
        }
        None => {
            info!("Using built-in bandwidth table");
            builtin_table()
        }
    };

    let source = Arc::new(ReplaySource::new());
    queue_trace(&source, args.phase_ticks);
    let total_ticks = args.phase_ticks as u64 * 4;

    let clock = Arc::new(ManualClock::new());
    let config = SplitterConfig::default();
    let monitor_interval = config.monitor_interval_ms;

    let splitter = Splitter::with_config(
        config,
        Arc::new(table),
        source,
        Arc::new(ModuloMiss::new(args.miss_every)),
        clock.clone(),
    )?;

    if args.debug {
        splitter.set_debug(1);
    }

    let mut request_id = 0u64;
    let mut backend_total = 0u64;

    for tick in 0..total_ticks {
        clock.advance(monitor_interval);

        for _ in 0..args.requests_per_tick {
            request_id += 1;
            if splitter.should_send_to_backend(&request_id) {
                backend_total += 1;
            }
        }

        // phase boundary summaries
        if (tick + 1) % args.phase_ticks as u64 == 0 {
            let stats = splitter.dispatch_stats();
            info!(
                tick = tick + 1,
                mode = %splitter.mode(),
                ratio = splitter.current_ratio(),
                window_cache = stats.cache_count,
                window_backend = stats.backend_count,
                "phase complete"
            );
        }
    }

    let cache_total = request_id - backend_total;
    info!(
        requests = request_id,
        cache_total,
        backend_total,
        final_ratio = splitter.current_ratio(),
        final_mode = %splitter.mode(),
        "simulation complete"
    );

    Ok(())
}

// =============================================================================
// Logging Setup
// =============================================================================

fn init_logging(args: &Args) {
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let filter = EnvFilter::from_default_env().add_directive(level.into());

    if args.log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer())
            .init();
    }
}
