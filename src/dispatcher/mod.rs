//! Request dispatcher
//!
//! Realizes the target split ratio deterministically over a sliding
//! 100-request window. Each window gets a cache/backend quota plus a
//! short repeating pattern derived from the ratio; per request the
//! dispatcher compares actual counts against the expected fraction and
//! routes to whichever side is behind. Short-term deviation from the
//! target stays within `max_pattern + 1` requests.
//!
//! The state sits behind a single `parking_lot` mutex; the critical
//! section is constant-time and allocation-free, so concurrent
//! submitters serialize only briefly.

#[cfg(test)]
mod proptest;

use std::fmt;

use parking_lot::Mutex;
use tracing::trace;

use crate::config::SplitterConfig;
use crate::ratio::SPLIT_SCALE;

/// Verdict for one request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// Serve from the local cache device
    Cache,
    /// Bypass to the remote backend
    Backend,
}

impl Route {
    /// True when the request bypasses the cache
    pub fn is_backend(self) -> bool {
        matches!(self, Route::Backend)
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Route::Cache => write!(f, "cache"),
            Route::Backend => write!(f, "backend"),
        }
    }
}

/// Snapshot of dispatch accounting, for logs and tests
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchStats {
    /// Requests dispatched since init, across all windows
    pub request_counter: u64,
    /// Requests dispatched in the current window, misses included
    pub total: u32,
    /// Hits routed to the cache in the current window
    pub cache_count: u32,
    /// Hits routed to the backend in the current window
    pub backend_count: u32,
    /// Remaining cache quota in the current window
    pub cache_quota: u32,
    /// Remaining backend quota in the current window
    pub backend_quota: u32,
    /// Length of the repeating pattern
    pub pattern_size: u32,
    /// Cache slots in the pattern
    pub pattern_cache: u32,
    /// Backend slots in the pattern
    pub pattern_backend: u32,
}

#[derive(Debug, Default)]
struct DispatchState {
    request_counter: u64,
    total: u32,
    cache_count: u32,
    backend_count: u32,
    cache_quota: u32,
    backend_quota: u32,
    pattern_size: u32,
    pattern_cache: u32,
    pattern_backend: u32,
    pattern_pos: u32,
    last_to_cache: bool,
}

/// Per-request decision engine
#[derive(Debug)]
pub struct Dispatcher {
    state: Mutex<DispatchState>,
    window: u32,
    max_pattern: u32,
}

impl Dispatcher {
    /// Create a dispatcher with an empty accounting window
    pub fn new(config: &SplitterConfig) -> Self {
        Self {
            state: Mutex::new(DispatchState::default()),
            window: config.dispatch_window,
            max_pattern: config.max_pattern,
        }
    }

    /// Route one request.
    ///
    /// `ratio` is a snapshot of the current split ratio on the
    /// `0..=SPLIT_SCALE` scale. Misses always bypass to the backend and
    /// consume no quota; they still advance the window so the plan is
    /// re-derived on schedule.
    pub fn dispatch(&self, ratio: u64, miss: bool) -> Route {
        let pct = (ratio.min(SPLIT_SCALE) * 100 / SPLIT_SCALE) as u32;
        let mut st = self.state.lock();

        if st.request_counter % u64::from(self.window) == 0 || st.pattern_size == 0 {
            self.plan_window(&mut st, pct);
        }

        st.request_counter += 1;
        st.total += 1;

        if miss {
            return Route::Backend;
        }

        let route = route_hit(&mut st, pct, self.window);

        match route {
            Route::Cache => {
                st.cache_quota = st.cache_quota.saturating_sub(1);
                st.cache_count += 1;
                st.last_to_cache = true;
            }
            Route::Backend => {
                st.backend_quota = st.backend_quota.saturating_sub(1);
                st.backend_count += 1;
                st.last_to_cache = false;
            }
        }

        route
    }

    /// Derive the quota and repeating pattern for a fresh window
    fn plan_window(&self, st: &mut DispatchState, pct: u32) {
        let a = pct.min(self.window);
        let b = self.window - a;

        let g = gcd(a, b);
        st.pattern_size = ((a + b) / g).min(self.max_pattern);
        st.pattern_cache = a * st.pattern_size / self.window;
        st.pattern_backend = st.pattern_size - st.pattern_cache;

        st.total = 0;
        st.cache_count = 0;
        st.backend_count = 0;
        st.pattern_pos = 0;
        st.cache_quota = a;
        st.backend_quota = b;

        trace!(
            cache_quota = a,
            backend_quota = b,
            pattern_size = st.pattern_size,
            pattern_cache = st.pattern_cache,
            "window plan"
        );
    }

    /// Snapshot of the current accounting state
    pub fn stats(&self) -> DispatchStats {
        let st = self.state.lock();
        DispatchStats {
            request_counter: st.request_counter,
            total: st.total,
            cache_count: st.cache_count,
            backend_count: st.backend_count,
            cache_quota: st.cache_quota,
            backend_quota: st.backend_quota,
            pattern_size: st.pattern_size,
            pattern_cache: st.pattern_cache,
            pattern_backend: st.pattern_backend,
        }
    }

    /// Discard all accounting state
    pub fn reset(&self) {
        *self.state.lock() = DispatchState::default();
    }
}

/// Verdict for a hit, given the expected cache fraction so far.
///
/// The first two arms keep the realized counts tracking the expected
/// fraction; the pattern and quota arms break ties when both sides sit
/// at their expectation.
fn route_hit(st: &mut DispatchState, pct: u32, window: u32) -> Route {
    let exp_cache = st.total * pct / window;
    let exp_backend = st.total - exp_cache;

    if st.cache_count < exp_cache {
        Route::Cache
    } else if st.backend_count < exp_backend {
        Route::Backend
    } else if st.pattern_pos < st.pattern_size {
        let to_backend = st.pattern_pos >= st.pattern_cache;
        st.pattern_pos = (st.pattern_pos + 1) % st.pattern_size;
        if to_backend {
            Route::Backend
        } else {
            Route::Cache
        }
    } else if st.cache_quota == 0 {
        Route::Backend
    } else if st.backend_quota == 0 {
        Route::Cache
    } else if st.last_to_cache {
        // both quotas open: alternate with the previous choice
        Route::Backend
    } else {
        Route::Cache
    }
}

/// Euclidean gcd with the window edge cases pinned:
/// `gcd(x, 0) = x`, `gcd(0, y) = y`, `gcd(0, 0) = 1`.
fn gcd(a: u32, b: u32) -> u32 {
    if a == 0 && b == 0 {
        return 1;
    }
    let (mut a, mut b) = (a, b);
    while b != 0 {
        let t = b;
        b = a % b;
        a = t;
    }
    a
}

// =============================================================================
// Tests
// =============================================================================
