//! Fixed window admission control.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::clock::{Clock, MonotonicClock};
use crate::config::FixedWindowConfig;
use crate::error::Result;
use crate::limiter::RateLimiter;

/// Counts admissions in a window that re-anchors to the first request
/// observed after the previous window lapsed.
///
/// Because the window follows the traffic instead of wall-clock boundaries,
/// a burst of up to `2 * max_requests` can land around a boundary. That is
/// the algorithm's accepted imprecision, kept as-is; callers that need
/// exactness use a sliding window variant.
pub struct FixedWindowLimiter {
    config: FixedWindowConfig,
    clock: Arc<dyn Clock>,
    state: Mutex<WindowState>,
}

/// Window anchor plus admissions since the anchor.
#[derive(Debug)]
struct WindowState {
    window_start: u64,
    count: u64,
}

impl FixedWindowLimiter {
    /// Create a limiter over the process-monotonic clock.
    pub fn new(config: FixedWindowConfig) -> Result<Self> {
        Self::with_clock(config, Arc::new(MonotonicClock::new()))
    }

    /// Create a limiter reading time from `clock`.
    pub fn with_clock(config: FixedWindowConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        config.validate()?;
        debug!(
            window_ms = config.window_ms,
            max_requests = config.max_requests,
            "Creating fixed window limiter"
        );

        let window_start = clock.now_millis();
        Ok(Self {
            config,
            clock,
            state: Mutex::new(WindowState {
                window_start,
                count: 0,
            }),
        })
    }

    /// Admit or reject one request. Never blocks beyond the short critical
    /// section guarding the window pair.
    pub fn try_acquire(&self) -> bool {
        let now = self.clock.now_millis();
        let mut state = self.state.lock();

        if now.saturating_sub(state.window_start) > self.config.window_ms {
            trace!(
                window_start = state.window_start,
                now,
                "Window lapsed, re-anchoring"
            );
            state.count = 0;
            state.window_start = now;
        }

        if state.count < self.config.max_requests {
            state.count += 1;
            true
        } else {
            trace!(count = state.count, "Fixed window limit exceeded");
            false
        }
    }

    /// Admissions recorded in the current window.
    pub fn current_count(&self) -> u64 {
        self.state.lock().count
    }

    /// Admissions left before the current window starts rejecting.
    pub fn remaining(&self) -> u64 {
        self.config.max_requests.saturating_sub(self.current_count())
    }
}

#[async_trait]
impl RateLimiter for FixedWindowLimiter {
    async fn try_acquire(&self) -> Result<bool> {
        Ok(FixedWindowLimiter::try_acquire(self))
    }
}
