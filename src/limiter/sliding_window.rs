//! Local sliding window admission control.

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::clock::{Clock, MonotonicClock};
use crate::config::SlidingWindowConfig;
use crate::error::Result;
use crate::limiter::RateLimiter;

/// Evaluates admissions over a continuously moving window by retaining the
/// timestamp of every admission still inside it.
///
/// Each attempt purges timestamps that fell out of the window before
/// counting, so bookkeeping is O(window occupancy). Memory stays bounded by
/// `max_requests` because rejected attempts are never recorded.
pub struct SlidingWindowLimiter {
    config: SlidingWindowConfig,
    clock: Arc<dyn Clock>,
    admitted: Mutex<VecDeque<u64>>,
}

impl SlidingWindowLimiter {
    /// Create a limiter over the process-monotonic clock.
    pub fn new(config: SlidingWindowConfig) -> Result<Self> {
        Self::with_clock(config, Arc::new(MonotonicClock::new()))
    }

    /// Create a limiter reading time from `clock`.
    pub fn with_clock(config: SlidingWindowConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        config.validate()?;
        debug!(
            window_ms = config.window_ms,
            max_requests = config.max_requests,
            "Creating sliding window limiter"
        );

        Ok(Self {
            config,
            clock,
            admitted: Mutex::new(VecDeque::new()),
        })
    }

    /// Admit or reject one request against the window ending now.
    pub fn try_acquire(&self) -> bool {
        let now = self.clock.now_millis();
        let mut admitted = self.admitted.lock();
        Self::purge(&mut admitted, now, self.config.window_ms);

        if (admitted.len() as u64) < self.config.max_requests {
            admitted.push_back(now);
            true
        } else {
            trace!(count = admitted.len(), "Sliding window limit exceeded");
            false
        }
    }

    /// Admissions currently inside the window.
    pub fn current_count(&self) -> usize {
        let now = self.clock.now_millis();
        let mut admitted = self.admitted.lock();
        Self::purge(&mut admitted, now, self.config.window_ms);
        admitted.len()
    }

    /// Drop timestamps at or below `now - window_ms`. Timestamps are pushed
    /// in nondecreasing order, so purging stops at the first survivor.
    fn purge(admitted: &mut VecDeque<u64>, now: u64, window_ms: u64) {
        let Some(horizon) = now.checked_sub(window_ms) else {
            return;
        };
        while admitted.front().is_some_and(|&ts| ts <= horizon) {
            admitted.pop_front();
        }
    }
}

#[async_trait]
impl RateLimiter for SlidingWindowLimiter {
    async fn try_acquire(&self) -> Result<bool> {
        Ok(SlidingWindowLimiter::try_acquire(self))
    }
}
