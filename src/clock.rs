//! Time sources for the rate limiters.
//!
//! Every limiter reads time through the [`Clock`] trait, so tests can
//! substitute a manually advanced clock and replay identical admission
//! sequences against identical configurations.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Instant, SystemTime, UNIX_EPOCH};

/// A millisecond time source. Successive readings never decrease.
pub trait Clock: Send + Sync {
    /// Current reading in milliseconds.
    fn now_millis(&self) -> u64;
}

/// Clock anchored to its own creation, backed by [`Instant`].
///
/// This is the default for in-process limiters: readings are monotonic and
/// immune to wall-clock adjustments.
#[derive(Debug)]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    /// Create a clock reading zero at this moment.
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now_millis(&self) -> u64 {
        self.origin.elapsed().as_millis() as u64
    }
}

/// Wall-clock milliseconds since the UNIX epoch.
///
/// The distributed sliding window scores store entries with this clock so
/// that replicas on different hosts agree on window boundaries.
#[derive(Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("system clock set before the UNIX epoch")
            .as_millis() as u64
    }
}

/// Manually advanced clock for deterministic tests.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicU64,
}

impl ManualClock {
    /// Create a clock reading `start_millis`.
    pub fn new(start_millis: u64) -> Self {
        Self {
            now: AtomicU64::new(start_millis),
        }
    }

    /// Move the clock forward by `millis`.
    pub fn advance(&self, millis: u64) {
        self.now.fetch_add(millis, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_millis(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }
}
