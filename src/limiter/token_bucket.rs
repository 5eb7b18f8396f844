//! Token bucket admission control.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, trace};

use crate::config::TokenBucketConfig;
use crate::error::Result;
use crate::limiter::RateLimiter;
use crate::scheduler::Ticker;

/// Spends one token per admission from a pool replenished in the
/// background.
///
/// The pool starts empty and gains one token per refill interval, capped at
/// capacity, so a fresh limiter admits nothing until its first tick. The
/// admission path is lock-free: a compare-and-swap loop that retries only
/// while other callers are decrementing the same pool, and returns false
/// the moment zero tokens are observed.
pub struct TokenBucketLimiter {
    capacity: u64,
    tokens: Arc<AtomicU64>,
    refill: Ticker,
}

impl TokenBucketLimiter {
    /// Create the limiter and start its refill schedule.
    ///
    /// Must be called within a tokio runtime.
    pub fn new(config: TokenBucketConfig) -> Result<Self> {
        config.validate()?;
        debug!(
            capacity = config.capacity,
            refill_interval_ms = config.refill_interval_ms,
            "Creating token bucket limiter"
        );

        let tokens = Arc::new(AtomicU64::new(0));
        let capacity = config.capacity;

        let pool = Arc::clone(&tokens);
        let refill = Ticker::spawn(
            "token-bucket-refill",
            Duration::from_millis(config.refill_interval_ms),
            move || {
                let refilled = pool.fetch_update(Ordering::AcqRel, Ordering::Acquire, |tokens| {
                    (tokens < capacity).then(|| tokens + 1)
                });
                if let Ok(before) = refilled {
                    trace!(tokens = before + 1, "Token refilled");
                }
            },
        );

        Ok(Self {
            capacity,
            tokens,
            refill,
        })
    }

    /// Take one token if any are available.
    pub fn try_acquire(&self) -> bool {
        let mut observed = self.tokens.load(Ordering::Acquire);
        loop {
            if observed == 0 {
                return false;
            }
            match self.tokens.compare_exchange_weak(
                observed,
                observed - 1,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return true,
                Err(current) => observed = current,
            }
        }
    }

    /// Tokens currently available.
    pub fn available(&self) -> u64 {
        self.tokens.load(Ordering::Acquire)
    }

    /// Maximum tokens the pool can hold.
    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    /// Stop the refill schedule. Admissions keep draining whatever tokens
    /// remain.
    pub fn shutdown(&self) {
        self.refill.stop();
    }
}

#[async_trait]
impl RateLimiter for TokenBucketLimiter {
    async fn try_acquire(&self) -> Result<bool> {
        Ok(TokenBucketLimiter::try_acquire(self))
    }
}
