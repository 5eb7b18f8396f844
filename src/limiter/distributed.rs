//! Distributed sliding window admission control.
//!
//! Counter state lives in an external scored store shared by any number of
//! limiter instances (e.g. replicas of one service); this type holds only
//! its key and configuration. The store is the sole arbiter of consistency.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, trace, warn};
use uuid::Uuid;

use crate::clock::{Clock, SystemClock};
use crate::config::{DistributedWindowConfig, FailurePolicy};
use crate::error::Result;
use crate::limiter::RateLimiter;
use crate::store::SortedSetStore;

/// Sliding window over a shared scored store.
///
/// Two admission paths exist. [`try_acquire_atomic`] hands the whole
/// prune/count/insert sequence to the store as one indivisible composite
/// and is safe under arbitrary concurrency; it is what the [`RateLimiter`]
/// impl uses. [`try_acquire`] issues the three operations separately and is
/// best-effort only.
///
/// [`try_acquire`]: DistributedSlidingWindowLimiter::try_acquire
/// [`try_acquire_atomic`]: DistributedSlidingWindowLimiter::try_acquire_atomic
pub struct DistributedSlidingWindowLimiter {
    config: DistributedWindowConfig,
    clock: Arc<dyn Clock>,
    store: Arc<dyn SortedSetStore>,
}

impl DistributedSlidingWindowLimiter {
    /// Create a limiter over the wall clock, which replicas share.
    pub fn new(config: DistributedWindowConfig, store: Arc<dyn SortedSetStore>) -> Result<Self> {
        Self::with_clock(config, store, Arc::new(SystemClock))
    }

    /// Create a limiter reading time from `clock`.
    pub fn with_clock(
        config: DistributedWindowConfig,
        store: Arc<dyn SortedSetStore>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        config.validate()?;
        debug!(
            key = %config.key,
            window_ms = config.window_ms,
            max_requests = config.max_requests,
            "Creating distributed sliding window limiter"
        );

        Ok(Self {
            config,
            clock,
            store,
        })
    }

    /// Best-effort admission: prune, count, and insert as three separate
    /// store operations.
    ///
    /// Two concurrent callers can both observe `count < max_requests`
    /// before either inserts, admitting past the limit. Use
    /// [`try_acquire_atomic`](Self::try_acquire_atomic) anywhere concurrent
    /// callers share a key; this path is for low-contention or
    /// single-writer keys only.
    pub async fn try_acquire(&self) -> Result<bool> {
        let now = self.clock.now_millis();
        let horizon = now.saturating_sub(self.config.window_ms);

        self.store
            .remove_scored_below(&self.config.key, horizon)
            .await?;
        let current = self.store.count_entries(&self.config.key).await?;

        if current < self.config.max_requests {
            self.store
                .insert_scored(&self.config.key, now, &member(now))
                .await?;
            Ok(true)
        } else {
            trace!(key = %self.config.key, current, "Distributed window limit exceeded");
            Ok(false)
        }
    }

    /// Admission through the store's indivisible prune/count/insert
    /// composite, serialized per key by the store. Concurrent callers can
    /// never over-admit on this path.
    pub async fn try_acquire_atomic(&self) -> Result<bool> {
        let now = self.clock.now_millis();
        let admitted = self
            .store
            .check_and_insert(
                &self.config.key,
                now,
                self.config.max_requests,
                self.config.window_ms,
            )
            .await?;

        if !admitted {
            trace!(key = %self.config.key, "Distributed window limit exceeded");
        }
        Ok(admitted)
    }

    /// Atomic admission with the configured failure policy applied: a store
    /// failure becomes a reject (fail-closed, the default) or an admit
    /// (fail-open) instead of an error.
    pub async fn try_acquire_with_policy(&self) -> bool {
        match self.try_acquire_atomic().await {
            Ok(admitted) => admitted,
            Err(error) => {
                let admitted = self.config.failure_policy == FailurePolicy::FailOpen;
                warn!(
                    key = %self.config.key,
                    %error,
                    admitted,
                    "Store unavailable, applying failure policy"
                );
                admitted
            }
        }
    }

    /// Entries currently scored inside the window.
    pub async fn current_count(&self) -> Result<u64> {
        let now = self.clock.now_millis();
        let horizon = now.saturating_sub(self.config.window_ms);

        self.store
            .remove_scored_below(&self.config.key, horizon)
            .await?;
        Ok(self.store.count_entries(&self.config.key).await?)
    }
}

/// Members carry a UUID suffix so same-millisecond admissions occupy
/// distinct entries.
fn member(now: u64) -> String {
    format!("{}-{}", now, Uuid::new_v4())
}

#[async_trait]
impl RateLimiter for DistributedSlidingWindowLimiter {
    async fn try_acquire(&self) -> Result<bool> {
        self.try_acquire_atomic().await
    }
}
