//! Leaky bucket admission control.

use std::panic::{self, AssertUnwindSafe};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, trace, warn};

use crate::config::LeakyBucketConfig;
use crate::error::Result;
use crate::limiter::RateLimiter;
use crate::scheduler::Ticker;

/// A unit of deferred work accepted by the bucket.
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Shapes the *rate of execution*, not just the rate of acceptance:
/// admission only enqueues, and a background drain runs queued work at the
/// configured leak interval in arrival order.
///
/// The queue is bounded. Offers against a full bucket are rejected
/// immediately; callers never block waiting for space or for execution.
/// Each drained item runs on its own task, so a panicking item is reported
/// and cannot stop the drain or corrupt the queue for items behind it.
pub struct LeakyBucketLimiter {
    queue: mpsc::Sender<Job>,
    drain: Ticker,
    capacity: usize,
}

impl LeakyBucketLimiter {
    /// Create the bucket and start its drain schedule.
    ///
    /// Must be called within a tokio runtime.
    pub fn new(config: LeakyBucketConfig) -> Result<Self> {
        config.validate()?;
        debug!(
            capacity = config.capacity,
            leak_interval_ms = config.leak_interval_ms,
            drain_workers = config.drain_workers,
            "Creating leaky bucket limiter"
        );

        let (queue, mut pending) = mpsc::channel::<Job>(config.capacity);

        let workers = config.drain_workers;
        let drain = Ticker::spawn(
            "leaky-bucket-drain",
            Duration::from_millis(config.leak_interval_ms),
            move || {
                for _ in 0..workers {
                    let Ok(job) = pending.try_recv() else {
                        break;
                    };
                    tokio::spawn(async move {
                        if panic::catch_unwind(AssertUnwindSafe(job)).is_err() {
                            warn!("Queued work item panicked");
                        }
                    });
                }
            },
        );

        Ok(Self {
            queue,
            drain,
            capacity: config.capacity,
        })
    }

    /// Offer one unit of work. Returns whether it was admitted to the
    /// queue; admitted work runs later, on the drain schedule.
    pub fn try_acquire<F>(&self, work: F) -> bool
    where
        F: FnOnce() + Send + 'static,
    {
        match self.queue.try_send(Box::new(work)) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                trace!("Bucket full, rejecting work item");
                false
            }
            Err(TrySendError::Closed(_)) => {
                trace!("Bucket shut down, rejecting work item");
                false
            }
        }
    }

    /// Work items waiting to drain.
    pub fn pending(&self) -> usize {
        self.capacity.saturating_sub(self.queue.capacity())
    }

    /// Maximum queued work items.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Stop the drain schedule. Once the drain task observes the stop the
    /// queue closes and later offers are rejected; work already started is
    /// allowed to finish.
    pub fn shutdown(&self) {
        self.drain.stop();
    }
}

#[async_trait]
impl RateLimiter for LeakyBucketLimiter {
    /// Admission without a payload: enqueues a no-op marker that still
    /// occupies bucket capacity and drains on schedule.
    async fn try_acquire(&self) -> Result<bool> {
        Ok(self.try_acquire(|| {}))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    async fn settle() {
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
    }

    fn bucket(capacity: usize, leak_interval_ms: u64, drain_workers: usize) -> LeakyBucketLimiter {
        LeakyBucketLimiter::new(LeakyBucketConfig {
            capacity,
            leak_interval_ms,
            drain_workers,
        })
        .unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_six_rapid_offers_admit_five() {
        let limiter = bucket(5, 500, 1);

        let mut outcomes = Vec::new();
        for _ in 0..6 {
            outcomes.push(limiter.try_acquire(|| {}));
        }

        assert_eq!(outcomes, vec![true, true, true, true, true, false]);
        assert_eq!(limiter.pending(), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_items_drain_in_fifo_order() {
        let limiter = bucket(5, 500, 1);
        let order = Arc::new(Mutex::new(Vec::new()));

        for i in 0..5 {
            let order = Arc::clone(&order);
            assert!(limiter.try_acquire(move || order.lock().push(i)));
        }

        // One item per tick.
        for expected_done in 1..=5 {
            tokio::time::sleep(Duration::from_millis(510)).await;
            settle().await;
            assert_eq!(order.lock().len(), expected_done);
        }

        assert_eq!(*order.lock(), vec![0, 1, 2, 3, 4]);
        assert_eq!(limiter.pending(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_drained_slots_free_capacity() {
        let limiter = bucket(2, 500, 1);

        assert!(limiter.try_acquire(|| {}));
        assert!(limiter.try_acquire(|| {}));
        assert!(!limiter.try_acquire(|| {}));

        tokio::time::sleep(Duration::from_millis(510)).await;
        settle().await;

        assert!(limiter.try_acquire(|| {}));
    }

    #[tokio::test(start_paused = true)]
    async fn test_panicking_item_does_not_stop_the_drain() {
        let limiter = bucket(5, 500, 1);
        let completed = Arc::new(AtomicU32::new(0));

        assert!(limiter.try_acquire(|| panic!("work item exploded")));
        for _ in 0..2 {
            let completed = Arc::clone(&completed);
            assert!(limiter.try_acquire(move || {
                completed.fetch_add(1, Ordering::SeqCst);
            }));
        }

        tokio::time::sleep(Duration::from_millis(1_600)).await;
        settle().await;

        assert_eq!(completed.load(Ordering::SeqCst), 2);
        assert_eq!(limiter.pending(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_drain_workers_batch_per_tick() {
        let limiter = bucket(6, 500, 3);
        let completed = Arc::new(AtomicU32::new(0));

        for _ in 0..6 {
            let completed = Arc::clone(&completed);
            assert!(limiter.try_acquire(move || {
                completed.fetch_add(1, Ordering::SeqCst);
            }));
        }

        tokio::time::sleep(Duration::from_millis(510)).await;
        settle().await;
        assert_eq!(completed.load(Ordering::SeqCst), 3);

        tokio::time::sleep(Duration::from_millis(500)).await;
        settle().await;
        assert_eq!(completed.load(Ordering::SeqCst), 6);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_rejects_later_offers() {
        let limiter = bucket(5, 500, 1);

        limiter.shutdown();
        settle().await;

        assert!(!limiter.try_acquire(|| {}));
    }

    #[tokio::test(start_paused = true)]
    async fn test_trait_surface_counts_against_capacity() {
        let limiter = bucket(2, 500, 1);
        let limiter: &dyn RateLimiter = &limiter;

        assert!(limiter.try_acquire().await.unwrap());
        assert!(limiter.try_acquire().await.unwrap());
        assert!(!limiter.try_acquire().await.unwrap());
    }

    #[tokio::test]
    async fn test_invalid_config_fails_construction() {
        let result = LeakyBucketLimiter::new(LeakyBucketConfig {
            capacity: 5,
            leak_interval_ms: 500,
            drain_workers: 0,
        });
        assert!(result.is_err());
    }
}
