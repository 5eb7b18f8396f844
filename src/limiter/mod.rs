//! Admission strategies and the capability trait they share.

mod distributed;
mod fixed_window;
mod leaky_bucket;
mod sliding_window;
mod token_bucket;

pub use distributed::DistributedSlidingWindowLimiter;
pub use fixed_window::FixedWindowLimiter;
pub use leaky_bucket::{Job, LeakyBucketLimiter};
pub use sliding_window::SlidingWindowLimiter;
pub use token_bucket::TokenBucketLimiter;

use std::sync::Arc;

use async_trait::async_trait;

use crate::config::LimiterSettings;
use crate::error::{Result, SluiceError};
use crate::store::SortedSetStore;

/// The capability shared by every admission strategy.
///
/// `Ok(false)` is an ordinary rejection, not a failure. `Err` is reserved
/// for infrastructure problems; only the distributed sliding window
/// produces it. Strategies answer in bounded time and never block one
/// caller on another.
#[async_trait]
pub trait RateLimiter: Send + Sync {
    /// Decide whether to admit one request.
    async fn try_acquire(&self) -> Result<bool>;
}

/// Build a limiter from [`LimiterSettings`], letting callers swap strategy
/// through configuration alone.
///
/// The distributed sliding window needs a `store`; every other strategy
/// ignores the argument. Leaky and token buckets start their background
/// schedules here, so this must run within a tokio runtime.
pub fn from_settings(
    settings: &LimiterSettings,
    store: Option<Arc<dyn SortedSetStore>>,
) -> Result<Arc<dyn RateLimiter>> {
    match settings {
        LimiterSettings::FixedWindow(config) => {
            Ok(Arc::new(FixedWindowLimiter::new(config.clone())?))
        }
        LimiterSettings::SlidingWindow(config) => {
            Ok(Arc::new(SlidingWindowLimiter::new(config.clone())?))
        }
        LimiterSettings::DistributedSlidingWindow(config) => {
            let store = store.ok_or_else(|| {
                SluiceError::Config(
                    "distributed_sliding_window requires a store".to_string(),
                )
            })?;
            Ok(Arc::new(DistributedSlidingWindowLimiter::new(
                config.clone(),
                store,
            )?))
        }
        LimiterSettings::LeakyBucket(config) => {
            Ok(Arc::new(LeakyBucketLimiter::new(config.clone())?))
        }
        LimiterSettings::TokenBucket(config) => {
            Ok(Arc::new(TokenBucketLimiter::new(config.clone())?))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    #[tokio::test]
    async fn test_from_settings_builds_each_strategy() {
        let store: Arc<dyn SortedSetStore> = Arc::new(MemoryStore::new());

        let yamls = [
            "strategy: fixed_window\nwindow_ms: 1000\nmax_requests: 3\n",
            "strategy: sliding_window\nwindow_ms: 1000\nmax_requests: 3\n",
            "strategy: distributed_sliding_window\nkey: k\nwindow_ms: 1000\nmax_requests: 3\n",
            "strategy: leaky_bucket\ncapacity: 5\nleak_interval_ms: 500\n",
            "strategy: token_bucket\ncapacity: 10\nrefill_interval_ms: 500\n",
        ];

        for yaml in yamls {
            let settings = LimiterSettings::from_yaml(yaml).unwrap();
            let limiter = from_settings(&settings, Some(Arc::clone(&store))).unwrap();
            // Polymorphic call through the trait object.
            limiter.try_acquire().await.unwrap();
        }
    }

    #[tokio::test]
    async fn test_from_settings_distributed_requires_store() {
        let settings = LimiterSettings::from_yaml(
            "strategy: distributed_sliding_window\nkey: k\nwindow_ms: 1000\nmax_requests: 3\n",
        )
        .unwrap();

        assert!(matches!(
            from_settings(&settings, None),
            Err(SluiceError::Config(_))
        ));
    }
}
