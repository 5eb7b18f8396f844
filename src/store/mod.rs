//! External scored-store interface for the distributed sliding window.
//!
//! The distributed variant keeps no counter state locally; everything lives
//! in a store shared by any number of limiter instances. The store is the
//! sole arbiter of consistency, reached through the narrow interface below.

mod memory;

pub use memory::MemoryStore;

use async_trait::async_trait;
use thiserror::Error;

/// Errors surfaced by a scored store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The store could not be reached.
    #[error("Store unreachable: {0}")]
    Unavailable(String),

    /// The store answered but the composite operation failed.
    #[error("Admission composite failed: {0}")]
    Script(String),
}

/// A sorted set of `(score, member)` entries under a logical key.
///
/// Implementations must serialize [`check_and_insert`] against other
/// invocations on the same key; the three single-purpose operations carry
/// no atomicity guarantee across calls.
///
/// [`check_and_insert`]: SortedSetStore::check_and_insert
#[async_trait]
pub trait SortedSetStore: Send + Sync {
    /// Remove entries scored at or below `threshold`. Returns how many were
    /// removed.
    async fn remove_scored_below(&self, key: &str, threshold: u64) -> Result<u64, StoreError>;

    /// Number of entries under `key`.
    async fn count_entries(&self, key: &str) -> Result<u64, StoreError>;

    /// Insert `member` scored at `score`.
    async fn insert_scored(&self, key: &str, score: u64, member: &str) -> Result<(), StoreError>;

    /// The indivisible admission composite: prune entries scored at or below
    /// `now - window_millis`, count the remainder, and insert a fresh entry
    /// scored `now` iff the count is below `max_requests`. Returns whether
    /// the entry was inserted.
    async fn check_and_insert(
        &self,
        key: &str,
        now: u64,
        max_requests: u64,
        window_millis: u64,
    ) -> Result<bool, StoreError>;
}
