//! In-process reference implementation of [`SortedSetStore`].

use std::collections::BTreeSet;

use async_trait::async_trait;
use dashmap::DashMap;
use tracing::trace;
use uuid::Uuid;

use super::{SortedSetStore, StoreError};

/// A scored store backed by a concurrent map of ordered sets.
///
/// [`check_and_insert`](SortedSetStore::check_and_insert) runs its whole
/// prune/count/insert sequence while holding the key's map guard, which
/// serializes invocations per key the way a server-side script does on a
/// networked store. Suitable for tests and single-process deployments; a
/// networked deployment implements [`SortedSetStore`] against its own
/// backend instead.
#[derive(Debug, Default)]
pub struct MemoryStore {
    sets: DashMap<String, BTreeSet<(u64, String)>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SortedSetStore for MemoryStore {
    async fn remove_scored_below(&self, key: &str, threshold: u64) -> Result<u64, StoreError> {
        let Some(mut set) = self.sets.get_mut(key) else {
            return Ok(0);
        };
        let before = set.len();
        set.retain(|&(score, _)| score > threshold);
        Ok((before - set.len()) as u64)
    }

    async fn count_entries(&self, key: &str) -> Result<u64, StoreError> {
        Ok(self.sets.get(key).map_or(0, |set| set.len() as u64))
    }

    async fn insert_scored(&self, key: &str, score: u64, member: &str) -> Result<(), StoreError> {
        self.sets
            .entry(key.to_string())
            .or_default()
            .insert((score, member.to_string()));
        Ok(())
    }

    async fn check_and_insert(
        &self,
        key: &str,
        now: u64,
        max_requests: u64,
        window_millis: u64,
    ) -> Result<bool, StoreError> {
        // The entry guard is held for the whole sequence, so concurrent
        // invocations on the same key observe it as indivisible.
        let mut set = self.sets.entry(key.to_string()).or_default();

        let horizon = now.saturating_sub(window_millis);
        set.retain(|&(score, _)| score > horizon);

        if (set.len() as u64) < max_requests {
            set.insert((now, format!("{}-{}", now, Uuid::new_v4())));
            Ok(true)
        } else {
            trace!(key, entries = set.len(), "Admission composite rejected entry");
            Ok(false)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_insert_and_count() {
        let store = MemoryStore::new();

        store.insert_scored("k", 100, "a").await.unwrap();
        store.insert_scored("k", 200, "b").await.unwrap();

        assert_eq!(store.count_entries("k").await.unwrap(), 2);
        assert_eq!(store.count_entries("other").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_remove_scored_below_is_inclusive() {
        let store = MemoryStore::new();

        store.insert_scored("k", 100, "a").await.unwrap();
        store.insert_scored("k", 200, "b").await.unwrap();
        store.insert_scored("k", 300, "c").await.unwrap();

        let removed = store.remove_scored_below("k", 200).await.unwrap();
        assert_eq!(removed, 2);
        assert_eq!(store.count_entries("k").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_remove_on_missing_key_is_empty() {
        let store = MemoryStore::new();
        assert_eq!(store.remove_scored_below("nope", 100).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_check_and_insert_admits_up_to_max() {
        let store = MemoryStore::new();

        for _ in 0..3 {
            assert!(store.check_and_insert("k", 1_000, 3, 500).await.unwrap());
        }
        assert!(!store.check_and_insert("k", 1_000, 3, 500).await.unwrap());
    }

    #[tokio::test]
    async fn test_check_and_insert_prunes_expired_entries() {
        let store = MemoryStore::new();

        assert!(store.check_and_insert("k", 1_000, 1, 500).await.unwrap());
        assert!(!store.check_and_insert("k", 1_200, 1, 500).await.unwrap());

        // At 1600 the entry scored 1000 falls out of the 500ms window.
        assert!(store.check_and_insert("k", 1_600, 1, 500).await.unwrap());
    }

    #[tokio::test]
    async fn test_same_score_entries_stay_distinct() {
        let store = MemoryStore::new();

        assert!(store.check_and_insert("k", 1_000, 5, 500).await.unwrap());
        assert!(store.check_and_insert("k", 1_000, 5, 500).await.unwrap());

        assert_eq!(store.count_entries("k").await.unwrap(), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_composite_never_over_admits() {
        let store = Arc::new(MemoryStore::new());

        let mut handles = Vec::new();
        for _ in 0..32 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                store.check_and_insert("k", 1_000, 8, 500).await.unwrap()
            }));
        }

        let mut admitted = 0;
        for handle in handles {
            if handle.await.unwrap() {
                admitted += 1;
            }
        }

        assert_eq!(admitted, 8);
        assert_eq!(store.count_entries("k").await.unwrap(), 8);
    }
}
