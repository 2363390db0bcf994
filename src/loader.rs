//! Loader trait for the system of record.
//!
//! The `Loader` decouples the cache from whatever owns the authoritative data
//! (SQL database, remote service, ...). The cache calls it on a miss and when
//! rebuilding an expired hot key.
//!
//! # Error Handling
//!
//! Return `Ok(None)` only when the id is known not to exist; that answer is
//! cached as a null marker. Return `Err` (normally
//! [`Error::LoaderFailed`](crate::Error::LoaderFailed)) for connectivity
//! problems, timeouts and any other transient failure; errors are never
//! cached.

use crate::entity::CacheEntity;
use crate::error::{Error, Result};
use dashmap::DashMap;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Trait for system-of-record implementations.
pub trait Loader<T: CacheEntity>: Send + Sync {
    /// Load an entity by id.
    ///
    /// # Returns
    /// - `Ok(Some(entity))` - Entity found
    /// - `Ok(None)` - Entity does not exist (cached as a null marker)
    /// - `Err(e)` - Load failed (propagated, not cached)
    fn load(&self, id: &T::Key) -> impl Future<Output = Result<Option<T>>> + Send;

    /// Batch load (optional optimization).
    ///
    /// Default implementation calls `load()` for each id.
    /// Override for efficiency (e.g., SQL `WHERE id IN (...)`)
    fn load_many(&self, ids: &[T::Key]) -> impl Future<Output = Result<Vec<Option<T>>>> + Send {
        async move {
            let mut results = Vec::with_capacity(ids.len());
            for id in ids {
                results.push(self.load(id).await?);
            }
            Ok(results)
        }
    }
}

impl<T: CacheEntity, L: Loader<T>> Loader<T> for Arc<L> {
    fn load(&self, id: &T::Key) -> impl Future<Output = Result<Option<T>>> + Send {
        (**self).load(id)
    }

    fn load_many(&self, ids: &[T::Key]) -> impl Future<Output = Result<Vec<Option<T>>>> + Send {
        (**self).load_many(ids)
    }
}

// ============================================================================
// In-Memory Loader
// ============================================================================

/// In-memory system of record for tests and demos.
///
/// Clones share the same data and counters, so a clone moved into a rebuild
/// task is observed by the test that created it.
///
/// Besides storing entities it counts `load` calls and can simulate latency
/// and outages:
///
/// ```ignore
/// let loader = InMemoryLoader::new().with_latency(Duration::from_millis(50));
/// loader.insert(1, shop);
/// loader.set_failing(true);   // every load now returns LoaderFailed
/// assert_eq!(loader.load_count(), 0);
/// ```
pub struct InMemoryLoader<T: CacheEntity> {
    data: Arc<DashMap<String, T>>,
    loads: Arc<AtomicUsize>,
    failing: Arc<AtomicBool>,
    latency: Option<Duration>,
}

impl<T: CacheEntity> InMemoryLoader<T> {
    /// Create a new empty loader.
    pub fn new() -> Self {
        InMemoryLoader {
            data: Arc::new(DashMap::new()),
            loads: Arc::new(AtomicUsize::new(0)),
            failing: Arc::new(AtomicBool::new(false)),
            latency: None,
        }
    }

    /// Delay every load by `latency`.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Insert or update an entity.
    pub fn insert(&self, id: T::Key, value: T) {
        self.data.insert(id.to_string(), value);
    }

    /// Remove an entity.
    pub fn remove(&self, id: &T::Key) {
        self.data.remove(&id.to_string());
    }

    /// Make subsequent loads fail with `LoaderFailed`.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Number of `load` calls so far (including failed ones).
    pub fn load_count(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }

    /// Return the number of entities.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Return true if the loader holds no entities.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl<T: CacheEntity> Clone for InMemoryLoader<T> {
    fn clone(&self) -> Self {
        InMemoryLoader {
            data: Arc::clone(&self.data),
            loads: Arc::clone(&self.loads),
            failing: Arc::clone(&self.failing),
            latency: self.latency,
        }
    }
}

impl<T: CacheEntity> Default for InMemoryLoader<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: CacheEntity> Loader<T> for InMemoryLoader<T> {
    async fn load(&self, id: &T::Key) -> Result<Option<T>> {
        self.loads.fetch_add(1, Ordering::SeqCst);

        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        if self.failing.load(Ordering::SeqCst) {
            return Err(Error::loader(format!(
                "system of record unavailable for {}",
                id
            )));
        }

        Ok(self.data.get(&id.to_string()).map(|e| e.value().clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};

    #[derive(Clone, Serialize, Deserialize)]
    struct TestEntity {
        id: String,
        value: String,
    }

    impl CacheEntity for TestEntity {
        type Key = String;

        fn cache_key(&self) -> Self::Key {
            self.id.clone()
        }

        fn cache_prefix() -> &'static str {
            "test"
        }
    }

    fn entity(id: &str, value: &str) -> TestEntity {
        TestEntity {
            id: id.to_string(),
            value: value.to_string(),
        }
    }

    #[tokio::test]
    async fn test_in_memory_loader_hit_and_miss() {
        let loader = InMemoryLoader::new();
        loader.insert("1".to_string(), entity("1", "data"));

        let found = loader.load(&"1".to_string()).await.expect("Failed to load");
        assert_eq!(found.expect("Entity not found").value, "data");

        let missing = loader
            .load(&"nonexistent".to_string())
            .await
            .expect("Failed to load");
        assert!(missing.is_none());
        assert_eq!(loader.load_count(), 2);
    }

    #[tokio::test]
    async fn test_in_memory_loader_batch() {
        let loader = InMemoryLoader::new();
        loader.insert("1".to_string(), entity("1", "a"));
        loader.insert("2".to_string(), entity("2", "b"));

        let ids = vec!["1".to_string(), "2".to_string(), "3".to_string()];
        let results = loader.load_many(&ids).await.expect("Failed to load batch");

        assert_eq!(results.len(), 3);
        assert!(results[0].is_some());
        assert!(results[1].is_some());
        assert!(results[2].is_none());
    }

    #[tokio::test]
    async fn test_in_memory_loader_failure_is_not_absence() {
        let loader: InMemoryLoader<TestEntity> = InMemoryLoader::new();
        loader.set_failing(true);

        let result = loader.load(&"1".to_string()).await;
        assert!(matches!(result, Err(Error::LoaderFailed(_))));
    }

    #[tokio::test]
    async fn test_clones_share_state() {
        let loader = InMemoryLoader::new();
        let clone = loader.clone();
        clone.insert("1".to_string(), entity("1", "shared"));

        let _ = Arc::new(clone).load(&"1".to_string()).await;
        assert_eq!(loader.len(), 1);
        assert_eq!(loader.load_count(), 1);
    }
}
