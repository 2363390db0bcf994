//! Null-marker guard: cache-aside reads with negative caching.
//!
//! A lookup for an id the system of record does not have stores the null
//! marker under the value key with a short TTL. Until it expires, repeated
//! lookups for that id are answered from the store and never reach the
//! loader.

use crate::backend::CacheBackend;
use crate::config::CacheConfig;
use crate::entity::CacheEntity;
use crate::error::Result;
use crate::key::CacheKeyBuilder;
use crate::loader::Loader;
use crate::observability::{CacheMetrics, NoOpMetrics, TtlPolicy};
use crate::serialization::{is_null_marker, NULL_MARKER};
use crate::strategy::Lookup;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// State of a value key.
pub(crate) enum Slot<T> {
    /// Absent, or present but undecodable (treated as a miss).
    Missing,
    NullMarker,
    Value(T),
}

/// Penetration protection over a [`CacheBackend`].
#[derive(Clone)]
pub struct NullMarkerGuard<B: CacheBackend> {
    backend: B,
    value_ttl: TtlPolicy,
    null_ttl: Duration,
    metrics: Arc<dyn CacheMetrics>,
}

impl<B: CacheBackend> NullMarkerGuard<B> {
    pub fn new(backend: B, config: &CacheConfig) -> Self {
        NullMarkerGuard {
            backend,
            value_ttl: config.value_ttl.clone(),
            null_ttl: config.null_ttl,
            metrics: Arc::new(NoOpMetrics),
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<dyn CacheMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Look up `id`, loading and caching it (or its absence) on a miss.
    ///
    /// # Errors
    /// - `Error::StoreUnavailable`: the store failed
    /// - `Error::LoaderFailed`: the loader failed; nothing is cached
    pub async fn get<T, L>(&self, id: &T::Key, loader: &L) -> Result<Lookup<T>>
    where
        T: CacheEntity,
        L: Loader<T>,
    {
        let key = CacheKeyBuilder::build::<T>(id);
        let timer = Instant::now();

        if let Some(found) = self.cached::<T>(&key).await? {
            return Ok(found);
        }

        self.metrics.record_miss(&key, timer.elapsed());
        self.load_and_store::<T, L>(id, &key, loader).await
    }

    /// Read a value key and classify its content.
    pub(crate) async fn read<T: CacheEntity>(&self, key: &str) -> Result<Slot<T>> {
        let bytes = match self.backend.get(key).await? {
            Some(bytes) => bytes,
            None => return Ok(Slot::Missing),
        };

        if is_null_marker(&bytes) {
            return Ok(Slot::NullMarker);
        }

        match T::deserialize_from_cache(&bytes).and_then(|value| {
            value.validate()?;
            Ok(value)
        }) {
            Ok(value) => Ok(Slot::Value(value)),
            Err(e) => {
                // Reloading overwrites the entry
                warn!("Corrupt entry under {}, treating as miss: {}", key, e);
                self.metrics.record_error(key, &e.to_string());
                Ok(Slot::Missing)
            }
        }
    }

    /// `Some` if the store alone answers the lookup (value or null marker).
    pub(crate) async fn cached<T: CacheEntity>(&self, key: &str) -> Result<Option<Lookup<T>>> {
        let timer = Instant::now();
        match self.read::<T>(key).await? {
            Slot::Value(value) => {
                self.metrics.record_hit(key, timer.elapsed());
                Ok(Some(Lookup::Fresh(value)))
            }
            Slot::NullMarker => {
                self.metrics.record_null_hit(key);
                Ok(Some(Lookup::Absent))
            }
            Slot::Missing => Ok(None),
        }
    }

    /// Invoke the loader and cache the answer, absence included.
    pub(crate) async fn load_and_store<T, L>(
        &self,
        id: &T::Key,
        key: &str,
        loader: &L,
    ) -> Result<Lookup<T>>
    where
        T: CacheEntity,
        L: Loader<T>,
    {
        let timer = Instant::now();
        let loaded = match loader.load(id).await {
            Ok(loaded) => loaded,
            Err(e) => {
                self.metrics.record_error(key, &e.to_string());
                return Err(e);
            }
        };
        self.metrics.record_load(key, timer.elapsed());

        match loaded {
            Some(value) => {
                self.store_value(key, &value).await?;
                Ok(Lookup::Fresh(value))
            }
            None => {
                self.store_null_marker(key).await?;
                Ok(Lookup::Absent)
            }
        }
    }

    /// Write a plain entry with the namespace's value TTL.
    pub(crate) async fn store_value<T: CacheEntity>(&self, key: &str, value: &T) -> Result<()> {
        let ttl = self.value_ttl.get_ttl(T::cache_prefix());
        let bytes = value.serialize_for_cache()?;
        self.backend.set(key, bytes, ttl).await
    }

    /// Write the null marker with the short null TTL.
    pub(crate) async fn store_null_marker(&self, key: &str) -> Result<()> {
        debug!("Caching absence of {} for {:?}", key, self.null_ttl);
        self.backend
            .set(key, NULL_MARKER.to_vec(), Some(self.null_ttl))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::inmemory::SWEEP_INTERVAL;
    use crate::backend::{InMemoryBackend, UnreachableBackend};
    use crate::error::Error;
    use crate::loader::InMemoryLoader;
    use serde::{Deserialize, Serialize};

    #[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
    struct Shop {
        id: u64,
        name: String,
    }

    impl CacheEntity for Shop {
        type Key = u64;

        fn cache_key(&self) -> Self::Key {
            self.id
        }

        fn cache_prefix() -> &'static str {
            "shop"
        }
    }

    fn setup() -> (InMemoryBackend, NullMarkerGuard<InMemoryBackend>, InMemoryLoader<Shop>) {
        let backend = InMemoryBackend::new();
        let guard = NullMarkerGuard::new(backend.clone(), &CacheConfig::default());
        let loader = InMemoryLoader::new();
        (backend, guard, loader)
    }

    #[tokio::test]
    async fn test_miss_loads_and_caches_value() {
        let (backend, guard, loader) = setup();
        loader.insert(
            1,
            Shop {
                id: 1,
                name: "A".to_string(),
            },
        );

        let first = guard.get(&1, &loader).await.expect("Failed to get");
        let second = guard.get(&1, &loader).await.expect("Failed to get");

        assert_eq!(first, second);
        assert!(first.is_fresh());
        assert_eq!(loader.load_count(), 1);

        let ttl = backend.ttl("shop:1").await.expect("Value should have a TTL");
        assert!(ttl > Duration::from_secs(1700));
    }

    #[tokio::test]
    async fn test_absent_id_is_loaded_once() {
        let (backend, guard, loader) = setup();

        for _ in 0..5 {
            let result = guard.get(&404, &loader).await.expect("Failed to get");
            assert!(result.is_absent());
        }

        assert_eq!(loader.load_count(), 1);
        let marker = backend.get("shop:404").await.expect("Failed to get");
        assert_eq!(marker, Some(Vec::new()));
        let ttl = backend.ttl("shop:404").await.expect("Marker should have a TTL");
        assert!(ttl <= Duration::from_secs(120));
    }

    #[tokio::test]
    async fn test_loader_failure_is_not_cached() {
        let (backend, guard, loader) = setup();
        loader.set_failing(true);

        let result = guard.get(&7, &loader).await;
        assert!(matches!(result, Err(Error::LoaderFailed(_))));
        assert!(!backend.exists("shop:7").await.expect("Failed to check"));

        loader.set_failing(false);
        loader.insert(
            7,
            Shop {
                id: 7,
                name: "back".to_string(),
            },
        );
        let result = guard.get(&7, &loader).await.expect("Failed to get");
        assert_eq!(result.into_value().map(|s| s.name), Some("back".to_string()));
    }

    #[tokio::test]
    async fn test_corrupt_entry_is_reloaded_and_overwritten() {
        let (backend, guard, loader) = setup();
        loader.insert(
            2,
            Shop {
                id: 2,
                name: "B".to_string(),
            },
        );
        backend
            .set("shop:2", b"garbage".to_vec(), None)
            .await
            .expect("Failed to set");

        let result = guard.get(&2, &loader).await.expect("Failed to get");
        assert_eq!(result.into_value().map(|s| s.name), Some("B".to_string()));
        assert_eq!(loader.load_count(), 1);

        let bytes = backend
            .get("shop:2")
            .await
            .expect("Failed to get")
            .expect("Entry missing");
        assert!(Shop::deserialize_from_cache(&bytes).is_ok());
    }

    #[tokio::test]
    async fn test_store_failure_surfaces_without_loading() {
        let guard = NullMarkerGuard::new(UnreachableBackend, &CacheConfig::default());
        let loader: InMemoryLoader<Shop> = InMemoryLoader::new();

        let result = guard.get::<Shop, _>(&1, &loader).await;
        assert!(matches!(result, Err(Error::StoreUnavailable(_))));
        assert_eq!(loader.load_count(), 0);
    }

    #[tokio::test]
    async fn test_missing_ids_do_not_accumulate_markers() {
        let backend = InMemoryBackend::new();
        let config = CacheConfig::default().with_null_ttl(Duration::from_millis(20));
        let guard = NullMarkerGuard::new(backend.clone(), &config);
        let loader: InMemoryLoader<Shop> = InMemoryLoader::new();

        for id in 0..2 * SWEEP_INTERVAL {
            guard
                .get::<Shop, _>(&id, &loader)
                .await
                .expect("Failed to get");
        }
        tokio::time::sleep(Duration::from_millis(60)).await;
        for id in 0..SWEEP_INTERVAL {
            guard
                .get::<Shop, _>(&(1_000_000 + id), &loader)
                .await
                .expect("Failed to get");
        }

        // Only markers from the second round can survive the sweep
        let stats = backend.stats().await;
        assert!(stats.total_entries <= SWEEP_INTERVAL as usize);
    }
}
