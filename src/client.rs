//! Cache client - main entry point for cache operations.

use crate::backend::CacheBackend;
use crate::blocking::BlockingRetry;
use crate::clock::Clock;
use crate::config::CacheConfig;
use crate::entity::CacheEntity;
use crate::error::Result;
use crate::guard::NullMarkerGuard;
use crate::key::CacheKeyBuilder;
use crate::loader::Loader;
use crate::logical::LogicalExpiry;
use crate::observability::{CacheMetrics, NoOpMetrics};
use crate::scheduler::RebuildScheduler;
use crate::strategy::{CacheStrategy, Lookup};
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Core cache client: one store, one scheduler, three strategies.
///
/// All methods take `&self`; wrap the client in `Arc` (or use
/// [`CacheService`](crate::CacheService)) to share it.
///
/// # Example
///
/// ```ignore
/// use cache_shield::{CacheClient, CacheStrategy, InlineScheduler};
/// use cache_shield::backend::InMemoryBackend;
/// use std::sync::Arc;
///
/// let client = CacheClient::new(InMemoryBackend::new(), Arc::new(InlineScheduler));
///
/// let shop = client.fetch(&1, &loader, CacheStrategy::BlockingRetry).await?;
/// ```
pub struct CacheClient<B: CacheBackend, S: RebuildScheduler> {
    backend: B,
    config: CacheConfig,
    scheduler: Arc<S>,
    guard: NullMarkerGuard<B>,
    blocking: BlockingRetry<B>,
    logical: LogicalExpiry<B, S>,
    metrics: Arc<dyn CacheMetrics>,
}

impl<B: CacheBackend, S: RebuildScheduler> Clone for CacheClient<B, S> {
    fn clone(&self) -> Self {
        CacheClient {
            backend: self.backend.clone(),
            config: self.config.clone(),
            scheduler: Arc::clone(&self.scheduler),
            guard: self.guard.clone(),
            blocking: self.blocking.clone(),
            logical: self.logical.clone(),
            metrics: Arc::clone(&self.metrics),
        }
    }
}

impl<B: CacheBackend, S: RebuildScheduler> CacheClient<B, S> {
    /// Create a client with the default configuration.
    pub fn new(backend: B, scheduler: Arc<S>) -> Self {
        Self::build(backend, scheduler, CacheConfig::default())
    }

    /// Create a client with a custom configuration.
    ///
    /// # Errors
    /// Returns `Error::ConfigError` if `config` fails validation.
    pub fn with_config(backend: B, scheduler: Arc<S>, config: CacheConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::build(backend, scheduler, config))
    }

    fn build(backend: B, scheduler: Arc<S>, config: CacheConfig) -> Self {
        CacheClient {
            guard: NullMarkerGuard::new(backend.clone(), &config),
            blocking: BlockingRetry::new(backend.clone(), &config),
            logical: LogicalExpiry::new(backend.clone(), Arc::clone(&scheduler), &config),
            backend,
            config,
            scheduler,
            metrics: Arc::new(NoOpMetrics),
        }
    }

    /// Set custom metrics handler.
    pub fn with_metrics(mut self, metrics: Arc<dyn CacheMetrics>) -> Self {
        self.guard = self.guard.with_metrics(Arc::clone(&metrics));
        self.blocking = self.blocking.with_metrics(Arc::clone(&metrics));
        self.logical = self.logical.with_metrics(Arc::clone(&metrics));
        self.metrics = metrics;
        self
    }

    /// Set the clock used for logical expiry deadlines.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.logical = self.logical.with_clock(clock);
        self
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn scheduler(&self) -> &Arc<S> {
        &self.scheduler
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Look up `id` with the given strategy.
    ///
    /// This is the primary method used in most cases. The loader must be
    /// `Clone + 'static` because logical expiry may hand it to a background
    /// rebuild; use the strategy-specific methods to avoid that bound.
    ///
    /// # Errors
    ///
    /// - `Error::StoreUnavailable`: the store is unreachable
    /// - `Error::LoaderFailed`: the loader failed while this call loaded
    /// - `Error::RebuildTimeout`: blocking retry exhausted its budget
    /// - `Error::SerializationError`: a loaded value could not be encoded
    pub async fn get<T, L>(&self, id: &T::Key, loader: &L, strategy: CacheStrategy) -> Result<Lookup<T>>
    where
        T: CacheEntity,
        L: Loader<T> + Clone + 'static,
    {
        debug!(
            "» Cache lookup {} (strategy: {})",
            CacheKeyBuilder::build::<T>(id),
            strategy
        );

        match strategy {
            CacheStrategy::PassThrough => self.get_with_pass_through::<T, L>(id, loader).await,
            CacheStrategy::BlockingRetry => self.get_with_mutex::<T, L>(id, loader).await,
            CacheStrategy::LogicalExpiry => self.get_with_logical_expire::<T, L>(id, loader).await,
        }
    }

    /// Like [`get`](CacheClient::get), returning only the value (fresh or stale).
    pub async fn fetch<T, L>(&self, id: &T::Key, loader: &L, strategy: CacheStrategy) -> Result<Option<T>>
    where
        T: CacheEntity,
        L: Loader<T> + Clone + 'static,
    {
        Ok(self.get::<T, L>(id, loader, strategy).await?.into_value())
    }

    /// Cache-aside read with null-marker penetration protection.
    pub async fn get_with_pass_through<T, L>(&self, id: &T::Key, loader: &L) -> Result<Lookup<T>>
    where
        T: CacheEntity,
        L: Loader<T>,
    {
        self.guard.get::<T, L>(id, loader).await
    }

    /// Single-flight read: only the lock holder loads, others retry.
    pub async fn get_with_mutex<T, L>(&self, id: &T::Key, loader: &L) -> Result<Lookup<T>>
    where
        T: CacheEntity,
        L: Loader<T>,
    {
        self.blocking.get::<T, L>(id, loader).await
    }

    /// Stale-while-revalidate read for keys warmed with [`warm`](CacheClient::warm).
    pub async fn get_with_logical_expire<T, L>(&self, id: &T::Key, loader: &L) -> Result<Lookup<T>>
    where
        T: CacheEntity,
        L: Loader<T> + Clone + 'static,
    {
        self.logical.get::<T, L>(id, loader).await
    }

    /// Write a plain entry with a physical TTL.
    pub async fn set<T: CacheEntity>(&self, id: &T::Key, value: &T, ttl: Duration) -> Result<()> {
        let key = CacheKeyBuilder::build::<T>(id);
        let bytes = value.serialize_for_cache()?;
        self.backend.set(&key, bytes, Some(ttl)).await
    }

    /// Write a logical-expiry entry (no physical TTL).
    pub async fn set_with_logical_expire<T: CacheEntity>(
        &self,
        id: &T::Key,
        value: &T,
        ttl: Duration,
    ) -> Result<()> {
        self.logical.set_with_logical_expire(id, value, ttl).await
    }

    /// Pre-load a hot key for logical expiry. Returns `false` if `id` does
    /// not exist in the system of record.
    pub async fn warm<T, L>(&self, id: &T::Key, loader: &L, ttl: Duration) -> Result<bool>
    where
        T: CacheEntity,
        L: Loader<T>,
    {
        self.logical.warm::<T, L>(id, loader, ttl).await
    }

    /// Pre-load several hot keys with one batch load.
    pub async fn warm_all<T, L>(&self, ids: &[T::Key], loader: &L, ttl: Duration) -> Result<usize>
    where
        T: CacheEntity,
        L: Loader<T>,
    {
        self.logical.warm_all::<T, L>(ids, loader, ttl).await
    }

    /// Delete the value key of `id`.
    pub async fn invalidate<T: CacheEntity>(&self, id: &T::Key) -> Result<()> {
        let key = CacheKeyBuilder::build::<T>(id);
        self.backend.delete(&key).await?;
        self.metrics.record_delete(&key);
        debug!("✓ Cache invalidated for {}", key);
        Ok(())
    }

    /// Run a write against the system of record, then invalidate `id`.
    ///
    /// The value key is deleted only if `write` succeeds; a failed write
    /// leaves the cache untouched and its error is returned.
    ///
    /// ```ignore
    /// client
    ///     .update::<Shop, _, _>(&shop.id, db.update_shop(&shop))
    ///     .await?;
    /// ```
    pub async fn update<T, W, R>(&self, id: &T::Key, write: W) -> Result<R>
    where
        T: CacheEntity,
        W: Future<Output = Result<R>>,
    {
        let timer = Instant::now();
        let written = write.await?;
        self.invalidate::<T>(id).await?;
        info!(
            "✓ Updated {} in {:?}",
            CacheKeyBuilder::build::<T>(id),
            timer.elapsed()
        );
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::InMemoryBackend;
    use crate::error::Error;
    use crate::loader::InMemoryLoader;
    use crate::scheduler::InlineScheduler;
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

    fn shop(id: u64, name: &str) -> Shop {
        Shop {
            id,
            name: name.to_string(),
        }
    }

    fn client() -> CacheClient<InMemoryBackend, InlineScheduler> {
        CacheClient::new(InMemoryBackend::new(), Arc::new(InlineScheduler))
    }

    #[tokio::test]
    async fn test_get_dispatches_on_strategy() {
        let client = client();
        let loader = InMemoryLoader::new();
        loader.insert(1, shop(1, "A"));

        let pass = client
            .get(&1, &loader, CacheStrategy::PassThrough)
            .await
            .expect("Failed to get");
        assert!(pass.is_fresh());

        client.invalidate::<Shop>(&1).await.expect("Failed to invalidate");
        let mutex = client
            .get(&1, &loader, CacheStrategy::BlockingRetry)
            .await
            .expect("Failed to get");
        assert!(mutex.is_fresh());

        client.invalidate::<Shop>(&1).await.expect("Failed to invalidate");
        let logical = client
            .get(&1, &loader, CacheStrategy::LogicalExpiry)
            .await
            .expect("Failed to get");
        assert!(logical.is_unknown());
    }

    #[tokio::test]
    async fn test_set_then_fetch_without_loader() {
        let client = client();
        let loader: InMemoryLoader<Shop> = InMemoryLoader::new();

        client
            .set(&2, &shop(2, "direct"), Duration::from_secs(60))
            .await
            .expect("Failed to set");

        let fetched = client
            .fetch(&2, &loader, CacheStrategy::PassThrough)
            .await
            .expect("Failed to fetch");
        assert_eq!(fetched, Some(shop(2, "direct")));
        assert_eq!(loader.load_count(), 0);
    }

    #[tokio::test]
    async fn test_update_invalidates_only_on_success() {
        let client = client();
        let loader = InMemoryLoader::new();
        loader.insert(1, shop(1, "old"));
        client
            .fetch(&1, &loader, CacheStrategy::PassThrough)
            .await
            .expect("Failed to fetch");

        let failed = client
            .update::<Shop, _, ()>(&1, async { Err(Error::loader("constraint violation")) })
            .await;
        assert!(failed.is_err());
        assert!(client.backend().exists("shop:1").await.expect("Failed to check"));

        let db = loader.clone();
        client
            .update::<Shop, _, _>(&1, async move {
                db.insert(1, shop(1, "new"));
                Ok(())
            })
            .await
            .expect("Failed to update");
        assert!(!client.backend().exists("shop:1").await.expect("Failed to check"));

        let fetched = client
            .fetch(&1, &loader, CacheStrategy::PassThrough)
            .await
            .expect("Failed to fetch");
        assert_eq!(fetched.map(|s| s.name), Some("new".to_string()));
    }

    #[test]
    fn test_with_config_validates() {
        let config = CacheConfig::default().with_lock_ttl(Duration::ZERO);
        let result = CacheClient::with_config(
            InMemoryBackend::new(),
            Arc::new(InlineScheduler),
            config,
        );
        assert!(matches!(result, Err(Error::ConfigError(_))));
    }
}
