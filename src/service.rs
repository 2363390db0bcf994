//! High-level cache service for web applications.
//!
//! Owns a [`WorkerPool`] for logical-expiry rebuilds and wraps the
//! [`CacheClient`] in `Arc` for easy sharing.

use crate::backend::CacheBackend;
use crate::client::CacheClient;
use crate::config::CacheConfig;
use crate::entity::CacheEntity;
use crate::error::Result;
use crate::loader::Loader;
use crate::observability::CacheMetrics;
use crate::scheduler::{SchedulerStats, WorkerPool};
use crate::strategy::{CacheStrategy, Lookup};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// High-level cache service for web applications.
///
/// Cloning is cheap (an `Arc` increment); every clone shares the same
/// client and rebuild pool. The host owns the pool's lifetime: call
/// [`shutdown`](CacheService::shutdown) before exiting so queued rebuilds
/// finish and their locks are released.
///
/// # Example
///
/// ```ignore
/// use cache_shield::{CacheService, CacheConfig, CacheStrategy};
/// use cache_shield::backend::InMemoryBackend;
///
/// let cache = CacheService::start(InMemoryBackend::new(), CacheConfig::default())?;
///
/// // In your web service struct
/// pub struct ShopService {
///     cache: CacheService<InMemoryBackend>,
///     db: ShopRepository,
/// }
///
/// impl ShopService {
///     pub async fn get(&self, id: u64) -> Result<Option<Shop>> {
///         self.cache.fetch(&id, &self.db, CacheStrategy::BlockingRetry).await
///     }
/// }
///
/// cache.shutdown().await;
/// ```
#[derive(Clone)]
pub struct CacheService<B: CacheBackend> {
    client: Arc<CacheClient<B, WorkerPool>>,
}

impl<B: CacheBackend> CacheService<B> {
    /// Start the rebuild pool and build the client.
    ///
    /// Must be called inside a Tokio runtime.
    ///
    /// # Errors
    /// - `Error::ConfigError`: `config` fails validation
    /// - `Error::SchedulerUnavailable`: no Tokio runtime
    pub fn start(backend: B, config: CacheConfig) -> Result<Self> {
        config.validate()?;
        let pool = WorkerPool::start(config.scheduler.clone())?;
        let client = CacheClient::with_config(backend, Arc::new(pool), config)?;
        Ok(CacheService {
            client: Arc::new(client),
        })
    }

    /// [`start`](CacheService::start) with [`CacheConfig::from_env`].
    pub fn from_env(backend: B) -> Result<Self> {
        Self::start(backend, CacheConfig::from_env()?)
    }

    /// Start with custom metrics.
    pub fn start_with_metrics(
        backend: B,
        config: CacheConfig,
        metrics: Arc<dyn CacheMetrics>,
    ) -> Result<Self> {
        config.validate()?;
        let pool = WorkerPool::start(config.scheduler.clone())?;
        let client =
            CacheClient::with_config(backend, Arc::new(pool), config)?.with_metrics(metrics);
        Ok(CacheService {
            client: Arc::new(client),
        })
    }

    /// The underlying client, for operations not mirrored here.
    pub fn client(&self) -> &CacheClient<B, WorkerPool> {
        &self.client
    }

    /// Look up `id` with the given strategy.
    ///
    /// # Errors
    /// Same as [`CacheClient::get`].
    pub async fn get<T, L>(&self, id: &T::Key, loader: &L, strategy: CacheStrategy) -> Result<Lookup<T>>
    where
        T: CacheEntity,
        L: Loader<T> + Clone + 'static,
    {
        self.client.get::<T, L>(id, loader, strategy).await
    }

    /// Look up `id`, returning only the value.
    pub async fn fetch<T, L>(&self, id: &T::Key, loader: &L, strategy: CacheStrategy) -> Result<Option<T>>
    where
        T: CacheEntity,
        L: Loader<T> + Clone + 'static,
    {
        self.client.fetch::<T, L>(id, loader, strategy).await
    }

    /// Pre-load a hot key for logical expiry.
    pub async fn warm<T, L>(&self, id: &T::Key, loader: &L, ttl: Duration) -> Result<bool>
    where
        T: CacheEntity,
        L: Loader<T>,
    {
        self.client.warm::<T, L>(id, loader, ttl).await
    }

    /// Delete the value key of `id`.
    pub async fn invalidate<T: CacheEntity>(&self, id: &T::Key) -> Result<()> {
        self.client.invalidate::<T>(id).await
    }

    /// Write to the system of record, then invalidate `id`.
    pub async fn update<T, W, R>(&self, id: &T::Key, write: W) -> Result<R>
    where
        T: CacheEntity,
        W: Future<Output = Result<R>>,
    {
        self.client.update::<T, W, R>(id, write).await
    }

    /// Rebuild pool counters.
    pub fn scheduler_stats(&self) -> SchedulerStats {
        self.client.scheduler().stats()
    }

    /// Stop the rebuild pool after draining queued rebuilds.
    ///
    /// Later stale reads keep serving stale values; their rebuilds are
    /// rejected and logged.
    pub async fn shutdown(&self) {
        self.client.scheduler().shutdown().await;
    }
}
