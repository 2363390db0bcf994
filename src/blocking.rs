//! Blocking-retry strategy: single-flight rebuilds under a distributed lock.
//!
//! On a miss exactly one caller (per id, across processes) wins the lock and
//! loads; everyone else sleeps and re-reads until the winner's value shows
//! up, the winner's lock disappears, or the retry budget runs out.
//!
//! ```text
//! loop attempt in 1..=max_attempts:
//!     value key answers?            -> return it
//!     lock acquired?
//!         value key answers now?    -> release, return it
//!         load, store, release      -> return
//!     sleep(backoff)
//! RebuildTimeout
//! ```

use crate::backend::CacheBackend;
use crate::config::{CacheConfig, RetryPolicy};
use crate::entity::CacheEntity;
use crate::error::{Error, Result};
use crate::guard::NullMarkerGuard;
use crate::key::CacheKeyBuilder;
use crate::loader::Loader;
use crate::lock::DistributedLock;
use crate::observability::{CacheMetrics, NoOpMetrics};
use crate::strategy::Lookup;
use std::sync::Arc;
use std::time::Instant;

/// Stampede protection for keys with a physical TTL.
#[derive(Clone)]
pub struct BlockingRetry<B: CacheBackend> {
    guard: NullMarkerGuard<B>,
    lock: DistributedLock<B>,
    retry: RetryPolicy,
    metrics: Arc<dyn CacheMetrics>,
}

impl<B: CacheBackend> BlockingRetry<B> {
    pub fn new(backend: B, config: &CacheConfig) -> Self {
        BlockingRetry {
            guard: NullMarkerGuard::new(backend.clone(), config),
            lock: DistributedLock::new(backend, config.lock_ttl),
            retry: config.retry.clone(),
            metrics: Arc::new(NoOpMetrics),
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<dyn CacheMetrics>) -> Self {
        self.guard = self.guard.with_metrics(Arc::clone(&metrics));
        self.metrics = metrics;
        self
    }

    /// Look up `id`; on a miss, load it under the rebuild lock.
    ///
    /// The lock is released on every exit path once acquired, loader errors
    /// included. Callers that never see the value nor win the lock within
    /// the retry budget get `Error::RebuildTimeout`.
    ///
    /// # Errors
    /// - `Error::StoreUnavailable`: the store failed
    /// - `Error::LoaderFailed`: this caller held the lock and the loader failed
    /// - `Error::RebuildTimeout`: retry budget exhausted
    pub async fn get<T, L>(&self, id: &T::Key, loader: &L) -> Result<Lookup<T>>
    where
        T: CacheEntity,
        L: Loader<T>,
    {
        let key = CacheKeyBuilder::build::<T>(id);
        let lock_key = CacheKeyBuilder::lock::<T>(id);
        let timer = Instant::now();

        for attempt in 1..=self.retry.max_attempts {
            if let Some(found) = self.guard.cached::<T>(&key).await? {
                if attempt > 1 {
                    debug!("{} filled by another caller after {} attempts", key, attempt);
                }
                return Ok(found);
            }

            let Some(lock_guard) = self.lock.try_acquire(&lock_key).await? else {
                self.metrics.record_lock_contention(&key);
                if attempt < self.retry.max_attempts {
                    tokio::time::sleep(self.retry.backoff).await;
                }
                continue;
            };

            // Another caller may have finished between our read and the lock
            let result = match self.guard.cached::<T>(&key).await {
                Ok(Some(found)) => Ok(found),
                Ok(None) => {
                    self.metrics.record_miss(&key, timer.elapsed());
                    self.guard.load_and_store::<T, L>(id, &key, loader).await
                }
                Err(e) => Err(e),
            };

            if let Err(e) = lock_guard.release().await {
                warn!("Failed to release {}: {} (expires after its TTL)", lock_key, e);
            }
            return result;
        }

        warn!(
            "✗ Gave up on {} after {} attempts ({:?})",
            key,
            self.retry.max_attempts,
            timer.elapsed()
        );
        Err(Error::RebuildTimeout {
            key,
            attempts: self.retry.max_attempts,
        })
    }
}
