//! Logical-expiry strategy: stale-while-revalidate for pre-warmed hot keys.
//!
//! Entries are written as [`LogicalEntry`] values with no physical TTL, so
//! the store never drops a hot key on its own. Readers compare the embedded
//! deadline with the clock:
//!
//! - not expired: `Fresh`
//! - expired: `Stale`, and if the rebuild lock is free one background rebuild
//!   is handed to the scheduler
//! - never warmed: `Unknown` (the loader is not consulted)
//!
//! A reader never waits for a rebuild and never fails because the lock or
//! the scheduler misbehaved; those problems are logged and the stale value
//! is served.

use crate::backend::CacheBackend;
use crate::clock::{Clock, SystemClock};
use crate::config::CacheConfig;
use crate::entity::CacheEntity;
use crate::error::{Error, Result};
use crate::key::CacheKeyBuilder;
use crate::loader::Loader;
use crate::lock::{DistributedLock, LockGuard};
use crate::observability::{CacheMetrics, NoOpMetrics};
use crate::scheduler::{RebuildScheduler, RebuildTask};
use crate::serialization::{
    deserialize_from_cache, is_null_marker, serialize_for_cache, LogicalEntry,
};
use crate::strategy::Lookup;
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Stampede protection for hot keys that must never block a reader.
pub struct LogicalExpiry<B: CacheBackend, S: RebuildScheduler> {
    backend: B,
    lock: DistributedLock<B>,
    scheduler: Arc<S>,
    clock: Arc<dyn Clock>,
    logical_ttl: Duration,
    metrics: Arc<dyn CacheMetrics>,
}

impl<B: CacheBackend, S: RebuildScheduler> Clone for LogicalExpiry<B, S> {
    fn clone(&self) -> Self {
        LogicalExpiry {
            backend: self.backend.clone(),
            lock: self.lock.clone(),
            scheduler: Arc::clone(&self.scheduler),
            clock: Arc::clone(&self.clock),
            logical_ttl: self.logical_ttl,
            metrics: Arc::clone(&self.metrics),
        }
    }
}

impl<B: CacheBackend, S: RebuildScheduler> LogicalExpiry<B, S> {
    pub fn new(backend: B, scheduler: Arc<S>, config: &CacheConfig) -> Self {
        LogicalExpiry {
            lock: DistributedLock::new(backend.clone(), config.lock_ttl),
            backend,
            scheduler,
            clock: Arc::new(SystemClock),
            logical_ttl: config.logical_ttl,
            metrics: Arc::new(NoOpMetrics),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<dyn CacheMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Look up a pre-warmed `id`.
    ///
    /// `loader` is only used by a scheduled rebuild, which outlives this call,
    /// hence the `Clone + 'static` bound (an `Arc<L>` always qualifies).
    ///
    /// # Errors
    /// Returns `Error::StoreUnavailable` only if the initial read fails.
    pub async fn get<T, L>(&self, id: &T::Key, loader: &L) -> Result<Lookup<T>>
    where
        T: CacheEntity,
        L: Loader<T> + Clone + 'static,
    {
        let key = CacheKeyBuilder::build::<T>(id);
        let timer = Instant::now();

        let Some(bytes) = self.backend.get(&key).await? else {
            debug!("{} was never warmed", key);
            self.metrics.record_miss(&key, timer.elapsed());
            return Ok(Lookup::Unknown);
        };

        if is_null_marker(&bytes) {
            self.metrics.record_null_hit(&key);
            return Ok(Lookup::Absent);
        }

        let entry = match decode_entry::<T>(&bytes) {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Corrupt logical entry under {}, rebuilding: {}", key, e);
                self.metrics.record_error(&key, &e.to_string());
                self.schedule_rebuild::<T, L>(id, &key, loader).await;
                return Ok(Lookup::Unknown);
            }
        };

        if !entry.is_expired(self.clock.now_millis()) {
            self.metrics.record_hit(&key, timer.elapsed());
            return Ok(Lookup::Fresh(entry.data));
        }

        self.metrics.record_stale(&key);
        self.schedule_rebuild::<T, L>(id, &key, loader).await;
        Ok(Lookup::Stale(entry.data))
    }

    /// Load `id` and write it with a logical expiry of `now + ttl`.
    ///
    /// Returns `false` (and removes any existing entry) when the loader
    /// reports the id as absent.
    pub async fn warm<T, L>(&self, id: &T::Key, loader: &L, ttl: Duration) -> Result<bool>
    where
        T: CacheEntity,
        L: Loader<T>,
    {
        let key = CacheKeyBuilder::build::<T>(id);
        match loader.load(id).await? {
            Some(value) => {
                write_entry(&self.backend, self.clock.as_ref(), &key, &value, ttl).await?;
                info!("✓ Warmed {} (logical TTL {:?})", key, ttl);
                Ok(true)
            }
            None => {
                debug!("Nothing to warm for {}", key);
                self.backend.delete(&key).await?;
                Ok(false)
            }
        }
    }

    /// Warm several ids with one batch load. Returns how many were written.
    pub async fn warm_all<T, L>(&self, ids: &[T::Key], loader: &L, ttl: Duration) -> Result<usize>
    where
        T: CacheEntity,
        L: Loader<T>,
    {
        let loaded = loader.load_many(ids).await?;
        if loaded.len() != ids.len() {
            return Err(Error::LoaderFailed(format!(
                "load_many returned {} results for {} {} ids",
                loaded.len(),
                ids.len(),
                T::cache_prefix()
            )));
        }
        let mut warmed = 0;

        for (id, value) in ids.iter().zip(loaded) {
            let key = CacheKeyBuilder::build::<T>(id);
            match value {
                Some(value) => {
                    write_entry(&self.backend, self.clock.as_ref(), &key, &value, ttl).await?;
                    warmed += 1;
                }
                None => self.backend.delete(&key).await?,
            }
        }

        info!("✓ Warmed {}/{} {} entries", warmed, ids.len(), T::cache_prefix());
        Ok(warmed)
    }

    /// Write `value` directly with a logical expiry of `now + ttl`.
    pub async fn set_with_logical_expire<T: CacheEntity>(
        &self,
        id: &T::Key,
        value: &T,
        ttl: Duration,
    ) -> Result<()> {
        let key = CacheKeyBuilder::build::<T>(id);
        write_entry(&self.backend, self.clock.as_ref(), &key, value, ttl).await
    }

    /// Try to take the rebuild lock and hand a rebuild to the scheduler.
    ///
    /// Never fails: contention means a rebuild is already under way, and lock
    /// or scheduler errors only cost freshness.
    async fn schedule_rebuild<T, L>(&self, id: &T::Key, key: &str, loader: &L)
    where
        T: CacheEntity,
        L: Loader<T> + Clone + 'static,
    {
        let lock_key = CacheKeyBuilder::lock_for(key);
        let lock_guard = match self.lock.try_acquire(&lock_key).await {
            Ok(Some(lock_guard)) => lock_guard,
            Ok(None) => {
                self.metrics.record_lock_contention(key);
                return;
            }
            Err(e) => {
                warn!("Cannot take rebuild lock for {}, serving stale: {}", key, e);
                return;
            }
        };

        // The previous holder may have finished between our read and the lock
        if self.is_fresh::<T>(key).await {
            debug!("{} was rebuilt meanwhile, skipping rebuild", key);
            if let Err(e) = lock_guard.release().await {
                warn!("Failed to release rebuild lock of {}: {}", key, e);
            }
            return;
        }

        let task = self.rebuild_task::<T, L>(id.clone(), key.to_string(), loader.clone(), lock_guard);
        // A rejected task is dropped together with its guard, which releases the lock
        match self.scheduler.submit(key.to_string(), task).await {
            Ok(()) => self.metrics.record_rebuild_scheduled(key),
            Err(e) => warn!("Rebuild of {} not scheduled, serving stale: {}", key, e),
        }
    }

    async fn is_fresh<T: CacheEntity>(&self, key: &str) -> bool {
        match self.backend.get(key).await {
            Ok(Some(bytes)) => decode_entry::<T>(&bytes)
                .is_ok_and(|entry| !entry.is_expired(self.clock.now_millis())),
            _ => false,
        }
    }

    fn rebuild_task<T, L>(
        &self,
        id: T::Key,
        key: String,
        loader: L,
        lock_guard: LockGuard<B>,
    ) -> RebuildTask
    where
        T: CacheEntity,
        L: Loader<T> + 'static,
    {
        let backend = self.backend.clone();
        let clock = Arc::clone(&self.clock);
        let ttl = self.logical_ttl;

        async move {
            let timer = Instant::now();
            let outcome = AssertUnwindSafe(rebuild_entry::<B, T, L>(
                &backend,
                clock.as_ref(),
                &id,
                &key,
                &loader,
                ttl,
            ))
            .catch_unwind()
            .await;

            if let Err(e) = lock_guard.release().await {
                warn!("Failed to release rebuild lock of {}: {}", key, e);
            }

            match outcome {
                Ok(Ok(())) => {
                    debug!("✓ Rebuilt {} in {:?}", key, timer.elapsed());
                    Ok(())
                }
                Ok(Err(e)) => Err(e),
                Err(_) => Err(Error::RebuildPanicked(key)),
            }
        }
        .boxed()
    }
}

fn decode_entry<T: CacheEntity>(bytes: &[u8]) -> Result<LogicalEntry<T>> {
    let entry: LogicalEntry<T> = deserialize_from_cache(bytes)?;
    entry.data.validate()?;
    Ok(entry)
}

async fn write_entry<B: CacheBackend, T: CacheEntity>(
    backend: &B,
    clock: &dyn Clock,
    key: &str,
    value: &T,
    ttl: Duration,
) -> Result<()> {
    let entry = LogicalEntry::new(value, clock.deadline_after(ttl));
    let bytes = serialize_for_cache(&entry)?;
    backend.set(key, bytes, None).await
}

async fn rebuild_entry<B, T, L>(
    backend: &B,
    clock: &dyn Clock,
    id: &T::Key,
    key: &str,
    loader: &L,
    ttl: Duration,
) -> Result<()>
where
    B: CacheBackend,
    T: CacheEntity,
    L: Loader<T>,
{
    match loader.load(id).await? {
        Some(value) => write_entry(backend, clock, key, &value, ttl).await,
        None => {
            info!("{} no longer exists, dropping its logical entry", key);
            backend.delete(key).await
        }
    }
}
