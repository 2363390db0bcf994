//! Observability hooks and TTL policies.
//!
//! - **Metrics (`CacheMetrics`)**: hits, misses, null-marker hits, stale
//!   serves, loader calls, lock contention and rebuild outcomes
//! - **TTL Policies (`TtlPolicy`)**: physical TTL of plain value entries
//!
//! Default behavior uses `NoOpMetrics`. Implement `CacheMetrics` to forward
//! events to your monitoring system:
//!
//! ```ignore
//! use cache_shield::observability::CacheMetrics;
//! use std::time::Duration;
//!
//! struct PrometheusMetrics;
//!
//! impl CacheMetrics for PrometheusMetrics {
//!     fn record_hit(&self, _key: &str, _duration: Duration) {
//!         // counter!("cache_hits").inc();
//!     }
//!     fn record_lock_contention(&self, _key: &str) {
//!         // counter!("cache_lock_contention").inc();
//!     }
//! }
//! ```
//!
//! # TTL Policies
//!
//! ```
//! use cache_shield::observability::TtlPolicy;
//! use std::time::Duration;
//!
//! // 30 minutes for every namespace
//! let _policy = TtlPolicy::Fixed(Duration::from_secs(1800));
//!
//! // Per namespace
//! let _policy = TtlPolicy::PerType(|namespace| match namespace {
//!     "shop" => Duration::from_secs(1800),
//!     _ => Duration::from_secs(600),
//! });
//! ```

use std::time::Duration;

/// Trait for cache metrics collection.
///
/// Every method has a default that logs through the `log` crate.
pub trait CacheMetrics: Send + Sync {
    /// A live value was served from the store.
    fn record_hit(&self, key: &str, duration: Duration) {
        debug!("Cache HIT: {} took {:?}", key, duration);
    }

    /// The value key was absent (or corrupt) and the loader was consulted.
    fn record_miss(&self, key: &str, duration: Duration) {
        debug!("Cache MISS: {} took {:?}", key, duration);
    }

    /// A null marker answered the lookup without touching the loader.
    fn record_null_hit(&self, key: &str) {
        debug!("Cache NULL HIT: {}", key);
    }

    /// A logically expired value was served.
    fn record_stale(&self, key: &str) {
        debug!("Cache STALE: {}", key);
    }

    /// The loader was invoked.
    fn record_load(&self, key: &str, duration: Duration) {
        debug!("Cache LOAD: {} took {:?}", key, duration);
    }

    /// Another caller held the rebuild lock.
    fn record_lock_contention(&self, key: &str) {
        debug!("Cache LOCK CONTENTION: {}", key);
    }

    /// A background rebuild was handed to the scheduler.
    fn record_rebuild_scheduled(&self, key: &str) {
        debug!("Cache REBUILD SCHEDULED: {}", key);
    }

    /// A value key was deleted.
    fn record_delete(&self, key: &str) {
        debug!("Cache DELETE: {}", key);
    }

    /// Record an error.
    fn record_error(&self, key: &str, error: &str) {
        warn!("Cache ERROR for {}: {}", key, error);
    }
}

/// Default metrics implementation (no-op).
#[derive(Clone, Default)]
pub struct NoOpMetrics;

impl CacheMetrics for NoOpMetrics {
    fn record_hit(&self, _key: &str, _duration: Duration) {}
    fn record_miss(&self, _key: &str, _duration: Duration) {}
    fn record_null_hit(&self, _key: &str) {}
    fn record_stale(&self, _key: &str) {}
    fn record_load(&self, _key: &str, _duration: Duration) {}
    fn record_lock_contention(&self, _key: &str) {}
    fn record_rebuild_scheduled(&self, _key: &str) {}
    fn record_delete(&self, _key: &str) {}
    fn record_error(&self, _key: &str, _error: &str) {}
}

/// Metrics that only log (the trait defaults).
#[derive(Clone, Default)]
pub struct LogMetrics;

impl CacheMetrics for LogMetrics {}

/// TTL (Time-to-Live) policy for plain value entries.
#[derive(Clone, Debug, Default)]
pub enum TtlPolicy {
    /// Use backend's default TTL (no physical expiry)
    #[default]
    Default,

    /// Fixed duration for all entries
    Fixed(Duration),

    /// No TTL (entries live until invalidated)
    Infinite,

    /// Custom per-namespace policy
    PerType(fn(&str) -> Duration),
}

impl TtlPolicy {
    /// Get TTL for a namespace.
    pub fn get_ttl(&self, namespace: &str) -> Option<Duration> {
        match self {
            TtlPolicy::Default => None,
            TtlPolicy::Fixed(d) => Some(*d),
            TtlPolicy::Infinite => None,
            TtlPolicy::PerType(f) => Some(f(namespace)),
        }
    }
}
