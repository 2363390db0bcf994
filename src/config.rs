//! Cache client configuration.
//!
//! Defaults:
//!
//! | Setting | Default | Env override |
//! |---------|---------|--------------|
//! | value TTL | 30 min | `CACHE_VALUE_TTL_SECS` |
//! | null marker TTL | 2 min | `CACHE_NULL_TTL_SECS` |
//! | lock TTL | 10 s | `CACHE_LOCK_TTL_SECS` |
//! | logical TTL (rebuilds) | 30 min | `CACHE_LOGICAL_TTL_SECS` |
//! | retry backoff | 50 ms | `CACHE_RETRY_BACKOFF_MS` |
//! | retry attempts | 200 | `CACHE_RETRY_MAX_ATTEMPTS` |
//! | rebuild workers | 10 | `CACHE_REBUILD_WORKERS` |
//! | rebuild queue | 1024 | `CACHE_REBUILD_QUEUE` |

use crate::error::{Error, Result};
use crate::observability::TtlPolicy;
use std::time::Duration;

pub const DEFAULT_VALUE_TTL: Duration = Duration::from_secs(30 * 60);
pub const DEFAULT_NULL_TTL: Duration = Duration::from_secs(2 * 60);
pub const DEFAULT_LOCK_TTL: Duration = Duration::from_secs(10);
pub const DEFAULT_LOGICAL_TTL: Duration = Duration::from_secs(30 * 60);

/// Bounded retry for callers that lost the rebuild lock.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Sleep between attempts.
    pub backoff: Duration,
    /// Total attempts, the first one included.
    pub max_attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            backoff: Duration::from_millis(50),
            max_attempts: 200,
        }
    }
}

impl RetryPolicy {
    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Upper bound of the time a caller spends sleeping.
    pub fn max_wait(&self) -> Duration {
        self.backoff
            .saturating_mul(self.max_attempts.saturating_sub(1))
    }
}

/// Rebuild worker pool sizing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SchedulerConfig {
    /// Number of worker tasks.
    pub workers: usize,
    /// Pending tasks accepted before submissions are rejected.
    pub queue_capacity: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        SchedulerConfig {
            workers: 10,
            queue_capacity: 1024,
        }
    }
}

impl SchedulerConfig {
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn with_queue_capacity(mut self, queue_capacity: usize) -> Self {
        self.queue_capacity = queue_capacity;
        self
    }
}

/// Configuration shared by all strategies of a cache client.
///
/// # Example
///
/// ```
/// use cache_shield::config::{CacheConfig, RetryPolicy};
/// use std::time::Duration;
///
/// let config = CacheConfig::default()
///     .with_null_ttl(Duration::from_secs(60))
///     .with_lock_ttl(Duration::from_secs(5))
///     .with_retry(RetryPolicy::default().with_max_attempts(20));
///
/// assert!(config.validate().is_ok());
/// ```
#[derive(Clone, Debug)]
pub struct CacheConfig {
    /// Physical TTL of plain value entries.
    pub value_ttl: TtlPolicy,
    /// Physical TTL of null markers.
    pub null_ttl: Duration,
    /// Physical TTL of lock keys. Keep it longer than a typical load.
    pub lock_ttl: Duration,
    /// Logical TTL written by background rebuilds.
    pub logical_ttl: Duration,
    /// Retry budget of the blocking-retry strategy.
    pub retry: RetryPolicy,
    /// Rebuild worker pool sizing.
    pub scheduler: SchedulerConfig,
}

impl Default for CacheConfig {
    fn default() -> Self {
        CacheConfig {
            value_ttl: TtlPolicy::Fixed(DEFAULT_VALUE_TTL),
            null_ttl: DEFAULT_NULL_TTL,
            lock_ttl: DEFAULT_LOCK_TTL,
            logical_ttl: DEFAULT_LOGICAL_TTL,
            retry: RetryPolicy::default(),
            scheduler: SchedulerConfig::default(),
        }
    }
}

impl CacheConfig {
    pub fn with_value_ttl(mut self, policy: TtlPolicy) -> Self {
        self.value_ttl = policy;
        self
    }

    pub fn with_null_ttl(mut self, ttl: Duration) -> Self {
        self.null_ttl = ttl;
        self
    }

    pub fn with_lock_ttl(mut self, ttl: Duration) -> Self {
        self.lock_ttl = ttl;
        self
    }

    pub fn with_logical_ttl(mut self, ttl: Duration) -> Self {
        self.logical_ttl = ttl;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_scheduler(mut self, scheduler: SchedulerConfig) -> Self {
        self.scheduler = scheduler;
        self
    }

    /// Defaults overridden by `CACHE_*` environment variables.
    ///
    /// # Errors
    /// Returns `Error::ConfigError` if a variable is set but not a valid
    /// number, or if the resulting configuration fails [`validate`].
    ///
    /// [`validate`]: CacheConfig::validate
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = CacheConfig::default();

        if let Some(secs) = parse_var::<u64>(&lookup, "CACHE_VALUE_TTL_SECS")? {
            config.value_ttl = TtlPolicy::Fixed(Duration::from_secs(secs));
        }
        if let Some(secs) = parse_var::<u64>(&lookup, "CACHE_NULL_TTL_SECS")? {
            config.null_ttl = Duration::from_secs(secs);
        }
        if let Some(secs) = parse_var::<u64>(&lookup, "CACHE_LOCK_TTL_SECS")? {
            config.lock_ttl = Duration::from_secs(secs);
        }
        if let Some(secs) = parse_var::<u64>(&lookup, "CACHE_LOGICAL_TTL_SECS")? {
            config.logical_ttl = Duration::from_secs(secs);
        }
        if let Some(ms) = parse_var::<u64>(&lookup, "CACHE_RETRY_BACKOFF_MS")? {
            config.retry.backoff = Duration::from_millis(ms);
        }
        if let Some(attempts) = parse_var::<u32>(&lookup, "CACHE_RETRY_MAX_ATTEMPTS")? {
            config.retry.max_attempts = attempts;
        }
        if let Some(workers) = parse_var::<usize>(&lookup, "CACHE_REBUILD_WORKERS")? {
            config.scheduler.workers = workers;
        }
        if let Some(capacity) = parse_var::<usize>(&lookup, "CACHE_REBUILD_QUEUE")? {
            config.scheduler.queue_capacity = capacity;
        }

        config.validate()?;
        info!(
            "✓ Cache config loaded (lock TTL: {:?}, null TTL: {:?}, workers: {})",
            config.lock_ttl, config.null_ttl, config.scheduler.workers
        );
        Ok(config)
    }

    /// Reject settings that would break the lock or retry invariants.
    pub fn validate(&self) -> Result<()> {
        if self.lock_ttl.is_zero() {
            return Err(Error::ConfigError("lock TTL must be positive".to_string()));
        }
        if self.null_ttl.is_zero() {
            return Err(Error::ConfigError(
                "null marker TTL must be positive".to_string(),
            ));
        }
        if self.retry.backoff.is_zero() {
            return Err(Error::ConfigError(
                "retry backoff must be positive".to_string(),
            ));
        }
        if self.retry.max_attempts == 0 {
            return Err(Error::ConfigError(
                "retry max_attempts must be at least 1".to_string(),
            ));
        }
        if self.scheduler.workers == 0 || self.scheduler.queue_capacity == 0 {
            return Err(Error::ConfigError(
                "rebuild pool needs at least one worker and one queue slot".to_string(),
            ));
        }
        Ok(())
    }
}

fn parse_var<V: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &str,
) -> Result<Option<V>> {
    match lookup(name) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<V>()
            .map(Some)
            .map_err(|_| Error::ConfigError(format!("{} is not a valid number: {:?}", name, raw))),
    }
}
