//! Store adapter: key-value backends behind a uniform async contract.

use crate::error::Result;
use std::future::Future;
use std::time::Duration;

pub mod inmemory;
#[cfg(feature = "redis")]
pub mod redis;

pub use inmemory::InMemoryBackend;
#[cfg(feature = "redis")]
pub use redis::{PoolStats, RedisBackend, RedisConfig};

/// Trait for key-value store implementations.
///
/// Besides plain get/set/delete the contract carries the two atomic
/// primitives the distributed lock is built on: [`set_if_absent`] and
/// [`delete_if_equals`]. All coordination between callers (and between
/// processes) goes through these two operations.
///
/// **IMPORTANT:** All methods use `&self` to allow concurrent access.
/// Implementations use interior mutability or external storage.
///
/// **ASYNC:** Every returned future is `Send` so that rebuild tasks holding a
/// backend can be moved onto the rebuild worker pool.
///
/// **ERRORS:** An unreachable backend must be reported as
/// [`Error::StoreUnavailable`](crate::Error::StoreUnavailable), never as a
/// miss.
///
/// [`set_if_absent`]: CacheBackend::set_if_absent
/// [`delete_if_equals`]: CacheBackend::delete_if_equals
pub trait CacheBackend: Send + Sync + Clone + 'static {
    /// Retrieve value from the store by key.
    ///
    /// # Returns
    /// - `Ok(Some(bytes))` - Value found (an empty vector is a valid value)
    /// - `Ok(None)` - Key absent or physically expired
    fn get(&self, key: &str) -> impl Future<Output = Result<Option<Vec<u8>>>> + Send;

    /// Store value with optional physical TTL.
    ///
    /// `ttl = None` means the store never evicts the entry on its own.
    fn set(
        &self,
        key: &str,
        value: Vec<u8>,
        ttl: Option<Duration>,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Remove value from the store. Deleting an absent key is not an error.
    fn delete(&self, key: &str) -> impl Future<Output = Result<()>> + Send;

    /// Atomically create `key` with `value` and `ttl` if it does not exist.
    ///
    /// Returns `true` if this call created the key.
    fn set_if_absent(
        &self,
        key: &str,
        value: Vec<u8>,
        ttl: Duration,
    ) -> impl Future<Output = Result<bool>> + Send;

    /// Atomically delete `key` only if its current value equals `expected`.
    ///
    /// Returns `true` if the key was deleted.
    fn delete_if_equals(
        &self,
        key: &str,
        expected: &[u8],
    ) -> impl Future<Output = Result<bool>> + Send;

    /// Check if key exists (optional optimization).
    fn exists(&self, key: &str) -> impl Future<Output = Result<bool>> + Send {
        async move { Ok(self.get(key).await?.is_some()) }
    }

    /// Bulk get operation (optional optimization).
    ///
    /// Default implementation calls `get()` for each key.
    fn mget(&self, keys: &[&str]) -> impl Future<Output = Result<Vec<Option<Vec<u8>>>>> + Send {
        async move {
            let mut results = Vec::with_capacity(keys.len());
            for key in keys {
                results.push(self.get(key).await?);
            }
            Ok(results)
        }
    }

    /// Bulk delete operation (optional optimization).
    fn mdelete(&self, keys: &[&str]) -> impl Future<Output = Result<()>> + Send {
        async move {
            for key in keys {
                self.delete(key).await?;
            }
            Ok(())
        }
    }

    /// Health check - verify backend is accessible.
    fn health_check(&self) -> impl Future<Output = Result<bool>> + Send {
        async { Ok(true) }
    }

    /// Clear the whole store (use with caution).
    fn clear_all(&self) -> impl Future<Output = Result<()>> + Send {
        async {
            Err(crate::error::Error::ConfigError(
                "clear_all not supported by this backend".to_string(),
            ))
        }
    }
}

/// Store whose every call fails as if the server were unreachable.
#[cfg(test)]
#[derive(Clone, Default)]
pub(crate) struct UnreachableBackend;

#[cfg(test)]
impl UnreachableBackend {
    fn refused<T>() -> Result<T> {
        Err(crate::error::Error::StoreUnavailable(
            "connection refused".to_string(),
        ))
    }
}

#[cfg(test)]
impl CacheBackend for UnreachableBackend {
    async fn get(&self, _key: &str) -> Result<Option<Vec<u8>>> {
        Self::refused()
    }

    async fn set(&self, _key: &str, _value: Vec<u8>, _ttl: Option<Duration>) -> Result<()> {
        Self::refused()
    }

    async fn delete(&self, _key: &str) -> Result<()> {
        Self::refused()
    }

    async fn set_if_absent(&self, _key: &str, _value: Vec<u8>, _ttl: Duration) -> Result<bool> {
        Self::refused()
    }

    async fn delete_if_equals(&self, _key: &str, _expected: &[u8]) -> Result<bool> {
        Self::refused()
    }

    async fn health_check(&self) -> Result<bool> {
        Self::refused()
    }
}
