//! In-memory store (default, thread-safe, async).
//!
//! Uses DashMap for concurrent access with per-key sharding.
//! Physical TTLs are enforced lazily on access, and every
//! [`SWEEP_INTERVAL`] writes a sweep drops whatever has expired since, so
//! keys that are written once and never read again (null markers for
//! ids that do not exist) do not pile up.

use super::CacheBackend;
use crate::error::Result;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use std::time::Instant;

/// Writes between two sweeps of expired entries.
pub const SWEEP_INTERVAL: u64 = 1024;

/// Stored bytes with optional physical expiration.
struct StoredValue {
    data: Vec<u8>,
    expires_at: Option<Instant>,
}

impl StoredValue {
    fn new(data: Vec<u8>, ttl: Option<Duration>) -> Self {
        let expires_at = ttl.map(|d| Instant::now() + d);
        StoredValue { data, expires_at }
    }

    fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|exp| Instant::now() >= exp)
    }
}

/// Thread-safe async in-memory store.
///
/// `set_if_absent` and `delete_if_equals` run under the shard lock of the
/// key, which makes them atomic with respect to every other operation on the
/// same key. Clones share the same map, so a clone handed to a rebuild task
/// sees the same data as the caller.
///
/// # Example
///
/// ```no_run
/// use cache_shield::backend::{InMemoryBackend, CacheBackend};
/// use std::time::Duration;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let backend = InMemoryBackend::new();
///
///     backend.set("shop:1", b"value".to_vec(), None).await?;
///     assert!(backend.get("shop:1").await?.is_some());
///
///     // Only the first caller creates the lock key
///     let ttl = Duration::from_secs(10);
///     assert!(backend.set_if_absent("lock:shop:1", b"a".to_vec(), ttl).await?);
///     assert!(!backend.set_if_absent("lock:shop:1", b"b".to_vec(), ttl).await?);
///
///     Ok(())
/// }
/// ```
#[derive(Clone)]
pub struct InMemoryBackend {
    store: Arc<DashMap<String, StoredValue>>,
    writes: Arc<AtomicU64>,
}

impl InMemoryBackend {
    /// Create a new in-memory store.
    pub fn new() -> Self {
        InMemoryBackend {
            store: Arc::new(DashMap::new()),
            writes: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Drop every physically expired entry. Returns how many were removed.
    pub async fn purge_expired(&self) -> usize {
        self.sweep()
    }

    fn sweep(&self) -> usize {
        let before = self.store.len();
        self.store.retain(|_, entry| !entry.is_expired());
        let removed = before.saturating_sub(self.store.len());
        if removed > 0 {
            debug!("✓ InMemory SWEEP removed {} expired entries", removed);
        }
        removed
    }

    // Must not run while a map reference is held
    fn note_write(&self) {
        let writes = self.writes.fetch_add(1, Ordering::Relaxed) + 1;
        if writes % SWEEP_INTERVAL == 0 {
            self.sweep();
        }
    }

    /// Get the current number of entries (expired entries included until
    /// they are read or swept).
    pub async fn len(&self) -> usize {
        self.store.len()
    }

    /// Check if the store is empty.
    pub async fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    /// Get memory statistics.
    pub async fn stats(&self) -> StoreStats {
        let total_bytes: usize = self.store.iter().map(|entry| entry.data.len()).sum();
        let expired_count = self.store.iter().filter(|entry| entry.is_expired()).count();

        StoreStats {
            total_entries: self.store.len(),
            expired_entries: expired_count,
            total_bytes,
        }
    }

    /// Remaining physical TTL of a key, if it has one.
    pub async fn ttl(&self, key: &str) -> Option<Duration> {
        let entry = self.store.get(key)?;
        if entry.is_expired() {
            return None;
        }
        entry
            .expires_at
            .map(|exp| exp.saturating_duration_since(Instant::now()))
    }
}

impl Default for InMemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl CacheBackend for InMemoryBackend {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        if let Some(entry) = self.store.get(key) {
            if !entry.is_expired() {
                debug!("✓ InMemory GET {} -> HIT", key);
                return Ok(Some(entry.data.clone()));
            }
        }

        // Drop the expired entry, but never one that was replaced meanwhile
        self.store.remove_if(key, |_, entry| entry.is_expired());
        debug!("✓ InMemory GET {} -> MISS", key);
        Ok(None)
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> Result<()> {
        self.store
            .insert(key.to_string(), StoredValue::new(value, ttl));

        if let Some(d) = ttl {
            debug!("✓ InMemory SET {} (TTL: {:?})", key, d);
        } else {
            debug!("✓ InMemory SET {}", key);
        }

        self.note_write();
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.store.remove(key);
        debug!("✓ InMemory DELETE {}", key);
        Ok(())
    }

    async fn set_if_absent(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<bool> {
        let created = match self.store.entry(key.to_string()) {
            Entry::Occupied(mut occupied) => {
                if occupied.get().is_expired() {
                    occupied.insert(StoredValue::new(value, Some(ttl)));
                    true
                } else {
                    false
                }
            }
            Entry::Vacant(vacant) => {
                vacant.insert(StoredValue::new(value, Some(ttl)));
                true
            }
        };

        debug!(
            "✓ InMemory SETNX {} (TTL: {:?}) -> {}",
            key,
            ttl,
            if created { "CREATED" } else { "EXISTS" }
        );
        if created {
            self.note_write();
        }
        Ok(created)
    }

    async fn delete_if_equals(&self, key: &str, expected: &[u8]) -> Result<bool> {
        let removed = self
            .store
            .remove_if(key, |_, entry| !entry.is_expired() && entry.data == expected)
            .is_some();

        debug!(
            "✓ InMemory DELETE-IF-EQUALS {} -> {}",
            key,
            if removed { "DELETED" } else { "KEPT" }
        );
        Ok(removed)
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        if let Some(entry) = self.store.get(key) {
            return Ok(!entry.is_expired());
        }

        Ok(false)
    }

    async fn mget(&self, keys: &[&str]) -> Result<Vec<Option<Vec<u8>>>> {
        let results: Vec<Option<Vec<u8>>> = keys
            .iter()
            .map(|k| match self.store.get(*k) {
                Some(entry) if !entry.is_expired() => Some(entry.data.clone()),
                _ => None,
            })
            .collect();

        debug!("✓ InMemory MGET {} keys", keys.len());
        Ok(results)
    }

    async fn mdelete(&self, keys: &[&str]) -> Result<()> {
        for key in keys {
            self.store.remove(*key);
        }

        debug!("✓ InMemory MDELETE {} keys", keys.len());
        Ok(())
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }

    async fn clear_all(&self) -> Result<()> {
        self.store.clear();
        warn!("⚠ InMemory CLEAR_ALL executed - all entries cleared!");
        Ok(())
    }
}

/// Store statistics.
#[derive(Clone, Debug)]
pub struct StoreStats {
    pub total_entries: usize,
    pub expired_entries: usize,
    pub total_bytes: usize,
}
