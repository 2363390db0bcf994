//! Distributed advisory lock built on the store's set-if-absent primitive.
//!
//! ```text
//! try_acquire:  SET lock:<ns>:<id> <token> NX PX <ttl>   -> guard | none
//! release:      DEL lock:<ns>:<id> IF value == <token>
//! ```
//!
//! The token makes release safe after a TTL expiry: if the original holder
//! was too slow and another caller re-acquired the key, the late release
//! finds a different token and leaves the new holder's lock alone. A crashed
//! holder's lock disappears after at most one TTL.

use crate::backend::CacheBackend;
use crate::error::Result;
use std::fmt;
use std::time::Duration;
use uuid::Uuid;

/// Opaque per-acquisition token.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct LockToken(String);

impl LockToken {
    /// Generate a fresh, globally unique token.
    pub fn generate() -> Self {
        LockToken(Uuid::now_v7().to_string())
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LockToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Short-TTL advisory lock over a [`CacheBackend`].
#[derive(Clone)]
pub struct DistributedLock<B: CacheBackend> {
    backend: B,
    ttl: Duration,
}

impl<B: CacheBackend> DistributedLock<B> {
    pub fn new(backend: B, ttl: Duration) -> Self {
        DistributedLock { backend, ttl }
    }

    /// Lock TTL (the deadlock fuse).
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Try to become the exclusive holder of `lock_key`.
    ///
    /// Returns `Ok(None)` when another caller holds the lock.
    ///
    /// # Errors
    /// Returns `Error::StoreUnavailable` if the store cannot be reached.
    pub async fn try_acquire(&self, lock_key: &str) -> Result<Option<LockGuard<B>>> {
        let token = LockToken::generate();
        let acquired = self
            .backend
            .set_if_absent(lock_key, token.as_bytes().to_vec(), self.ttl)
            .await?;

        if acquired {
            debug!("✓ Lock acquired: {} (token {})", lock_key, token);
            Ok(Some(LockGuard {
                lock: self.clone(),
                key: lock_key.to_string(),
                token,
                released: false,
            }))
        } else {
            debug!("Lock busy: {}", lock_key);
            Ok(None)
        }
    }

    /// Release `lock_key` if it is still held with `token`.
    ///
    /// Returns `true` if this call deleted the lock, `false` if the lock had
    /// already expired or belongs to someone else.
    pub async fn release(&self, lock_key: &str, token: &LockToken) -> Result<bool> {
        let released = self
            .backend
            .delete_if_equals(lock_key, token.as_bytes())
            .await?;

        if released {
            debug!("✓ Lock released: {}", lock_key);
        } else {
            warn!(
                "Lock {} was no longer held by token {} (expired or re-acquired)",
                lock_key, token
            );
        }
        Ok(released)
    }
}

/// Proof of lock ownership.
///
/// Call [`release`](LockGuard::release) on every normal exit path. A guard
/// that is dropped unreleased (early return, panic, cancelled future)
/// schedules the token-checked release on the current Tokio runtime; outside
/// a runtime the lock is left to its TTL.
pub struct LockGuard<B: CacheBackend> {
    lock: DistributedLock<B>,
    key: String,
    token: LockToken,
    released: bool,
}

impl<B: CacheBackend> LockGuard<B> {
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn token(&self) -> &LockToken {
        &self.token
    }

    /// Release the lock now.
    pub async fn release(mut self) -> Result<bool> {
        self.released = true;
        self.lock.release(&self.key, &self.token).await
    }
}

impl<B: CacheBackend> Drop for LockGuard<B> {
    fn drop(&mut self) {
        if self.released {
            return;
        }

        let lock = self.lock.clone();
        let key = std::mem::take(&mut self.key);
        let token = self.token.clone();

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                debug!("Lock guard for {} dropped unreleased, releasing in background", key);
                handle.spawn(async move {
                    if let Err(e) = lock.release(&key, &token).await {
                        warn!("Background release of {} failed: {}", key, e);
                    }
                });
            }
            Err(_) => {
                warn!(
                    "Lock guard for {} dropped outside a runtime; lock expires after its TTL",
                    key
                );
            }
        }
    }
}
