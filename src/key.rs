//! Cache key naming.

use crate::entity::CacheEntity;
use std::fmt::Display;

/// Prefix shared by every lock key.
pub const LOCK_PREFIX: &str = "lock";

/// Builder for value and lock keys.
///
/// Every id maps to exactly one value key and, on demand, one lock key:
///
/// ```text
/// value: <namespace>:<id>        e.g. shop:1
/// lock:  lock:<namespace>:<id>   e.g. lock:shop:1
/// ```
pub struct CacheKeyBuilder;

impl CacheKeyBuilder {
    /// Value key for an entity id.
    pub fn build<T: CacheEntity>(id: &T::Key) -> String {
        Self::build_with_prefix(T::cache_prefix(), id)
    }

    /// Lock key for an entity id.
    pub fn lock<T: CacheEntity>(id: &T::Key) -> String {
        Self::lock_with_prefix(T::cache_prefix(), id)
    }

    /// Value key with an explicit namespace.
    pub fn build_with_prefix(prefix: &str, id: &dyn Display) -> String {
        format!("{}:{}", prefix, id)
    }

    /// Lock key with an explicit namespace.
    pub fn lock_with_prefix(prefix: &str, id: &dyn Display) -> String {
        format!("{}:{}:{}", LOCK_PREFIX, prefix, id)
    }

    /// Lock key guarding an existing value key.
    pub fn lock_for(value_key: &str) -> String {
        format!("{}:{}", LOCK_PREFIX, value_key)
    }
}
