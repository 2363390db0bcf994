//! Core entity trait that all cached values must implement.

use crate::error::Result;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt::Display;
use std::hash::Hash;

/// Trait that all values stored in the cache must implement.
///
/// The payload type is fixed at compile time and decoded through serde, so
/// a shape mismatch surfaces as a corrupt entry instead of a value of the
/// wrong type.
///
/// # Example
///
/// ```
/// use serde::{Deserialize, Serialize};
/// use cache_shield::CacheEntity;
///
/// #[derive(Clone, Serialize, Deserialize)]
/// pub struct Shop {
///     pub id: u64,
///     pub name: String,
/// }
///
/// impl CacheEntity for Shop {
///     type Key = u64;
///
///     fn cache_key(&self) -> Self::Key {
///         self.id
///     }
///
///     fn cache_prefix() -> &'static str {
///         "shop"
///     }
/// }
/// ```
pub trait CacheEntity: Send + Sync + Serialize + DeserializeOwned + Clone + 'static {
    /// Type of the entity's id.
    type Key: Display + Clone + Send + Sync + Eq + Hash + 'static;

    /// Return the entity's id.
    fn cache_key(&self) -> Self::Key;

    /// Namespace for this entity type.
    ///
    /// Value keys are `"{prefix}:{id}"`, lock keys `"lock:{prefix}:{id}"`.
    fn cache_prefix() -> &'static str;

    /// Serialize entity for cache storage (versioned postcard envelope).
    fn serialize_for_cache(&self) -> Result<Vec<u8>> {
        crate::serialization::serialize_for_cache(self)
    }

    /// Deserialize entity from cache storage.
    ///
    /// # Errors
    ///
    /// - `Error::CorruptCacheEntry`: Bad magic or corrupted payload
    /// - `Error::VersionMismatch`: Schema version changed
    fn deserialize_from_cache(bytes: &[u8]) -> Result<Self> {
        crate::serialization::deserialize_from_cache(bytes)
    }

    /// Optional: Validate entity after deserialization.
    ///
    /// An error here is handled like a corrupt entry.
    fn validate(&self) -> Result<()> {
        Ok(())
    }
}
