//! Postcard-based cache serialization with versioned envelopes.
//!
//! Every payload written by this crate is wrapped in a versioned envelope:
//!
//! ```text
//! ┌─────────────────┬─────────────────┬──────────────────────────┐
//! │  MAGIC (4 bytes)│VERSION (varint) │POSTCARD PAYLOAD (N bytes)│
//! └─────────────────┴─────────────────┴──────────────────────────┘
//!   "CKSH"              u32                postcard::to_allocvec(T)
//! ```
//!
//! A value key holds one of three things:
//!
//! | Bytes | Meaning |
//! |-------|---------|
//! | key absent | never looked up, evicted or invalidated |
//! | empty (`NULL_MARKER`) | loader confirmed the id does not exist |
//! | envelope of `T` | plain entry (pass-through / blocking-retry) |
//! | envelope of `LogicalEntry<T>` | wrapped entry (logical expiry) |
//!
//! The null marker can never collide with a real entry because every envelope
//! starts with the four magic bytes.
//!
//! # Example
//!
//! ```rust
//! use cache_shield::serialization::{serialize_for_cache, deserialize_from_cache};
//! use serde::{Serialize, Deserialize};
//!
//! #[derive(Serialize, Deserialize, PartialEq, Debug)]
//! struct Shop {
//!     id: u64,
//!     name: String,
//! }
//!
//! # fn main() -> cache_shield::Result<()> {
//! let shop = Shop { id: 1, name: "A".to_string() };
//! let bytes = serialize_for_cache(&shop)?;
//! let decoded: Shop = deserialize_from_cache(&bytes)?;
//! assert_eq!(shop, decoded);
//! # Ok(())
//! # }
//! ```

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// Magic header for cache-shield entries: b"CKSH"
pub const CACHE_MAGIC: [u8; 4] = *b"CKSH";

/// Current schema version.
///
/// **CRITICAL:** Increment this constant when making breaking changes to cached types.
/// Old entries are then treated as corrupt and reloaded from the system of record.
pub const CURRENT_SCHEMA_VERSION: u32 = 1;

/// Sentinel stored under a value key when the loader reported the id as absent.
pub const NULL_MARKER: &[u8] = b"";

/// Versioned envelope for cache entries.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct CacheEnvelope<T> {
    /// Magic header: must be b"CKSH"
    pub magic: [u8; 4],
    /// Schema version: must match CURRENT_SCHEMA_VERSION
    pub version: u32,
    /// The actual cached data
    pub payload: T,
}

impl<T> CacheEnvelope<T> {
    /// Create a new envelope with current magic and version.
    pub fn new(payload: T) -> Self {
        Self {
            magic: CACHE_MAGIC,
            version: CURRENT_SCHEMA_VERSION,
            payload,
        }
    }
}

/// Value wrapped with an application-level expiry, stored with no physical TTL.
///
/// Staleness is decided only by comparing `logical_expire_at` (epoch
/// milliseconds) with the current time; the store never evicts the entry.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LogicalEntry<T> {
    pub data: T,
    pub logical_expire_at: i64,
}

impl<T> LogicalEntry<T> {
    pub fn new(data: T, logical_expire_at: i64) -> Self {
        LogicalEntry {
            data,
            logical_expire_at,
        }
    }

    /// True once `now_millis` has reached the logical expiry.
    pub fn is_expired(&self, now_millis: i64) -> bool {
        self.logical_expire_at <= now_millis
    }
}

/// True if `bytes` is the null marker.
pub fn is_null_marker(bytes: &[u8]) -> bool {
    bytes == NULL_MARKER
}

/// Serialize a value with envelope for cache storage.
///
/// # Errors
///
/// Returns `Error::SerializationError` if Postcard serialization fails.
pub fn serialize_for_cache<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    let envelope = CacheEnvelope::new(value);
    postcard::to_allocvec(&envelope).map_err(|e| {
        log::error!("Cache serialization failed: {}", e);
        Error::SerializationError(e.to_string())
    })
}

/// Deserialize a value from cache storage with validation.
///
/// # Errors
///
/// - `Error::CorruptCacheEntry`: Bad magic header or corrupted payload
/// - `Error::VersionMismatch`: Schema version mismatch
pub fn deserialize_from_cache<'de, T: Deserialize<'de>>(bytes: &'de [u8]) -> Result<T> {
    if is_null_marker(bytes) {
        return Err(Error::CorruptCacheEntry(
            "null marker is not a payload".to_string(),
        ));
    }

    // Check the magic before decoding so foreign data is rejected cheaply
    if bytes.len() < CACHE_MAGIC.len() || bytes[..CACHE_MAGIC.len()] != CACHE_MAGIC {
        log::warn!("Invalid cache entry: magic header mismatch");
        return Err(Error::CorruptCacheEntry(format!(
            "Invalid magic: expected {:?}",
            CACHE_MAGIC
        )));
    }

    let envelope: CacheEnvelope<T> = postcard::from_bytes(bytes).map_err(|e| {
        log::warn!("Cache deserialization failed: {}", e);
        Error::CorruptCacheEntry(e.to_string())
    })?;

    if envelope.version != CURRENT_SCHEMA_VERSION {
        log::warn!(
            "Cache version mismatch: expected {}, got {}",
            CURRENT_SCHEMA_VERSION,
            envelope.version
        );
        return Err(Error::VersionMismatch {
            expected: CURRENT_SCHEMA_VERSION,
            found: envelope.version,
        });
    }

    Ok(envelope.payload)
}
