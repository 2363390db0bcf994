//! Error types for the cache client.

use std::fmt;

/// Result type for cache operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for the cache client.
///
/// Infrastructure failures (store, loader) surface to the caller. Lock
/// coordination outcomes stay internal; the only coordination error a reader
/// can observe is [`Error::RebuildTimeout`].
#[derive(Debug, Clone)]
pub enum Error {
    /// The key-value store is unreachable or returned an error.
    ///
    /// Fatal for the current call and never treated as a cache miss.
    /// Common causes:
    /// - Redis connection lost or pool exhausted
    /// - Network timeout
    /// - Script/protocol error
    StoreUnavailable(String),

    /// The system of record failed while loading a value.
    ///
    /// Propagated to the caller and never converted into a null marker, so a
    /// transient outage does not poison the cache with false absences.
    LoaderFailed(String),

    /// Serialization failed when converting a value to cache bytes.
    SerializationError(String),

    /// A cached payload could not be decoded.
    ///
    /// Readers treat this as a miss: the entry is reloaded and overwritten.
    CorruptCacheEntry(String),

    /// Schema version mismatch between code and cached data.
    ///
    /// Handled like [`Error::CorruptCacheEntry`]: the entry is reloaded.
    VersionMismatch {
        /// Expected schema version (from compiled code)
        expected: u32,
        /// Found schema version (from cached entry)
        found: u32,
    },

    /// The blocking-retry strategy exhausted its retry budget while another
    /// caller held the rebuild lock.
    RebuildTimeout {
        /// Value key that could not be rebuilt
        key: String,
        /// Number of attempts made before giving up
        attempts: u32,
    },

    /// Another caller holds the rebuild lock.
    ///
    /// Internal signal. Strategies turn it into a retry or a no-op and never
    /// return it from a read.
    LockContention(String),

    /// The rebuild scheduler refused a task (shut down or queue full).
    SchedulerUnavailable(String),

    /// A rebuild task panicked. The lock was still released.
    RebuildPanicked(String),

    /// Invalid configuration.
    ConfigError(String),
}

impl Error {
    /// Wrap a system-of-record failure.
    pub fn loader(e: impl fmt::Display) -> Self {
        Error::LoaderFailed(e.to_string())
    }

    /// True for decode failures that readers recover from by reloading.
    pub fn is_corrupt_entry(&self) -> bool {
        matches!(
            self,
            Error::CorruptCacheEntry(_) | Error::VersionMismatch { .. }
        )
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::StoreUnavailable(msg) => write!(f, "Store unavailable: {}", msg),
            Error::LoaderFailed(msg) => write!(f, "Loader failed: {}", msg),
            Error::SerializationError(msg) => write!(f, "Serialization error: {}", msg),
            Error::CorruptCacheEntry(msg) => write!(f, "Corrupt cache entry: {}", msg),
            Error::VersionMismatch { expected, found } => {
                write!(
                    f,
                    "Cache version mismatch: expected {}, found {}",
                    expected, found
                )
            }
            Error::RebuildTimeout { key, attempts } => {
                write!(
                    f,
                    "Rebuild timeout: {} still locked after {} attempts",
                    key, attempts
                )
            }
            Error::LockContention(key) => write!(f, "Lock contention on {}", key),
            Error::SchedulerUnavailable(msg) => write!(f, "Scheduler unavailable: {}", msg),
            Error::RebuildPanicked(key) => write!(f, "Rebuild task panicked for {}", key),
            Error::ConfigError(msg) => write!(f, "Config error: {}", msg),
        }
    }
}

impl std::error::Error for Error {}

// ============================================================================
// Conversions from other error types
// ============================================================================

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::StoreUnavailable(e.to_string())
    }
}

impl From<postcard::Error> for Error {
    fn from(e: postcard::Error) -> Self {
        Error::CorruptCacheEntry(e.to_string())
    }
}

#[cfg(feature = "redis")]
impl From<redis::RedisError> for Error {
    fn from(e: redis::RedisError) -> Self {
        Error::StoreUnavailable(format!("Redis error: {}", e))
    }
}
