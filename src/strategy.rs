//! Cache strategies and lookup outcomes.
//!
//! # The Three Strategies
//!
//! | Strategy | Hit | Miss | Expired | Protects against |
//! |----------|-----|------|---------|------------------|
//! | **PassThrough** | Return | Load, cache value or null marker | Physical TTL | Penetration |
//! | **BlockingRetry** | Return | One caller loads under lock, others retry | Physical TTL | Penetration + stampede |
//! | **LogicalExpiry** | Return | `Unknown` (no load) | Serve stale, rebuild in background | Stampede on pre-warmed hot keys |
//!
//! # Decision Tree
//!
//! ```text
//! Is the key a pre-warmed hot key?
//!     ├─ YES, and readers must never wait
//!     │  └─ Use: LogicalExpiry (warm it first)
//!     │
//!     ├─ NO, but rebuilds are expensive and traffic is bursty
//!     │  └─ Use: BlockingRetry
//!     │
//!     └─ Otherwise
//!        └─ Use: PassThrough
//! ```

/// Strategy enum selecting how a lookup is served.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum CacheStrategy {
    /// **PassThrough**: cache-aside with negative caching.
    ///
    /// Flow:
    /// 1. Check value key
    /// 2. Value: return it. Null marker: return `Absent`
    /// 3. Missing: load, store value (normal TTL) or null marker (short TTL)
    #[default]
    PassThrough,

    /// **BlockingRetry**: like PassThrough, but only the lock holder loads.
    ///
    /// Flow:
    /// 1. Check value key
    /// 2. Missing: try lock
    /// 3. Acquired: double check, load, store, release
    /// 4. Busy: sleep, retry from 1 (bounded; then `RebuildTimeout`)
    BlockingRetry,

    /// **LogicalExpiry**: stale-while-revalidate for pre-warmed keys.
    ///
    /// Flow:
    /// 1. Check value key; missing: return `Unknown`
    /// 2. Not logically expired: return value
    /// 3. Expired: return stale value, and if the lock is free schedule one
    ///    background rebuild
    LogicalExpiry,
}

impl std::fmt::Display for CacheStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CacheStrategy::PassThrough => write!(f, "PassThrough"),
            CacheStrategy::BlockingRetry => write!(f, "BlockingRetry"),
            CacheStrategy::LogicalExpiry => write!(f, "LogicalExpiry"),
        }
    }
}

/// Outcome of a cache lookup.
#[derive(Clone, Debug, PartialEq)]
pub enum Lookup<T> {
    /// Live value, from the store or freshly loaded.
    Fresh(T),
    /// Logically expired value; a rebuild is scheduled or already running.
    Stale(T),
    /// The id is confirmed not to exist (null marker or loader said so).
    Absent,
    /// Logical expiry only: the key was never warmed, nothing is known.
    Unknown,
}

impl<T> Lookup<T> {
    /// The value, fresh or stale.
    pub fn into_value(self) -> Option<T> {
        match self {
            Lookup::Fresh(v) | Lookup::Stale(v) => Some(v),
            Lookup::Absent | Lookup::Unknown => None,
        }
    }

    pub fn value(&self) -> Option<&T> {
        match self {
            Lookup::Fresh(v) | Lookup::Stale(v) => Some(v),
            Lookup::Absent | Lookup::Unknown => None,
        }
    }

    pub fn is_fresh(&self) -> bool {
        matches!(self, Lookup::Fresh(_))
    }

    pub fn is_stale(&self) -> bool {
        matches!(self, Lookup::Stale(_))
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, Lookup::Absent)
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, Lookup::Unknown)
    }
}
