//! # cache-shield
//!
//! Cache-aside reads over a shared key-value store, hardened against the
//! three classic failure modes of a read-through cache.
//!
//! ## Features
//!
//! - **Penetration:** ids the system of record does not have are cached as a
//!   short-lived null marker, so repeated lookups never reach the loader
//! - **Breakdown (blocking retry):** on a miss one caller loads under a
//!   distributed lock while the others back off and re-read
//! - **Breakdown (logical expiry):** pre-warmed hot keys never expire in the
//!   store; expired values are served stale while one background rebuild
//!   refreshes them
//! - **Backend Agnostic:** in-memory and Redis backends, or your own
//! - **Type Safe:** payloads are typed and decoded from a versioned envelope
//!
//! ## Quick Start
//!
//! ### For Web Applications (Recommended)
//!
//! Use [`CacheService`], which owns the rebuild worker pool:
//!
//! ```ignore
//! use cache_shield::{
//!     CacheConfig, CacheEntity, CacheService, CacheStrategy, Loader, Result,
//!     backend::InMemoryBackend,
//! };
//! use serde::{Deserialize, Serialize};
//! use std::time::Duration;
//!
//! // 1. Define your entity
//! #[derive(Clone, Serialize, Deserialize)]
//! struct Shop {
//!     id: u64,
//!     name: String,
//! }
//!
//! // 2. Implement CacheEntity
//! impl CacheEntity for Shop {
//!     type Key = u64;
//!     fn cache_key(&self) -> Self::Key { self.id }
//!     fn cache_prefix() -> &'static str { "shop" }
//! }
//!
//! // 3. Implement Loader for your system of record
//! #[derive(Clone)]
//! struct ShopRepository { /* db pool */ }
//!
//! impl Loader<Shop> for ShopRepository {
//!     async fn load(&self, id: &u64) -> Result<Option<Shop>> {
//!         // SELECT ... WHERE id = $1
//!     }
//! }
//!
//! // 4. Start the service (inside a Tokio runtime)
//! let cache = CacheService::start(InMemoryBackend::new(), CacheConfig::default())?;
//!
//! // 5. Read through the cache
//! let shop = cache.fetch(&1, &repo, CacheStrategy::BlockingRetry).await?;
//!
//! // Hot keys: warm once, then read with logical expiry
//! cache.warm(&1, &repo, Duration::from_secs(1800)).await?;
//! let shop = cache.fetch(&1, &repo, CacheStrategy::LogicalExpiry).await?;
//!
//! // Writes: update the database, then invalidate
//! cache.update::<Shop, _, _>(&1, repo.save(shop)).await?;
//!
//! cache.shutdown().await;
//! ```
//!
//! ### For Custom Patterns (Advanced)
//!
//! Use [`CacheClient`] with your own [`RebuildScheduler`]:
//!
//! ```ignore
//! use cache_shield::{CacheClient, InlineScheduler, backend::InMemoryBackend};
//! use std::sync::Arc;
//!
//! // Rebuilds run inside the reading call (deterministic, for tests)
//! let client = CacheClient::new(InMemoryBackend::new(), Arc::new(InlineScheduler));
//! ```

#[macro_use]
extern crate log;

pub mod backend;
pub mod blocking;
pub mod client;
pub mod clock;
pub mod config;
pub mod entity;
pub mod error;
pub mod guard;
pub mod key;
pub mod loader;
pub mod lock;
pub mod logical;
pub mod observability;
pub mod scheduler;
pub mod serialization;
pub mod service;
pub mod strategy;

// Re-exports for convenience
pub use backend::CacheBackend;
pub use client::CacheClient;
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{CacheConfig, RetryPolicy, SchedulerConfig};
pub use entity::CacheEntity;
pub use error::{Error, Result};
pub use loader::Loader;
pub use lock::{DistributedLock, LockGuard, LockToken};
pub use scheduler::{InlineScheduler, RebuildScheduler, RebuildTask, WorkerPool};
pub use service::CacheService;
pub use strategy::{CacheStrategy, Lookup};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
