//! Basic usage example of cache-shield.

use cache_shield::{
    backend::InMemoryBackend, error::Result, CacheConfig, CacheEntity, CacheService,
    CacheStrategy, Loader,
};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Example entity: Shop
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
struct Shop {
    id: u64,
    name: String,
    area: String,
    score: u32,
}

impl CacheEntity for Shop {
    type Key = u64;

    fn cache_key(&self) -> Self::Key {
        self.id
    }

    fn cache_prefix() -> &'static str {
        "shop"
    }
}

/// Mock repository that simulates database access
#[derive(Clone, Default)]
struct ShopRepository {
    rows: Arc<DashMap<u64, Shop>>,
}

impl ShopRepository {
    fn seeded() -> Self {
        let repo = Self::default();
        repo.rows.insert(
            1,
            Shop {
                id: 1,
                name: "Noodle House".to_string(),
                area: "Downtown".to_string(),
                score: 47,
            },
        );
        repo.rows.insert(
            2,
            Shop {
                id: 2,
                name: "Tea Corner".to_string(),
                area: "Harbour".to_string(),
                score: 42,
            },
        );
        repo
    }

    async fn save(&self, shop: Shop) -> Result<()> {
        println!("  [DB] Updating shop: {}", shop.id);
        self.rows.insert(shop.id, shop);
        Ok(())
    }
}

impl Loader<Shop> for ShopRepository {
    async fn load(&self, id: &u64) -> Result<Option<Shop>> {
        println!("  [DB] Fetching shop: {}", id);
        Ok(self.rows.get(id).map(|row| row.value().clone()))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Debug)
        .try_init()
        .ok();

    println!("\n=== Cache Shield - Basic Example ===\n");

    // 1. Start the service: backend + rebuild worker pool
    println!("1. Starting cache service on the in-memory backend...");
    let config = CacheConfig::default().with_null_ttl(Duration::from_secs(120));
    let cache = CacheService::start(InMemoryBackend::new(), config)?;
    let repository = ShopRepository::seeded();
    println!("   ✓ Cache service ready\n");

    // 2. Pass-through: first read loads, second read hits
    println!("2. PassThrough read for shop 1 (twice):");
    for _ in 0..2 {
        if let Some(shop) = cache.fetch(&1, &repository, CacheStrategy::PassThrough).await? {
            println!("   ✓ Shop loaded: {} ({})", shop.name, shop.area);
        }
    }
    println!();

    // 3. Penetration: an unknown id is cached as a null marker
    println!("3. PassThrough read for missing shop 404 (twice):");
    for _ in 0..2 {
        let lookup = cache.get(&404, &repository, CacheStrategy::PassThrough).await?;
        println!("   ✓ Lookup: {:?}", lookup);
    }
    println!("   ✓ Database was queried once\n");

    // 4. Blocking retry: concurrent misses trigger a single load
    println!("4. BlockingRetry with 5 concurrent readers for shop 2:");
    let mut handles = Vec::new();
    for _ in 0..5 {
        let cache = cache.clone();
        let repository = repository.clone();
        handles.push(tokio::spawn(async move {
            cache.fetch(&2, &repository, CacheStrategy::BlockingRetry).await
        }));
    }
    for handle in handles {
        if let Ok(Ok(Some(shop))) = handle.await {
            println!("   ✓ Reader got: {}", shop.name);
        }
    }
    println!();

    // 5. Logical expiry: warm a hot key, then read it after its deadline
    println!("5. LogicalExpiry for hot shop 1:");
    cache.warm(&1, &repository, Duration::from_secs(1800)).await?;
    println!("   ✓ Warmed with a 30 minute logical TTL");

    let lookup = cache.get(&1, &repository, CacheStrategy::LogicalExpiry).await?;
    println!("   ✓ Fresh read: {:?}", lookup.is_fresh());

    // Force the deadline into the past
    let current = repository.rows.get(&1).map(|row| row.value().clone());
    if let Some(shop) = current {
        cache
            .client()
            .set_with_logical_expire(&1, &shop, Duration::ZERO)
            .await?;
    }
    let lookup = cache.get(&1, &repository, CacheStrategy::LogicalExpiry).await?;
    println!("   ✓ Expired read served stale: {:?}", lookup.is_stale());

    tokio::time::sleep(Duration::from_millis(100)).await;
    let lookup = cache.get(&1, &repository, CacheStrategy::LogicalExpiry).await?;
    println!("   ✓ After background rebuild: fresh = {:?}\n", lookup.is_fresh());

    // 6. Writes go to the database first, then invalidate
    println!("6. Update shop 2, then read again:");
    let renamed = Shop {
        id: 2,
        name: "Tea Corner & Bakery".to_string(),
        area: "Harbour".to_string(),
        score: 44,
    };
    cache
        .update::<Shop, _, _>(&2, repository.save(renamed))
        .await?;
    if let Some(shop) = cache.fetch(&2, &repository, CacheStrategy::PassThrough).await? {
        println!("   ✓ Shop reloaded after invalidation: {}\n", shop.name);
    }

    let stats = cache.scheduler_stats();
    println!(
        "7. Rebuild pool: submitted={} completed={} failed={} rejected={}\n",
        stats.submitted, stats.completed, stats.failed, stats.rejected
    );

    cache.shutdown().await;
    println!("=== Example Complete ===\n");

    Ok(())
}
