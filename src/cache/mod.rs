//! # Pooled LRU Cache
//!
//! A byte-budgeted, TTL'd LRU segmented into named pools, shared by the
//! graph layer's read paths. One cache instance carries every pool; each
//! pool has its own byte budget, and eviction always stays within the
//! pool that is over budget.
//!
//! ## Shape
//!
//! The key space is split across `2^locks_power` shards, each guarded by
//! its own `RwLock` (shared for reads, exclusive for mutations);
//! `buckets_power` sizes the initial per-shard table. Chained values
//! (a parent entry whose payload is an ordered list of children) are
//! written under one exclusive shard lock, so a chain is never observed
//! half-installed.
//!
//! ## Semantics
//!
//! - Items expire `ttl` seconds after insertion; an expired item reads as
//!   a miss and is reclaimed by the next eviction pass over its shard.
//! - Recency is a global monotonic counter stamped per access; eviction
//!   removes the least-recently-stamped item of the over-budget pool
//!   within the shard being written.
//! - Every error here is recoverable by design: callers log and fall
//!   back to the authoritative store.

// ------------------------------------------------------------------------------------------------
// Unit tests
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests;

// ------------------------------------------------------------------------------------------------
// Submodules
// ------------------------------------------------------------------------------------------------

mod graph_cache;

pub use graph_cache::{EDGE_POOL, GraphCache, VERTEX_POOL, edge_key, tag_key};

// ------------------------------------------------------------------------------------------------
// Includes
// ------------------------------------------------------------------------------------------------

use std::collections::HashMap;
use std::hash::{DefaultHasher, Hash, Hasher};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::RwLock;
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::{debug, info};

use crate::config::CacheConfig;

/// Fixed per-item accounting overhead (bookkeeping, hash slot).
const ITEM_OVERHEAD: usize = 64;

// ------------------------------------------------------------------------------------------------
// Error Types
// ------------------------------------------------------------------------------------------------

/// Cache operation outcomes that are not a hit.
#[derive(Debug, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum CacheError {
    /// Key absent, expired, or of the wrong payload kind.
    #[error("cache miss")]
    Miss,

    /// A pool with this name already exists.
    #[error("cache pool already exists: {0}")]
    PoolExists(String),

    /// No pool with this name was created.
    #[error("cache pool does not exist: {0}")]
    PoolMissing(String),

    /// The value cannot fit its pool budget even after eviction.
    #[error("cache pool {0} cannot fit the value")]
    NoSpace(String),

    /// Poisoned lock.
    #[error("Internal error: {0}")]
    Internal(String),
}

// ------------------------------------------------------------------------------------------------
// Items and shards
// ------------------------------------------------------------------------------------------------

#[derive(Debug)]
enum ItemPayload {
    Blob(Vec<u8>),
    Chain(Vec<Vec<u8>>),
}

#[derive(Debug)]
struct Item {
    pool: usize,
    payload: ItemPayload,
    bytes: usize,
    expires_at: Instant,
    /// Global recency stamp; bumped on read under the shared lock.
    last_access: AtomicU64,
}

#[derive(Debug, Default)]
struct Shard {
    items: HashMap<Vec<u8>, Item>,
}

#[derive(Debug)]
struct PoolInfo {
    name: String,
    budget: usize,
    used: AtomicUsize,
}

// ------------------------------------------------------------------------------------------------
// PooledCache
// ------------------------------------------------------------------------------------------------

/// The shared LRU instance behind every graph-cache pool.
#[derive(Debug)]
pub struct PooledCache {
    shards: Vec<RwLock<Shard>>,
    pools: RwLock<Vec<PoolInfo>>,
    clock: AtomicU64,
}

impl PooledCache {
    /// Builds an empty cache with the configured shard shape. Pools are
    /// added separately at startup.
    pub fn new(config: &CacheConfig) -> Self {
        let shard_count = 1usize << config.locks_power.min(16);
        let per_shard = 1usize << config.buckets_power.saturating_sub(config.locks_power).min(20);

        let shards = (0..shard_count)
            .map(|_| {
                RwLock::new(Shard {
                    items: HashMap::with_capacity(per_shard),
                })
            })
            .collect();

        info!(
            shards = shard_count,
            per_shard_buckets = per_shard,
            capacity_mb = config.capacity_mb,
            "cache initialized"
        );

        Self {
            shards,
            pools: RwLock::new(Vec::new()),
            clock: AtomicU64::new(0),
        }
    }

    /// Registers a pool with a byte budget. Duplicate names are rejected.
    pub fn add_pool(&self, name: &str, budget_mb: u64) -> Result<(), CacheError> {
        let mut pools = self
            .pools
            .write()
            .map_err(|_| CacheError::Internal("pool table lock poisoned".into()))?;
        if pools.iter().any(|p| p.name == name) {
            return Err(CacheError::PoolExists(name.to_string()));
        }
        pools.push(PoolInfo {
            name: name.to_string(),
            budget: (budget_mb * 1024 * 1024) as usize,
            used: AtomicUsize::new(0),
        });
        info!(pool = name, budget_mb, "cache pool created");
        Ok(())
    }

    /// Configured byte budget of a pool.
    pub fn pool_budget(&self, name: &str) -> Result<usize, CacheError> {
        let pools = self
            .pools
            .read()
            .map_err(|_| CacheError::Internal("pool table lock poisoned".into()))?;
        pools
            .iter()
            .find(|p| p.name == name)
            .map(|p| p.budget)
            .ok_or_else(|| CacheError::PoolMissing(name.to_string()))
    }

    /// Bytes currently accounted to a pool.
    pub fn pool_used(&self, name: &str) -> Result<usize, CacheError> {
        let pools = self
            .pools
            .read()
            .map_err(|_| CacheError::Internal("pool table lock poisoned".into()))?;
        pools
            .iter()
            .find(|p| p.name == name)
            .map(|p| p.used.load(Ordering::Acquire))
            .ok_or_else(|| CacheError::PoolMissing(name.to_string()))
    }

    /// Inserts or replaces a plain value.
    pub fn put(
        &self,
        key: &[u8],
        value: Vec<u8>,
        pool: &str,
        ttl: Duration,
    ) -> Result<(), CacheError> {
        let bytes = key.len() + value.len() + ITEM_OVERHEAD;
        self.insert(key, ItemPayload::Blob(value), bytes, pool, ttl)
    }

    /// Reads a plain value. Expired entries and chains read as a miss.
    pub fn get(&self, key: &[u8]) -> Result<Vec<u8>, CacheError> {
        let shard = self.shard_for(key).read().map_err(poisoned)?;
        let item = shard.items.get(key).ok_or(CacheError::Miss)?;
        if item.expires_at <= Instant::now() {
            return Err(CacheError::Miss);
        }
        match &item.payload {
            ItemPayload::Blob(value) => {
                self.touch(item);
                Ok(value.clone())
            }
            ItemPayload::Chain(_) => Err(CacheError::Miss),
        }
    }

    /// Installs an ordered chain of values under one key, atomically
    /// under the shard's exclusive lock.
    pub fn put_chain(
        &self,
        key: &[u8],
        values: Vec<Vec<u8>>,
        pool: &str,
        ttl: Duration,
    ) -> Result<(), CacheError> {
        let bytes = key.len()
            + values.iter().map(|v| v.len() + ITEM_OVERHEAD).sum::<usize>()
            + ITEM_OVERHEAD;
        self.insert(key, ItemPayload::Chain(values), bytes, pool, ttl)
    }

    /// Reads a whole chain in insertion order.
    pub fn get_chain(&self, key: &[u8]) -> Result<Vec<Vec<u8>>, CacheError> {
        let shard = self.shard_for(key).read().map_err(poisoned)?;
        let item = shard.items.get(key).ok_or(CacheError::Miss)?;
        if item.expires_at <= Instant::now() {
            return Err(CacheError::Miss);
        }
        match &item.payload {
            ItemPayload::Chain(values) => {
                self.touch(item);
                Ok(values.clone())
            }
            ItemPayload::Blob(_) => Err(CacheError::Miss),
        }
    }

    /// Removes a key. Absent keys are not an error; TTL churn makes that
    /// case common.
    pub fn invalidate(&self, key: &[u8]) {
        let Ok(mut shard) = self.shard_for(key).write() else {
            return;
        };
        if let Some(item) = shard.items.remove(key) {
            self.credit_pool(item.pool, item.bytes);
        }
    }

    /// Whether the key currently reads as a hit.
    pub fn contains(&self, key: &[u8]) -> bool {
        self.shard_for(key)
            .read()
            .map(|shard| {
                shard
                    .items
                    .get(key)
                    .is_some_and(|item| item.expires_at > Instant::now())
            })
            .unwrap_or(false)
    }

    // --------------------------------------------------------------------------------------------
    // Internals
    // --------------------------------------------------------------------------------------------

    fn insert(
        &self,
        key: &[u8],
        payload: ItemPayload,
        bytes: usize,
        pool: &str,
        ttl: Duration,
    ) -> Result<(), CacheError> {
        let (pool_idx, budget) = {
            let pools = self
                .pools
                .read()
                .map_err(|_| CacheError::Internal("pool table lock poisoned".into()))?;
            let idx = pools
                .iter()
                .position(|p| p.name == pool)
                .ok_or_else(|| CacheError::PoolMissing(pool.to_string()))?;
            (idx, pools[idx].budget)
        };
        if bytes > budget {
            return Err(CacheError::NoSpace(pool.to_string()));
        }

        let mut shard = self.shard_for(key).write().map_err(poisoned)?;

        // Replacing counts the old entry out first.
        if let Some(old) = shard.items.remove(key) {
            self.credit_pool(old.pool, old.bytes);
        }

        // Reclaim expired entries of this pool, then least-recent ones,
        // until the new entry fits the pool budget.
        self.reclaim_expired(&mut shard, pool_idx);
        while self.pool_used_by_idx(pool_idx) + bytes > budget {
            if !self.evict_one(&mut shard, pool_idx) {
                debug!(pool, "shard has nothing left to evict for this pool");
                return Err(CacheError::NoSpace(pool.to_string()));
            }
        }

        self.charge_pool(pool_idx, bytes);
        shard.items.insert(
            key.to_vec(),
            Item {
                pool: pool_idx,
                payload,
                bytes,
                expires_at: Instant::now() + ttl,
                last_access: AtomicU64::new(self.clock.fetch_add(1, Ordering::Relaxed)),
            },
        );
        Ok(())
    }

    fn reclaim_expired(&self, shard: &mut Shard, pool_idx: usize) {
        let now = Instant::now();
        let expired: Vec<Vec<u8>> = shard
            .items
            .iter()
            .filter(|(_, item)| item.pool == pool_idx && item.expires_at <= now)
            .map(|(key, _)| key.clone())
            .collect();
        for key in expired {
            if let Some(item) = shard.items.remove(&key) {
                self.credit_pool(item.pool, item.bytes);
            }
        }
    }

    /// Evicts the least-recently-accessed item of the pool within this
    /// shard. Returns `false` when the shard holds none.
    fn evict_one(&self, shard: &mut Shard, pool_idx: usize) -> bool {
        let victim = shard
            .items
            .iter()
            .filter(|(_, item)| item.pool == pool_idx)
            .min_by_key(|(_, item)| item.last_access.load(Ordering::Relaxed))
            .map(|(key, _)| key.clone());
        let Some(key) = victim else {
            return false;
        };
        if let Some(item) = shard.items.remove(&key) {
            debug!(bytes = item.bytes, "evicting least-recently-used cache item");
            self.credit_pool(item.pool, item.bytes);
        }
        true
    }

    fn shard_for(&self, key: &[u8]) -> &RwLock<Shard> {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        let idx = (hasher.finish() as usize) & (self.shards.len() - 1);
        &self.shards[idx]
    }

    fn touch(&self, item: &Item) {
        item.last_access
            .store(self.clock.fetch_add(1, Ordering::Relaxed), Ordering::Relaxed);
    }

    fn pool_used_by_idx(&self, pool_idx: usize) -> usize {
        self.pools
            .read()
            .ok()
            .and_then(|pools| pools.get(pool_idx).map(|p| p.used.load(Ordering::Acquire)))
            .unwrap_or(0)
    }

    fn charge_pool(&self, pool_idx: usize, bytes: usize) {
        if let Ok(pools) = self.pools.read()
            && let Some(pool) = pools.get(pool_idx)
        {
            pool.used.fetch_add(bytes, Ordering::AcqRel);
        }
    }

    fn credit_pool(&self, pool_idx: usize, bytes: usize) {
        if let Ok(pools) = self.pools.read()
            && let Some(pool) = pools.get(pool_idx)
        {
            pool.used.fetch_sub(bytes, Ordering::AcqRel);
        }
    }
}

fn poisoned<T>(_: T) -> CacheError {
    CacheError::Internal("cache shard lock poisoned".into())
}
