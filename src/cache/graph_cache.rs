//! Graph-facing cache wrapper: vertex-property and edge-topology pools
//! on one shared LRU.
//!
//! The edge pool memoizes "destinations of vertex V over edge type T" as
//! a chain of dst ids; the vertex pool memoizes serialized vertex
//! property blobs. Both are advisory: writers invalidate the keys they
//! touch, readers fall back to the storage RPC on any miss, and nothing
//! orders a cache update against a concurrent storage write.

use std::time::Duration;

use tracing::info;

use crate::config::CacheConfig;

use super::{CacheError, PooledCache};

/// Name of the vertex-property pool.
pub const VERTEX_POOL: &str = "VertexPool";

/// Name of the edge-topology pool.
pub const EDGE_POOL: &str = "EdgePool";

// ------------------------------------------------------------------------------------------------
// Key layout
// ------------------------------------------------------------------------------------------------

/// Edge-topology key: raw `vid_bytes || i32 native-endian edge type`.
/// Stability across hosts is not required; the cache never leaves the
/// process.
pub fn edge_key(vid: &str, etype: i32) -> Vec<u8> {
    let mut key = Vec::with_capacity(vid.len() + 4);
    key.extend_from_slice(vid.as_bytes());
    key.extend_from_slice(&etype.to_ne_bytes());
    key
}

/// Vertex-property key: raw `vid_bytes || i32 native-endian tag id`.
pub fn tag_key(vid: &str, tag_id: i32) -> Vec<u8> {
    let mut key = Vec::with_capacity(vid.len() + 4);
    key.extend_from_slice(vid.as_bytes());
    key.extend_from_slice(&tag_id.to_ne_bytes());
    key
}

// ------------------------------------------------------------------------------------------------
// GraphCache
// ------------------------------------------------------------------------------------------------

/// The graph service's in-memory cache: one [`PooledCache`] carrying the
/// vertex and edge pools, with the TTLs and budgets from [`CacheConfig`].
#[derive(Debug)]
pub struct GraphCache {
    cache: PooledCache,
    vertex_ttl: Duration,
    edge_ttl: Duration,
}

impl GraphCache {
    /// Builds the cache and registers both pools.
    pub fn new(config: &CacheConfig) -> Result<Self, CacheError> {
        let cache = PooledCache::new(config);
        cache.add_pool(VERTEX_POOL, config.vertex_pool_mb)?;
        cache.add_pool(EDGE_POOL, config.edge_pool_mb)?;
        info!(
            vertex_pool_mb = config.vertex_pool_mb,
            edge_pool_mb = config.edge_pool_mb,
            "graph cache ready"
        );
        Ok(Self {
            cache,
            vertex_ttl: Duration::from_secs(config.vertex_item_ttl_sec),
            edge_ttl: Duration::from_secs(config.edge_item_ttl_sec),
        })
    }

    // --------------------------------------------------------------------------------------------
    // Edge topology
    // --------------------------------------------------------------------------------------------

    /// All cached destination ids for an edge key, in insertion order.
    pub fn get_edges(&self, key: &[u8]) -> Result<Vec<String>, CacheError> {
        let chain = self.cache.get_chain(key)?;
        Ok(chain
            .into_iter()
            .map(|dst| String::from_utf8_lossy(&dst).into_owned())
            .collect())
    }

    /// Memoizes a vertex's complete destination list for one edge type.
    pub fn put_edges(&self, key: &[u8], dsts: &[String]) -> Result<(), CacheError> {
        let values = dsts.iter().map(|d| d.as_bytes().to_vec()).collect();
        self.cache.put_chain(key, values, EDGE_POOL, self.edge_ttl)
    }

    /// Whether an edge key currently reads as a hit.
    pub fn find_edge(&self, key: &[u8]) -> bool {
        self.cache.contains(key)
    }

    /// Drops a cached destination list. Writers call this for every
    /// `(src, edge type)` whose out-edges they changed.
    pub fn invalidate_edges(&self, key: &[u8]) {
        self.cache.invalidate(key);
    }

    /// Configured edge-pool budget in MiB.
    pub fn edge_pool_mb(&self) -> u64 {
        (self.cache.pool_budget(EDGE_POOL).unwrap_or(0) / 1024 / 1024) as u64
    }

    // --------------------------------------------------------------------------------------------
    // Vertex properties
    // --------------------------------------------------------------------------------------------

    /// A cached vertex-property blob.
    pub fn get_vertex_prop(&self, key: &[u8]) -> Result<Vec<u8>, CacheError> {
        self.cache.get(key)
    }

    /// Inserts or refreshes a vertex-property blob.
    pub fn put_vertex_prop(&self, key: &[u8], value: Vec<u8>) -> Result<(), CacheError> {
        self.cache.put(key, value, VERTEX_POOL, self.vertex_ttl)
    }

    pub fn invalidate_vertex(&self, key: &[u8]) {
        self.cache.invalidate(key);
    }

    /// Configured vertex-pool budget in MiB.
    pub fn vertex_pool_mb(&self) -> u64 {
        (self.cache.pool_budget(VERTEX_POOL).unwrap_or(0) / 1024 / 1024) as u64
    }
}
