//! Pooled LRU core: pools, chains, TTL, budgets, eviction.

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use crate::cache::{CacheError, PooledCache};
    use crate::config::CacheConfig;

    const TTL: Duration = Duration::from_secs(300);

    /// A single-shard cache makes eviction behavior deterministic.
    fn single_shard_config() -> CacheConfig {
        CacheConfig {
            locks_power: 0,
            buckets_power: 4,
            ..CacheConfig::default()
        }
    }

    fn cache_with_pool(pool_mb: u64) -> PooledCache {
        let cache = PooledCache::new(&single_shard_config());
        cache.add_pool("pool", pool_mb).expect("pool creation");
        cache
    }

    // ----------------------------------------------------------------
    // Pool management
    // ----------------------------------------------------------------

    #[test]
    fn duplicate_pool_rejected() {
        let cache = PooledCache::new(&single_shard_config());
        assert!(cache.add_pool("edges", 1).is_ok());
        assert!(matches!(
            cache.add_pool("edges", 1),
            Err(CacheError::PoolExists(_))
        ));
        // A different name is fine.
        assert!(cache.add_pool("vertices", 1).is_ok());
    }

    #[test]
    fn writes_require_a_pool() {
        let cache = PooledCache::new(&single_shard_config());
        assert!(matches!(
            cache.put(b"k", vec![1], "nope", TTL),
            Err(CacheError::PoolMissing(_))
        ));
    }

    #[test]
    fn pool_budget_reported() {
        let cache = cache_with_pool(2);
        assert_eq!(cache.pool_budget("pool").unwrap(), 2 * 1024 * 1024);
        assert!(cache.pool_budget("other").is_err());
    }

    // ----------------------------------------------------------------
    // Blob round trips
    // ----------------------------------------------------------------

    #[test]
    fn put_get_round_trip() {
        let cache = cache_with_pool(1);
        cache.put(b"key", b"value".to_vec(), "pool", TTL).unwrap();
        assert_eq!(cache.get(b"key").unwrap(), b"value");
        assert_eq!(cache.get(b"other"), Err(CacheError::Miss));
    }

    #[test]
    fn put_replaces_in_place() {
        let cache = cache_with_pool(1);
        cache.put(b"key", b"one".to_vec(), "pool", TTL).unwrap();
        cache.put(b"key", b"two".to_vec(), "pool", TTL).unwrap();
        assert_eq!(cache.get(b"key").unwrap(), b"two");
    }

    #[test]
    fn invalidate_removes_and_tolerates_absent_keys() {
        let cache = cache_with_pool(1);
        cache.put(b"key", b"value".to_vec(), "pool", TTL).unwrap();
        cache.invalidate(b"key");
        assert_eq!(cache.get(b"key"), Err(CacheError::Miss));
        // Invalidating again (or a never-written key) is not an error.
        cache.invalidate(b"key");
        cache.invalidate(b"never");
    }

    // ----------------------------------------------------------------
    // Chains
    // ----------------------------------------------------------------

    /// # Scenario
    /// A dst-id chain is installed and read back in order; repeated puts
    /// with the same content are idempotent.
    #[test]
    fn chain_round_trip_in_order() {
        let cache = cache_with_pool(1);
        let dsts: Vec<Vec<u8>> = ["b", "c", "a"].iter().map(|s| s.as_bytes().to_vec()).collect();

        cache.put_chain(b"v1", dsts.clone(), "pool", TTL).unwrap();
        assert_eq!(cache.get_chain(b"v1").unwrap(), dsts);

        cache.put_chain(b"v1", dsts.clone(), "pool", TTL).unwrap();
        assert_eq!(cache.get_chain(b"v1").unwrap(), dsts);
    }

    #[test]
    fn payload_kinds_do_not_alias() {
        let cache = cache_with_pool(1);
        cache.put(b"blob", b"x".to_vec(), "pool", TTL).unwrap();
        cache
            .put_chain(b"chain", vec![b"y".to_vec()], "pool", TTL)
            .unwrap();

        assert_eq!(cache.get_chain(b"blob"), Err(CacheError::Miss));
        assert_eq!(cache.get(b"chain"), Err(CacheError::Miss));
    }

    // ----------------------------------------------------------------
    // TTL
    // ----------------------------------------------------------------

    #[test]
    fn expired_items_read_as_miss() {
        let cache = cache_with_pool(1);
        cache
            .put(b"short", b"lived".to_vec(), "pool", Duration::from_millis(20))
            .unwrap();
        assert_eq!(cache.get(b"short").unwrap(), b"lived");

        std::thread::sleep(Duration::from_millis(40));
        assert_eq!(cache.get(b"short"), Err(CacheError::Miss));
        assert!(!cache.contains(b"short"));
    }

    // ----------------------------------------------------------------
    // Budgets and eviction
    // ----------------------------------------------------------------

    #[test]
    fn oversized_value_rejected_outright() {
        let cache = cache_with_pool(1);
        let huge = vec![0u8; 2 * 1024 * 1024];
        assert!(matches!(
            cache.put(b"huge", huge, "pool", TTL),
            Err(CacheError::NoSpace(_))
        ));
    }

    /// # Scenario
    /// A pool sized for roughly two values receives three; the
    /// least-recently-touched key is evicted to make room.
    ///
    /// # Expected behavior
    /// The key refreshed by a read survives; the cold key is gone.
    #[test]
    fn eviction_prefers_cold_keys() {
        // 1 MiB pool, ~400 KiB values: two fit, three do not.
        let cache = cache_with_pool(1);
        let value = || vec![7u8; 400 * 1024];

        cache.put(b"a", value(), "pool", TTL).unwrap();
        cache.put(b"b", value(), "pool", TTL).unwrap();
        // Touch "a" so "b" becomes the coldest.
        assert!(cache.get(b"a").is_ok());

        cache.put(b"c", value(), "pool", TTL).unwrap();
        assert!(cache.contains(b"a"), "recently-read key evicted");
        assert!(!cache.contains(b"b"), "cold key should have been evicted");
        assert!(cache.contains(b"c"));
    }

    #[test]
    fn eviction_stays_within_the_pool() {
        let cache = PooledCache::new(&single_shard_config());
        cache.add_pool("small", 1).unwrap();
        cache.add_pool("other", 1).unwrap();

        cache
            .put(b"other-key", vec![1u8; 100], "other", TTL)
            .unwrap();
        // Fill "small" past its budget; "other" must be untouched.
        cache.put(b"s1", vec![0u8; 600 * 1024], "small", TTL).unwrap();
        cache.put(b"s2", vec![0u8; 600 * 1024], "small", TTL).unwrap();

        assert!(cache.contains(b"other-key"));
        assert!(cache.pool_used("small").unwrap() <= 1024 * 1024);
    }

    #[test]
    fn accounting_returns_to_zero() {
        let cache = cache_with_pool(1);
        cache.put(b"k1", vec![0u8; 1000], "pool", TTL).unwrap();
        cache
            .put_chain(b"k2", vec![vec![0u8; 500], vec![0u8; 500]], "pool", TTL)
            .unwrap();
        assert!(cache.pool_used("pool").unwrap() > 0);

        cache.invalidate(b"k1");
        cache.invalidate(b"k2");
        assert_eq!(cache.pool_used("pool").unwrap(), 0);
    }
}
