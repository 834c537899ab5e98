//! Per-method result cache with TTL expiry and LRU capacity bound.
//!
//! Each registered method gets its own LRU map of `cache key → entry`. An
//! entry is only returned while `now < expires_at`; expired entries are
//! dropped lazily when read, or in bulk by [`MethodCache::purge_expired`].
//!
//! The cache is an optimisation: concurrent misses on the same key may both
//! fetch and both write, and the last write wins.

use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::time::Duration;

use lru::LruCache;
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use tokio::time::Instant;

/// Default number of entries kept per method.
pub const DEFAULT_CAPACITY_PER_METHOD: usize = 10_000;

#[derive(Debug, Clone)]
struct CacheEntry {
    value: Value,
    expires_at: Instant,
}

impl CacheEntry {
    fn is_live(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

type MethodMap = Mutex<LruCache<String, CacheEntry>>;

/// Thread-safe cache of method results.
pub struct MethodCache {
    methods: RwLock<HashMap<String, MethodMap>>,
    capacity: NonZeroUsize,
}

impl Default for MethodCache {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY_PER_METHOD)
    }
}

impl MethodCache {
    /// Create a cache holding at most `capacity_per_method` entries per method.
    ///
    /// A capacity of zero is treated as one.
    pub fn new(capacity_per_method: usize) -> Self {
        Self {
            methods: RwLock::new(HashMap::new()),
            capacity: NonZeroUsize::new(capacity_per_method).unwrap_or(NonZeroUsize::MIN),
        }
    }

    /// Return the cached value for `(method, key)` if present and unexpired.
    pub fn get(&self, method: &str, key: &str) -> Option<Value> {
        let methods = self.methods.read();
        let mut map = methods.get(method)?.lock();
        let now = Instant::now();
        match map.get(key).map(|e| e.is_live(now).then(|| e.value.clone())) {
            Some(Some(value)) => Some(value),
            Some(None) => {
                map.pop(key);
                None
            }
            None => None,
        }
    }

    /// Store `value` under `(method, key)` for `ttl`. A zero ttl is a no-op.
    pub fn put(&self, method: &str, key: impl Into<String>, value: Value, ttl: Duration) {
        if ttl.is_zero() {
            return;
        }
        let entry = CacheEntry {
            value,
            expires_at: Instant::now() + ttl,
        };
        let key = key.into();

        {
            let methods = self.methods.read();
            if let Some(map) = methods.get(method) {
                map.lock().put(key, entry);
                return;
            }
        }

        let mut methods = self.methods.write();
        methods
            .entry(method.to_string())
            .or_insert_with(|| Mutex::new(LruCache::new(self.capacity)))
            .lock()
            .put(key, entry);
    }

    /// Drop one entry. Returns `true` if it was present.
    pub fn invalidate(&self, method: &str, key: &str) -> bool {
        self.methods
            .read()
            .get(method)
            .map(|map| map.lock().pop(key).is_some())
            .unwrap_or(false)
    }

    /// Drop every entry of one method.
    pub fn invalidate_method(&self, method: &str) {
        if let Some(map) = self.methods.read().get(method) {
            map.lock().clear();
        }
    }

    /// Remove every expired entry. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let methods = self.methods.read();
        let mut removed = 0;
        for map in methods.values() {
            let mut map = map.lock();
            let expired: Vec<String> = map
                .iter()
                .filter(|(_, e)| !e.is_live(now))
                .map(|(k, _)| k.clone())
                .collect();
            for key in expired {
                map.pop(&key);
                removed += 1;
            }
        }
        if removed > 0 {
            tracing::debug!(removed, "purged expired cache entries");
        }
        removed
    }

    /// Number of stored entries for `method`, expired ones included.
    pub fn len(&self, method: &str) -> usize {
        self.methods
            .read()
            .get(method)
            .map(|map| map.lock().len())
            .unwrap_or(0)
    }

    /// Returns `true` if nothing is cached for any method.
    pub fn is_empty(&self) -> bool {
        self.methods.read().values().all(|map| map.lock().is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const TTL: Duration = Duration::from_secs(30);

    #[tokio::test(start_paused = true)]
    async fn hit_within_ttl_miss_after() {
        let cache = MethodCache::default();
        cache.put("blocks.info", "123", json!({ "id": "123" }), TTL);
        assert_eq!(cache.get("blocks.info", "123"), Some(json!({ "id": "123" })));

        tokio::time::advance(Duration::from_secs(29)).await;
        assert!(cache.get("blocks.info", "123").is_some());

        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(cache.get("blocks.info", "123").is_none());
        // Lazily evicted on read.
        assert_eq!(cache.len("blocks.info"), 0);
    }

    #[test]
    fn zero_ttl_disables_caching() {
        let cache = MethodCache::default();
        cache.put("blocks.latest", "latest", json!(1), Duration::ZERO);
        assert!(cache.get("blocks.latest", "latest").is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn methods_do_not_share_keys() {
        let cache = MethodCache::default();
        cache.put("blocks.info", "123", json!("block"), TTL);
        cache.put("transactions.info", "123", json!("tx"), TTL);
        assert_eq!(cache.get("blocks.info", "123"), Some(json!("block")));
        assert_eq!(cache.get("transactions.info", "123"), Some(json!("tx")));
        assert!(cache.get("wallets.info", "123").is_none());
    }

    #[test]
    fn last_write_wins() {
        let cache = MethodCache::default();
        cache.put("blocks.info", "123", json!(1), TTL);
        cache.put("blocks.info", "123", json!(2), TTL);
        assert_eq!(cache.get("blocks.info", "123"), Some(json!(2)));
        assert_eq!(cache.len("blocks.info"), 1);
    }

    #[test]
    fn invalidate_entry_and_method() {
        let cache = MethodCache::default();
        cache.put("blocks.info", "1", json!(1), TTL);
        cache.put("blocks.info", "2", json!(2), TTL);
        assert!(cache.invalidate("blocks.info", "1"));
        assert!(!cache.invalidate("blocks.info", "1"));
        assert!(!cache.invalidate("unknown", "1"));
        assert!(cache.get("blocks.info", "1").is_none());

        cache.invalidate_method("blocks.info");
        assert!(cache.get("blocks.info", "2").is_none());
    }

    #[test]
    fn capacity_evicts_least_recently_used() {
        let cache = MethodCache::new(2);
        cache.put("blocks.info", "a", json!("a"), TTL);
        cache.put("blocks.info", "b", json!("b"), TTL);
        // Touch `a` so `b` becomes the eviction candidate.
        assert!(cache.get("blocks.info", "a").is_some());
        cache.put("blocks.info", "c", json!("c"), TTL);

        assert_eq!(cache.len("blocks.info"), 2);
        assert!(cache.get("blocks.info", "a").is_some());
        assert!(cache.get("blocks.info", "b").is_none());
        assert!(cache.get("blocks.info", "c").is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn purge_removes_only_expired() {
        let cache = MethodCache::default();
        cache.put("wallets.info", "short", json!(1), Duration::from_secs(5));
        cache.put("wallets.info", "long", json!(2), Duration::from_secs(60));
        tokio::time::advance(Duration::from_secs(10)).await;

        assert_eq!(cache.purge_expired(), 1);
        assert_eq!(cache.len("wallets.info"), 1);
        assert!(cache.get("wallets.info", "long").is_some());
    }
}
