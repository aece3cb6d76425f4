use lru::LruCache;
use serde_json::Value;
use std::num::NonZeroUsize;
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
struct CacheEntry {
    value: Value,
    inserted_at: Instant,
}

/// Fixed-capacity response cache: LRU recency order with a TTL layered on
/// top. Entries older than the TTL are treated as absent and evicted on
/// contact; capacity is only enforced on insertion.
pub struct BoundedCache {
    entries: LruCache<String, CacheEntry>,
    ttl: Duration,
}

impl BoundedCache {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: LruCache::new(capacity),
            ttl,
        }
    }

    /// Returns the cached value and promotes the key to most-recently-used.
    pub fn get(&mut self, key: &str) -> Option<Value> {
        if self.expired(key) {
            self.entries.pop(key);
            return None;
        }
        self.entries.get(key).map(|entry| entry.value.clone())
    }

    /// Insert or replace at the most-recently-used position with a fresh
    /// timestamp, evicting the least-recently-used entry on overflow.
    pub fn put(&mut self, key: impl Into<String>, value: Value) {
        self.entries.put(
            key.into(),
            CacheEntry {
                value,
                inserted_at: Instant::now(),
            },
        );
    }

    /// TTL-aware membership test without promotion.
    pub fn has(&mut self, key: &str) -> bool {
        if self.expired(key) {
            self.entries.pop(key);
            return false;
        }
        self.entries.peek(key).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    // age == ttl still counts as fresh
    fn expired(&self, key: &str) -> bool {
        match self.entries.peek(key) {
            Some(entry) => entry.inserted_at.elapsed() > self.ttl,
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn minute_cache(capacity: usize) -> BoundedCache {
        BoundedCache::new(capacity, Duration::from_millis(60_000))
    }

    #[test]
    fn test_overflow_evicts_least_recently_used() {
        let mut cache = minute_cache(2);
        cache.put("a", json!(1));
        cache.put("b", json!(2));
        cache.put("c", json!(3));

        assert_eq!(cache.get("a"), None);
        assert_eq!(cache.get("b"), Some(json!(2)));
        assert_eq!(cache.get("c"), Some(json!(3)));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_get_promotes_and_changes_eviction_order() {
        let mut cache = minute_cache(2);
        cache.put("a", json!(1));
        cache.put("b", json!(2));

        // touching "a" makes "b" the eviction candidate
        assert_eq!(cache.get("a"), Some(json!(1)));
        cache.put("c", json!(3));

        assert_eq!(cache.get("a"), Some(json!(1)));
        assert_eq!(cache.get("b"), None);
    }

    #[test]
    fn test_has_does_not_promote() {
        let mut cache = minute_cache(2);
        cache.put("a", json!(1));
        cache.put("b", json!(2));

        assert!(cache.has("a"));
        cache.put("c", json!(3));

        // "a" stayed least-recently-used and was evicted
        assert!(!cache.has("a"));
        assert!(cache.has("b"));
    }

    #[test]
    fn test_replace_at_capacity_does_not_evict_others() {
        let mut cache = minute_cache(2);
        cache.put("a", json!(1));
        cache.put("b", json!(2));
        cache.put("a", json!(10));

        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get("a"), Some(json!(10)));
        assert_eq!(cache.get("b"), Some(json!(2)));
    }

    #[test]
    fn test_expired_entries_are_absent() {
        let mut cache = BoundedCache::new(4, Duration::from_millis(10));
        cache.put("a", json!(1));
        assert_eq!(cache.get("a"), Some(json!(1)));

        std::thread::sleep(Duration::from_millis(25));
        assert_eq!(cache.get("a"), None);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_expired_entries_fail_has() {
        let mut cache = BoundedCache::new(4, Duration::from_millis(10));
        cache.put("a", json!(1));
        assert!(cache.has("a"));

        std::thread::sleep(Duration::from_millis(25));
        assert!(!cache.has("a"));
    }

    #[test]
    fn test_put_refreshes_timestamp() {
        let mut cache = BoundedCache::new(4, Duration::from_millis(40));
        cache.put("a", json!(1));
        std::thread::sleep(Duration::from_millis(25));
        cache.put("a", json!(2));
        std::thread::sleep(Duration::from_millis(25));

        // the rewrite reset the clock, so the entry is still fresh
        assert_eq!(cache.get("a"), Some(json!(2)));
    }

    #[test]
    fn test_zero_capacity_clamps_to_one() {
        let mut cache = BoundedCache::new(0, Duration::from_millis(60_000));
        cache.put("a", json!(1));
        assert_eq!(cache.get("a"), Some(json!(1)));
        cache.put("b", json!(2));
        assert_eq!(cache.get("a"), None);
    }
}
