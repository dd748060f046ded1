//! Tiered cache (§4.10): hot/warm `lru::LruCache` tiers with TTL, single
//! flight coalescing, warm-to-hot promotion, and city-prefix invalidation.
//!
//! Sharded locking style grounded in `version_cache::VersionCache`
//! (`lru::LruCache` behind a `Mutex` per shard); here a single mutex per
//! tier is enough since the keyspace is small (query results, not pages).

use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::{Duration, Instant};

use lru::LruCache;
use tokio::sync::{Mutex, Notify};
use tracing::debug;

const HOT_CAPACITY: usize = 100;
const HOT_TTL: Duration = Duration::from_secs(5 * 60);
const WARM_CAPACITY: usize = 500;
const WARM_TTL: Duration = Duration::from_secs(30 * 60);
const PROMOTION_THRESHOLD: u32 = 3;
/// Page numbers above this are never cached (§4.10).
const MAX_CACHED_PAGE: usize = 10;
/// Pages 1..=HOT_PAGE_CUTOFF check hot first; the rest (up to `MAX_CACHED_PAGE`) check warm.
const HOT_PAGE_CUTOFF: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheHit {
    Hot,
    Warm,
    Miss,
}

#[derive(Debug, Clone, Default)]
pub struct CacheStats {
    pub hits_hot: u64,
    pub hits_warm: u64,
    pub misses: u64,
    pub hot_size: usize,
    pub warm_size: usize,
}

struct Entry<V> {
    value: V,
    expires_at: Instant,
}

struct Inner<K: Hash + Eq, V: Clone> {
    hot: LruCache<K, Entry<V>>,
    warm: LruCache<K, Entry<V>>,
    warm_hits: HashMap<K, u32>,
    hits_hot: u64,
    hits_warm: u64,
    misses: u64,
}

/// Two size-bounded LRU tiers, single-flight coalescing on miss, and
/// city-prefix invalidation (§4.10).
pub struct TieredCache<K: Hash + Eq + Clone + Send + Sync + 'static, V: Clone + Send + Sync + 'static> {
    inner: Mutex<Inner<K, V>>,
    in_flight: Mutex<HashMap<K, Arc<Notify>>>,
}

impl<K: Hash + Eq + Clone + Send + Sync + 'static, V: Clone + Send + Sync + 'static> TieredCache<K, V> {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                hot: LruCache::new(NonZeroUsize::new(HOT_CAPACITY).unwrap()),
                warm: LruCache::new(NonZeroUsize::new(WARM_CAPACITY).unwrap()),
                warm_hits: HashMap::new(),
                hits_hot: 0,
                hits_warm: 0,
                misses: 0,
            }),
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    /// Fetch `key`, consulting hot first for `page <= 3`, warm for
    /// `page <= 10`, and skipping the cache entirely above that. Concurrent
    /// misses for the same key coalesce into a single `fetch` call (§4.10).
    pub async fn get_or_fetch<F, Fut>(&self, key: K, page: usize, fetch: F) -> (V, CacheHit)
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = V>,
    {
        if page > MAX_CACHED_PAGE {
            return (fetch().await, CacheHit::Miss);
        }

        if let Some((value, hit)) = self.try_read(&key, page).await {
            return (value, hit);
        }

        // Single-flight: only the first caller for this key actually fetches.
        let notify = {
            let mut in_flight = self.in_flight.lock().await;
            if let Some(existing) = in_flight.get(&key) {
                Some(existing.clone())
            } else {
                in_flight.insert(key.clone(), Arc::new(Notify::new()));
                None
            }
        };

        if let Some(notify) = notify {
            notify.notified().await;
            if let Some((value, hit)) = self.try_read(&key, page).await {
                return (value, hit);
            }
            // Rare: the leader's entry already expired or was invalidated.
            return (fetch().await, CacheHit::Miss);
        }

        let value = fetch().await;
        self.insert(key.clone(), value.clone(), page).await;

        let notify = self.in_flight.lock().await.remove(&key);
        if let Some(notify) = notify {
            notify.notify_waiters();
        }

        (value, CacheHit::Miss)
    }

    async fn try_read(&self, key: &K, page: usize) -> Option<(V, CacheHit)> {
        let mut inner = self.inner.lock().await;
        let now = Instant::now();

        if page <= HOT_PAGE_CUTOFF {
            if let Some(entry) = inner.hot.get(key) {
                if entry.expires_at > now {
                    inner.hits_hot += 1;
                    return Some((entry.value.clone(), CacheHit::Hot));
                }
                inner.hot.pop(key);
            }
        }

        if let Some(entry) = inner.warm.get(key) {
            if entry.expires_at > now {
                inner.hits_warm += 1;
                let count = inner.warm_hits.entry(key.clone()).or_insert(0);
                *count += 1;
                let value = entry.value.clone();
                if *count > PROMOTION_THRESHOLD {
                    debug!("promoting warm entry to hot tier");
                    inner.warm_hits.remove(key);
                    let promoted = Entry {
                        value: value.clone(),
                        expires_at: now + HOT_TTL,
                    };
                    inner.hot.put(key.clone(), promoted);
                }
                return Some((value, CacheHit::Warm));
            }
            inner.warm.pop(key);
        }

        inner.misses += 1;
        None
    }

    async fn insert(&self, key: K, value: V, page: usize) {
        let mut inner = self.inner.lock().await;
        let now = Instant::now();
        if page <= HOT_PAGE_CUTOFF {
            inner.hot.put(key, Entry { value, expires_at: now + HOT_TTL });
        } else {
            inner.warm.put(key, Entry { value, expires_at: now + WARM_TTL });
        }
    }

    /// Clear entries whose key's city component equals `city`, and nothing
    /// else (§4.10) — `"bristol"` must never also clear `"bristolshire"`.
    /// `partial=true` clears hot only; `partial=false` clears both tiers.
    pub async fn invalidate_prefix(&self, city: &str, partial: bool)
    where
        K: AsRef<str>,
    {
        let mut inner = self.inner.lock().await;
        retain_without_city(&mut inner.hot, city);
        if !partial {
            retain_without_city(&mut inner.warm, city);
            inner.warm_hits.retain(|k, _| key_city(k.as_ref()) != city);
        }
    }

    /// Clear the warm-hit frequency map; called on the cold-tier interval to
    /// bound its growth (§9).
    pub async fn clear_frequency_map(&self) {
        self.inner.lock().await.warm_hits.clear();
    }

    pub async fn stats(&self) -> CacheStats {
        let inner = self.inner.lock().await;
        CacheStats {
            hits_hot: inner.hits_hot,
            hits_warm: inner.hits_warm,
            misses: inner.misses,
            hot_size: inner.hot.len(),
            warm_size: inner.warm.len(),
        }
    }
}

impl<K: Hash + Eq + Clone + Send + Sync + 'static, V: Clone + Send + Sync + 'static> Default for TieredCache<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

/// The city component of a list-query key is everything before the first
/// `'|'` (see `gigsignal_query::key::list_query_key`).
fn key_city(key: &str) -> &str {
    key.split('|').next().unwrap_or(key)
}

fn retain_without_city<K, V>(cache: &mut LruCache<K, V>, city: &str)
where
    K: Hash + Eq + Clone + AsRef<str>,
{
    let stale: Vec<K> = cache
        .iter()
        .filter(|(k, _)| key_city(k.as_ref()) == city)
        .map(|(k, _)| k.clone())
        .collect();
    for key in stale {
        cache.pop(&key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn first_fetch_is_a_miss_second_is_a_hot_hit() {
        let cache: TieredCache<String, i32> = TieredCache::new();
        let calls = Arc::new(AtomicU32::new(0));

        let c = calls.clone();
        let (v, hit) = cache
            .get_or_fetch("bristol:1".to_string(), 1, || async move {
                c.fetch_add(1, Ordering::SeqCst);
                42
            })
            .await;
        assert_eq!(v, 42);
        assert_eq!(hit, CacheHit::Miss);

        let c = calls.clone();
        let (v, hit) = cache
            .get_or_fetch("bristol:1".to_string(), 1, || async move {
                c.fetch_add(1, Ordering::SeqCst);
                99
            })
            .await;
        assert_eq!(v, 42);
        assert_eq!(hit, CacheHit::Hot);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn pages_past_ten_are_never_cached() {
        let cache: TieredCache<String, i32> = TieredCache::new();
        let calls = Arc::new(AtomicU32::new(0));

        for _ in 0..2 {
            let c = calls.clone();
            cache
                .get_or_fetch("bristol:11".to_string(), 11, || async move {
                    c.fetch_add(1, Ordering::SeqCst);
                    1
                })
                .await;
        }
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn mid_range_pages_land_in_warm_tier() {
        let cache: TieredCache<String, i32> = TieredCache::new();
        let (_, hit) = cache.get_or_fetch("bristol:5".to_string(), 5, || async { 7 }).await;
        assert_eq!(hit, CacheHit::Miss);

        let (_, hit) = cache.get_or_fetch("bristol:5".to_string(), 5, || async { 7 }).await;
        assert_eq!(hit, CacheHit::Warm);
    }

    #[tokio::test]
    async fn warm_entry_promotes_to_hot_after_four_hits() {
        let cache: TieredCache<String, i32> = TieredCache::new();
        cache.get_or_fetch("bristol:5".to_string(), 5, || async { 7 }).await;

        for _ in 0..4 {
            cache.get_or_fetch("bristol:5".to_string(), 5, || async { 7 }).await;
        }

        let stats = cache.stats().await;
        assert!(stats.hot_size >= 1, "expected promotion into hot tier");
    }

    #[tokio::test]
    async fn invalidate_prefix_partial_clears_hot_only() {
        let cache: TieredCache<String, i32> = TieredCache::new();
        cache.get_or_fetch("bristol|page=1".to_string(), 1, || async { 1 }).await;
        cache.get_or_fetch("bristol|page=5".to_string(), 5, || async { 2 }).await;

        cache.invalidate_prefix("bristol", true).await;

        let (_, hit) = cache.get_or_fetch("bristol|page=1".to_string(), 1, || async { 1 }).await;
        assert_eq!(hit, CacheHit::Miss);
        let (_, hit) = cache.get_or_fetch("bristol|page=5".to_string(), 5, || async { 2 }).await;
        assert_eq!(hit, CacheHit::Warm);
    }

    #[tokio::test]
    async fn invalidate_prefix_full_clears_both_tiers() {
        let cache: TieredCache<String, i32> = TieredCache::new();
        cache.get_or_fetch("bristol|page=1".to_string(), 1, || async { 1 }).await;
        cache.get_or_fetch("bristol|page=5".to_string(), 5, || async { 2 }).await;

        cache.invalidate_prefix("bristol", false).await;

        let (_, hit) = cache.get_or_fetch("bristol|page=1".to_string(), 1, || async { 1 }).await;
        assert_eq!(hit, CacheHit::Miss);
        let (_, hit) = cache.get_or_fetch("bristol|page=5".to_string(), 5, || async { 2 }).await;
        assert_eq!(hit, CacheHit::Miss);
    }

    #[tokio::test]
    async fn invalidate_prefix_does_not_clear_a_city_with_a_shared_prefix() {
        let cache: TieredCache<String, i32> = TieredCache::new();
        cache.get_or_fetch("bristol|page=1".to_string(), 1, || async { 1 }).await;
        cache.get_or_fetch("bristolshire|page=1".to_string(), 1, || async { 2 }).await;

        cache.invalidate_prefix("bristol", false).await;

        let (_, hit) = cache.get_or_fetch("bristolshire|page=1".to_string(), 1, || async { 2 }).await;
        assert_eq!(hit, CacheHit::Hot, "bristolshire must survive invalidating bristol");
    }

    #[tokio::test]
    async fn concurrent_misses_coalesce_into_one_fetch() {
        let cache: Arc<TieredCache<String, i32>> = Arc::new(TieredCache::new());
        let calls = Arc::new(AtomicU32::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let cache = cache.clone();
            let calls = calls.clone();
            handles.push(tokio::spawn(async move {
                cache
                    .get_or_fetch("bristol:1".to_string(), 1, || async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(20)).await;
                        5
                    })
                    .await
            }));
        }

        for h in handles {
            let (v, _) = h.await.unwrap();
            assert_eq!(v, 5);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
