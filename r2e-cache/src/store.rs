//! `InMemoryCache`: the only `CacheStore` implementation in scope (spec.md
//! §1, §4.5).

use bytes::Bytes;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::glob::glob_match;
use crate::CacheStore;

struct Entry {
    value: Bytes,
    created_at: Instant,
    expire_at: Option<Instant>,
    hits: u64,
}

impl Entry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expire_at.is_some_and(|at| now > at)
    }
}

/// Snapshot returned by `get_stats` (spec.md §4.5).
#[derive(Debug, Clone, Copy, Default)]
pub struct CacheStats {
    pub total: usize,
    pub hits: u64,
    pub misses: u64,
    pub hit_rate: f64,
    /// Approximate resident bytes: sum of stored value lengths. The spec
    /// leaves "memory" unit-unspecified; bytes is the cheapest honest unit
    /// to report without per-entry bookkeeping overhead.
    pub memory: usize,
}

struct Inner {
    entries: DashMap<String, Entry>,
    namespace: String,
    max_entries: usize,
    hits: AtomicU64,
    misses: AtomicU64,
}

/// TTL + capacity-bounded in-memory cache (spec.md §3 Cache Entry, §4.5).
/// Keys are namespaced `"{namespace}:{key}"`; `keys()` strips the prefix
/// back off before returning results to the caller.
#[derive(Clone)]
pub struct InMemoryCache {
    inner: Arc<Inner>,
}

impl InMemoryCache {
    pub fn new(namespace: impl Into<String>, max_entries: usize) -> Self {
        Self {
            inner: Arc::new(Inner {
                entries: DashMap::new(),
                namespace: namespace.into(),
                max_entries,
                hits: AtomicU64::new(0),
                misses: AtomicU64::new(0),
            }),
        }
    }

    fn namespaced(&self, key: &str) -> String {
        format!("{}:{}", self.inner.namespace, key)
    }

    /// `set` honors capacity (§4.5): when at capacity and the key is new,
    /// evict the oldest entry by `created_at`.
    fn set_sync(&self, key: &str, value: Bytes, ttl: Option<Duration>) {
        let full_key = self.namespaced(key);
        let now = Instant::now();
        if !self.inner.entries.contains_key(&full_key)
            && self.inner.entries.len() >= self.inner.max_entries
            && self.inner.max_entries > 0
        {
            if let Some(oldest) = self
                .inner
                .entries
                .iter()
                .min_by_key(|e| e.value().created_at)
                .map(|e| e.key().clone())
            {
                self.inner.entries.remove(&oldest);
            }
        }
        self.inner.entries.insert(
            full_key,
            Entry {
                value,
                created_at: now,
                expire_at: ttl.map(|d| now + d),
                hits: 0,
            },
        );
    }

    fn get_sync(&self, key: &str) -> Option<Bytes> {
        let full_key = self.namespaced(key);
        let now = Instant::now();
        let expired = match self.inner.entries.get(&full_key) {
            Some(entry) => entry.is_expired(now),
            None => {
                self.inner.misses.fetch_add(1, Ordering::Relaxed);
                return None;
            }
        };
        if expired {
            self.inner.entries.remove(&full_key);
            self.inner.misses.fetch_add(1, Ordering::Relaxed);
            return None;
        }
        self.inner.hits.fetch_add(1, Ordering::Relaxed);
        self.inner.entries.get_mut(&full_key).map(|mut e| {
            e.hits += 1;
            e.value.clone()
        })
    }

    /// `get_or_set`: on a hit, return the cached value; on a miss, call
    /// `factory`, store its result and return it.
    pub async fn get_or_set<F, Fut>(&self, key: &str, ttl: Option<Duration>, factory: F) -> Bytes
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Bytes>,
    {
        if let Some(value) = self.get_sync(key) {
            return value;
        }
        let value = factory().await;
        self.set_sync(key, value.clone(), ttl);
        value
    }

    pub async fn mset(&self, entries: Vec<(String, Bytes)>, ttl: Option<Duration>) {
        for (key, value) in entries {
            self.set_sync(&key, value, ttl);
        }
    }

    pub async fn mget(&self, keys: &[String]) -> std::collections::HashMap<String, Bytes> {
        keys.iter()
            .filter_map(|k| self.get_sync(k).map(|v| (k.clone(), v)))
            .collect()
    }

    /// One reaper pass: remove every entry with `now > expire_at` (§4.5).
    fn cleanup_sync(&self) -> usize {
        let now = Instant::now();
        let before = self.inner.entries.len();
        self.inner.entries.retain(|_, e| !e.is_expired(now));
        before - self.inner.entries.len()
    }

    /// Spawn the background reaper task (§4.5 "Background reaper runs
    /// every `check_interval`"). Returns a handle the caller can abort on
    /// shutdown.
    pub fn spawn_reaper(&self, check_interval: Duration) -> tokio::task::JoinHandle<()> {
        let cache = self.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(check_interval);
            loop {
                interval.tick().await;
                let removed = cache.cleanup_sync();
                if removed > 0 {
                    tracing::debug!(removed, "cache reaper swept expired entries");
                }
            }
        })
    }
}

impl CacheStore for InMemoryCache {
    async fn set(&self, key: &str, value: Bytes, ttl: Option<Duration>) {
        self.set_sync(key, value, ttl);
    }

    async fn get(&self, key: &str) -> Option<Bytes> {
        self.get_sync(key)
    }

    async fn has(&self, key: &str) -> bool {
        self.get_sync(key).is_some()
    }

    async fn delete(&self, key: &str) -> bool {
        self.inner.entries.remove(&self.namespaced(key)).is_some()
    }

    async fn clear(&self) {
        self.inner.entries.clear();
    }

    async fn keys(&self, pattern: Option<&str>) -> Vec<String> {
        let prefix = format!("{}:", self.inner.namespace);
        let now = Instant::now();
        self.inner
            .entries
            .iter()
            .filter(|e| !e.value().is_expired(now))
            .filter_map(|e| e.key().strip_prefix(&prefix).map(str::to_string))
            .filter(|stripped| pattern.map_or(true, |p| glob_match(p, stripped)))
            .collect()
    }

    async fn cleanup(&self) -> usize {
        self.cleanup_sync()
    }

    async fn get_stats(&self) -> CacheStats {
        let hits = self.inner.hits.load(Ordering::Relaxed);
        let misses = self.inner.misses.load(Ordering::Relaxed);
        let total_lookups = hits + misses;
        let memory = self
            .inner
            .entries
            .iter()
            .map(|e| e.value().value.len())
            .sum();
        CacheStats {
            total: self.inner.entries.len(),
            hits,
            misses,
            hit_rate: if total_lookups == 0 {
                0.0
            } else {
                hits as f64 / total_lookups as f64
            },
            memory,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cache(max: usize) -> InMemoryCache {
        InMemoryCache::new("test", max)
    }

    #[tokio::test]
    async fn set_then_get_within_ttl() {
        let c = cache(10);
        c.set("k", Bytes::from_static(b"v"), Some(Duration::from_secs(60)))
            .await;
        assert_eq!(c.get("k").await, Some(Bytes::from_static(b"v")));
    }

    #[tokio::test]
    async fn expired_entry_is_a_miss() {
        let c = cache(10);
        c.set("k", Bytes::from_static(b"v"), Some(Duration::from_millis(10)))
            .await;
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(c.get("k").await, None);
    }

    #[tokio::test]
    async fn delete_then_has_is_false() {
        let c = cache(10);
        c.set("k", Bytes::from_static(b"v"), None).await;
        assert!(c.delete("k").await);
        assert!(!c.has("k").await);
    }

    #[tokio::test]
    async fn capacity_eviction_bounds_size() {
        let c = cache(2);
        c.set("a", Bytes::from_static(b"1"), None).await;
        c.set("b", Bytes::from_static(b"2"), None).await;
        c.set("c", Bytes::from_static(b"3"), None).await;
        let stats = c.get_stats().await;
        assert_eq!(stats.total, 2);
    }

    #[tokio::test]
    async fn keys_strips_namespace_and_matches_glob() {
        let c = cache(10);
        c.set("user:1", Bytes::new(), None).await;
        c.set("user:2", Bytes::new(), None).await;
        c.set("session:1", Bytes::new(), None).await;
        let mut matched = c.keys(Some("user:*")).await;
        matched.sort();
        assert_eq!(matched, vec!["user:1".to_string(), "user:2".to_string()]);
    }

    #[tokio::test]
    async fn get_or_set_only_calls_factory_on_miss() {
        let c = cache(10);
        let calls = Arc::new(AtomicU64::new(0));
        let calls_clone = calls.clone();
        let v1 = c
            .get_or_set("k", None, || async move {
                calls_clone.fetch_add(1, Ordering::Relaxed);
                Bytes::from_static(b"computed")
            })
            .await;
        let calls_clone2 = calls.clone();
        let v2 = c
            .get_or_set("k", None, || async move {
                calls_clone2.fetch_add(1, Ordering::Relaxed);
                Bytes::from_static(b"computed")
            })
            .await;
        assert_eq!(v1, v2);
        assert_eq!(calls.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn mset_mget_round_trip() {
        let c = cache(10);
        c.mset(
            vec![
                ("a".to_string(), Bytes::from_static(b"1")),
                ("b".to_string(), Bytes::from_static(b"2")),
            ],
            None,
        )
        .await;
        let got = c.mget(&["a".to_string(), "b".to_string(), "missing".to_string()]).await;
        assert_eq!(got.len(), 2);
        assert_eq!(got.get("a").unwrap(), &Bytes::from_static(b"1"));
    }

    #[tokio::test]
    async fn cleanup_removes_only_expired() {
        let c = cache(10);
        c.set("fresh", Bytes::new(), Some(Duration::from_secs(60)))
            .await;
        c.set("stale", Bytes::new(), Some(Duration::from_millis(5)))
            .await;
        tokio::time::sleep(Duration::from_millis(15)).await;
        assert_eq!(c.cleanup().await, 1);
        assert!(c.has("fresh").await);
    }

    #[tokio::test]
    async fn hit_rate_tracks_hits_and_misses() {
        let c = cache(10);
        c.set("k", Bytes::new(), None).await;
        c.get("k").await;
        c.get("missing").await;
        let stats = c.get_stats().await;
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert!((stats.hit_rate - 0.5).abs() < f64::EPSILON);
    }
}
