//! C5 cache provider (spec.md §4.5): TTL expiration, capacity eviction,
//! glob key lookup, batch get/set, `get_or_set`, stats and a background
//! reaper task.

mod glob;
mod store;

pub use store::{CacheStats, InMemoryCache};

/// Cache provider surface (spec.md §4.5 "Cache provider interface"). Kept
/// as a trait so the pluggable-provider story the spec calls for (even
/// though only the in-memory implementation is in scope, §1) has a real
/// seam to plug into. Native `async fn`-in-trait, matching the rest of the
/// workspace's preference for inherent async over `#[async_trait]` boxing.
pub trait CacheStore: Send + Sync {
    fn set(
        &self,
        key: &str,
        value: bytes::Bytes,
        ttl: Option<std::time::Duration>,
    ) -> impl std::future::Future<Output = ()> + Send;
    fn get(&self, key: &str) -> impl std::future::Future<Output = Option<bytes::Bytes>> + Send;
    fn has(&self, key: &str) -> impl std::future::Future<Output = bool> + Send;
    fn delete(&self, key: &str) -> impl std::future::Future<Output = bool> + Send;
    fn clear(&self) -> impl std::future::Future<Output = ()> + Send;
    fn keys(
        &self,
        pattern: Option<&str>,
    ) -> impl std::future::Future<Output = Vec<String>> + Send;
    fn cleanup(&self) -> impl std::future::Future<Output = usize> + Send;
    fn get_stats(&self) -> impl std::future::Future<Output = CacheStats> + Send;
}
