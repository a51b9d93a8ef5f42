//! Advisory read cache for the published namespace.
//!
//! Strictly best-effort: the publish engine writes through on publish and
//! reads through on published-document gets, but the authoritative answer
//! always comes from the store. Implementations must swallow their own
//! failures; a broken cache degrades to `NoopCache` behavior, never to an
//! error.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::RwLock;

/// Cache keys have the form `"<id>@<version-or-latest>"`.
#[async_trait]
pub trait Cache: Send + Sync {
    async fn get(&self, key: &str) -> Option<String>;

    async fn set(&self, key: &str, value: &str, ttl: Duration);

    async fn remove(&self, key: &str);
}

/// Default cache: stores nothing, always misses.
#[derive(Debug, Default)]
pub struct NoopCache;

#[async_trait]
impl Cache for NoopCache {
    async fn get(&self, _key: &str) -> Option<String> {
        None
    }

    async fn set(&self, _key: &str, _value: &str, _ttl: Duration) {}

    async fn remove(&self, _key: &str) {}
}

/// In-process TTL cache for single-node deployments and tests.
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: RwLock<HashMap<String, (String, Instant)>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Cache for MemoryCache {
    async fn get(&self, key: &str) -> Option<String> {
        let entries = self.entries.read().await;
        match entries.get(key) {
            Some((value, deadline)) if *deadline > Instant::now() => Some(value.clone()),
            _ => None,
        }
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) {
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        entries.retain(|_, (_, deadline)| *deadline > now);
        entries.insert(key.to_string(), (value.to_string(), now + ttl));
    }

    async fn remove(&self, key: &str) {
        self.entries.write().await.remove(key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_cache_round_trips() {
        let cache = MemoryCache::new();
        cache.set("a@latest", "payload", Duration::from_secs(60)).await;
        assert_eq!(cache.get("a@latest").await.as_deref(), Some("payload"));
    }

    #[tokio::test]
    async fn memory_cache_expires_entries() {
        let cache = MemoryCache::new();
        cache.set("a@0.0.1", "payload", Duration::from_millis(0)).await;
        assert_eq!(cache.get("a@0.0.1").await, None);
    }

    #[tokio::test]
    async fn memory_cache_removes_entries() {
        let cache = MemoryCache::new();
        cache.set("a@latest", "payload", Duration::from_secs(60)).await;
        cache.remove("a@latest").await;
        assert_eq!(cache.get("a@latest").await, None);
    }

    #[tokio::test]
    async fn noop_cache_always_misses() {
        let cache = NoopCache;
        cache.set("a@latest", "payload", Duration::from_secs(60)).await;
        assert_eq!(cache.get("a@latest").await, None);
    }
}
