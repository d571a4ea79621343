//! In-process cache with per-entry expiry

use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::time::Instant;

use super::error::CacheError;
use super::Cache;

struct Entry {
    value: String,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| now >= at)
    }
}

#[derive(Default)]
pub struct MemoryCache {
    entries: DashMap<String, Entry>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove expired entries, returning how many were dropped
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired(now));
        before - self.entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl Cache for MemoryCache {
    async fn get(&self, key: &str) -> Option<String> {
        let now = Instant::now();
        let value = self
            .entries
            .get(key)
            .filter(|entry| !entry.is_expired(now))
            .map(|entry| entry.value.clone());

        if value.is_none() {
            self.entries.remove_if(key, |_, entry| entry.is_expired(now));
        }
        value
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError> {
        let expires_at = (!ttl.is_zero()).then(|| Instant::now() + ttl);
        self.entries.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at,
            },
        );
        Ok(())
    }

    async fn is_exist(&self, key: &str) -> bool {
        self.get(key).await.is_some()
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        self.entries.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_entries_expire() {
        let cache = MemoryCache::new();
        cache.set("ticket", "t1", Duration::from_secs(10)).await.unwrap();
        cache.set("forever", "f", Duration::ZERO).await.unwrap();

        assert_eq!(cache.get("ticket").await.as_deref(), Some("t1"));
        tokio::time::advance(Duration::from_secs(11)).await;

        assert!(!cache.is_exist("ticket").await);
        assert_eq!(cache.get("forever").await.as_deref(), Some("f"));
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_purge_expired() {
        let cache = MemoryCache::new();
        for i in 0..3 {
            cache
                .set(&format!("k{}", i), "v", Duration::from_secs(5))
                .await
                .unwrap();
        }
        cache.set("keep", "v", Duration::from_secs(60)).await.unwrap();

        tokio::time::advance(Duration::from_secs(6)).await;
        assert_eq!(cache.purge_expired(), 3);
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn test_delete_and_overwrite() {
        let cache = MemoryCache::new();
        cache.set("k", "a", Duration::from_secs(60)).await.unwrap();
        cache.set("k", "b", Duration::from_secs(60)).await.unwrap();
        assert_eq!(cache.get("k").await.as_deref(), Some("b"));

        cache.delete("k").await.unwrap();
        assert!(cache.is_empty());
        cache.delete("k").await.unwrap();
    }
}
