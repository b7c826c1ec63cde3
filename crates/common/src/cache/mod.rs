//! In-memory TTL cache
//!
//! Provides:
//! - Generic get/insert operations with per-entry TTL
//! - Expiry checked on read (expired entries are dropped and reported as misses)
//! - Loader-based population for reference listings

use crate::errors::Result;
use crate::metrics::record_cache;
use std::collections::HashMap;
use std::hash::Hash;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{debug, warn};

#[derive(Debug, Clone)]
struct Entry<V> {
    value: V,
    inserted_at: Instant,
    ttl: Duration,
}

impl<V> Entry<V> {
    fn is_expired(&self, now: Instant) -> bool {
        now.duration_since(self.inserted_at) >= self.ttl
    }
}

/// Timestamped map guarded by an async RwLock
pub struct TtlCache<K, V> {
    name: &'static str,
    entries: RwLock<HashMap<K, Entry<V>>>,
    default_ttl: Duration,
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash + Clone + std::fmt::Debug,
    V: Clone,
{
    pub fn new(default_ttl: Duration) -> Self {
        Self::named("default", default_ttl)
    }

    /// Cache whose hit/miss metrics carry `name` as label
    pub fn named(name: &'static str, default_ttl: Duration) -> Self {
        Self {
            name,
            entries: RwLock::new(HashMap::new()),
            default_ttl,
        }
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// Get a live value; an expired entry is removed and counts as a miss
    pub async fn get(&self, key: &K) -> Option<V> {
        let now = Instant::now();
        {
            let entries = self.entries.read().await;
            match entries.get(key) {
                Some(entry) if !entry.is_expired(now) => {
                    debug!(key = ?key, "Cache hit");
                    record_cache(true, self.name);
                    return Some(entry.value.clone());
                }
                None => {
                    debug!(key = ?key, "Cache miss");
                    record_cache(false, self.name);
                    return None;
                }
                Some(_) => {}
            }
        }

        // Expired: re-check under the write lock, a writer may have refreshed it
        let mut entries = self.entries.write().await;
        if entries.get(key).is_some_and(|entry| entry.is_expired(now)) {
            entries.remove(key);
        }
        debug!(key = ?key, "Cache entry expired");
        record_cache(false, self.name);
        None
    }

    /// Insert with the default TTL
    pub async fn insert(&self, key: K, value: V) {
        self.insert_with_ttl(key, value, self.default_ttl).await
    }

    pub async fn insert_with_ttl(&self, key: K, value: V, ttl: Duration) {
        debug!(key = ?key, ttl_ms = ttl.as_millis() as u64, "Cache set");
        self.entries.write().await.insert(
            key,
            Entry {
                value,
                inserted_at: Instant::now(),
                ttl,
            },
        );
    }

    /// Remove a key, returning whether it was present
    pub async fn invalidate(&self, key: &K) -> bool {
        let removed = self.entries.write().await.remove(key).is_some();
        debug!(key = ?key, removed, "Cache invalidate");
        removed
    }

    pub async fn clear(&self) {
        self.entries.write().await.clear();
    }

    /// Drop every expired entry, returning how many were removed
    pub async fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired(now));
        before - entries.len()
    }

    /// Number of stored entries, expired ones included
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// Get or populate with a loader. Loader errors propagate and nothing is cached.
    pub async fn get_or_load<F, Fut>(&self, key: K, loader: F) -> Result<V>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<V>>,
    {
        if let Some(cached) = self.get(&key).await {
            return Ok(cached);
        }

        let value = loader().await.map_err(|e| {
            warn!(key = ?key, error = %e, "Cache loader failed");
            e
        })?;

        self.insert(key, value.clone()).await;
        Ok(value)
    }
}

/// Cache key builder helpers
pub mod keys {
    pub const NATURES_DOCUMENTS: &str = "reference:natures_documents";
    pub const POSTES_COMPTABLES: &str = "reference:postes_comptables";
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::AppError;

    #[tokio::test]
    async fn test_insert_and_get() {
        let cache: TtlCache<String, i32> = TtlCache::new(Duration::from_secs(60));
        cache.insert("a".to_string(), 1).await;

        assert_eq!(cache.get(&"a".to_string()).await, Some(1));
        assert_eq!(cache.get(&"b".to_string()).await, None);
    }

    #[tokio::test]
    async fn test_expired_entry_is_a_miss_and_removed() {
        let cache: TtlCache<&'static str, i32> = TtlCache::new(Duration::from_secs(60));
        cache.insert_with_ttl("gone", 1, Duration::ZERO).await;
        assert_eq!(cache.len().await, 1);

        assert_eq!(cache.get(&"gone").await, None);
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn test_invalidate() {
        let cache: TtlCache<&'static str, i32> = TtlCache::new(Duration::from_secs(60));
        cache.insert("k", 7).await;

        assert!(cache.invalidate(&"k").await);
        assert!(!cache.invalidate(&"k").await);
        assert_eq!(cache.get(&"k").await, None);
    }

    #[tokio::test]
    async fn test_purge_expired_keeps_live_entries() {
        let cache: TtlCache<&'static str, i32> = TtlCache::new(Duration::from_secs(60));
        cache.insert("live", 1).await;
        cache.insert_with_ttl("dead", 2, Duration::ZERO).await;

        assert_eq!(cache.purge_expired().await, 1);
        assert_eq!(cache.get(&"live").await, Some(1));
    }

    #[tokio::test]
    async fn test_get_or_load_caches_value() {
        let cache: TtlCache<&'static str, Vec<i32>> = TtlCache::new(Duration::from_secs(60));

        let first = cache.get_or_load("list", || async { Ok(vec![1, 2]) }).await.unwrap();
        assert_eq!(first, vec![1, 2]);

        // Loader is not consulted while the entry is live
        let second = cache
            .get_or_load("list", || async {
                Err(AppError::Internal { message: "should not load".into() })
            })
            .await
            .unwrap();
        assert_eq!(second, vec![1, 2]);
    }

    #[tokio::test]
    async fn test_get_or_load_does_not_cache_errors() {
        let cache: TtlCache<&'static str, i32> = TtlCache::new(Duration::from_secs(60));

        let err = cache
            .get_or_load("k", || async { Err(AppError::Internal { message: "db down".into() }) })
            .await;
        assert!(err.is_err());
        assert!(cache.is_empty().await);
    }
}
