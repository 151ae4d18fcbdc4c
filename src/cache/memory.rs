use super::{CacheError, CacheKey, CacheStore};
use async_trait::async_trait;
use lru::LruCache;
use serde_json::Value;
use std::num::NonZeroUsize;
use std::sync::Mutex;
use std::time::{Duration, Instant};

const DEFAULT_CAPACITY: usize = 10_000;

/// In-process [`CacheStore`]: a bounded LRU map of `(expiry, payload)`.
///
/// Expired entries read as misses and are evicted on access.
pub struct MemoryCacheStore {
    entries: Mutex<LruCache<String, (Instant, Value)>>,
}

impl MemoryCacheStore {
    /// A zero capacity falls back to the default of 10 000 entries.
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity)
            .or_else(|| NonZeroUsize::new(DEFAULT_CAPACITY))
            .unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for MemoryCacheStore {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

fn poisoned<T>(_: T) -> CacheError {
    CacheError::Unavailable("memory cache lock poisoned".to_string())
}

#[async_trait]
impl CacheStore for MemoryCacheStore {
    async fn get(&self, key: &CacheKey) -> Result<Option<Value>, CacheError> {
        let mut entries = self.entries.lock().map_err(poisoned)?;
        let expired = match entries.get(key.as_str()) {
            Some((expiry, value)) if *expiry > Instant::now() => return Ok(Some(value.clone())),
            Some(_) => true,
            None => false,
        };
        if expired {
            entries.pop(key.as_str());
        }
        Ok(None)
    }

    async fn set(&self, key: &CacheKey, value: Value, ttl: Duration) -> Result<(), CacheError> {
        let mut entries = self.entries.lock().map_err(poisoned)?;
        entries.put(key.as_str().to_string(), (Instant::now() + ttl, value));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Map};

    fn key(name: &str) -> CacheKey {
        CacheKey::build("lib", name, &Map::new())
    }

    #[tokio::test]
    async fn stores_and_expires_entries() {
        let store = MemoryCacheStore::new(4);
        store
            .set(&key("a"), json!({"v": 1}), Duration::from_secs(60))
            .await
            .unwrap();
        assert_eq!(store.get(&key("a")).await.unwrap(), Some(json!({"v": 1})));

        store.set(&key("b"), json!(2), Duration::ZERO).await.unwrap();
        assert_eq!(store.get(&key("b")).await.unwrap(), None);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn evicts_least_recently_used() {
        let store = MemoryCacheStore::new(2);
        let ttl = Duration::from_secs(60);
        store.set(&key("a"), json!(1), ttl).await.unwrap();
        store.set(&key("b"), json!(2), ttl).await.unwrap();
        store.get(&key("a")).await.unwrap();
        store.set(&key("c"), json!(3), ttl).await.unwrap();
        assert!(store.get(&key("b")).await.unwrap().is_none());
        assert!(store.get(&key("a")).await.unwrap().is_some());
    }
}
