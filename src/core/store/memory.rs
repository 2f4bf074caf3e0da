//! In-process session store backed by moka.

use std::time::Duration;

use async_trait::async_trait;
use moka::future::Cache;
use tracing::debug;

use super::{SessionStore, StoreResult};

/// Default entry lifetime.
pub const DEFAULT_TTL: Duration = Duration::from_secs(3600);

const DEFAULT_MAX_ENTRIES: u64 = 100_000;

/// Moka-based session store with a cache-wide TTL.
#[derive(Clone)]
pub struct MemorySessionStore {
    cache: Cache<String, String>,
}

impl std::fmt::Debug for MemorySessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemorySessionStore")
            .field("entries", &self.cache.entry_count())
            .finish()
    }
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::with_ttl(DEFAULT_TTL)
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        let cache = Cache::builder()
            .max_capacity(DEFAULT_MAX_ENTRIES)
            .time_to_live(ttl)
            .build();
        Self { cache }
    }
}

impl Default for MemorySessionStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        Ok(self.cache.get(key).await)
    }

    async fn set(&self, key: &str, value: String) -> StoreResult<()> {
        self.cache.insert(key.to_string(), value).await;
        debug!(key = %key, "Store set");
        Ok(())
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        self.cache.invalidate(key).await;
        debug!(key = %key, "Store delete");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_set_get_delete() {
        let store = MemorySessionStore::new();
        assert_eq!(store.get("call_id:a").await.unwrap(), None);

        store.set("call_id:a", "C1".to_string()).await.unwrap();
        assert_eq!(store.get("call_id:a").await.unwrap().as_deref(), Some("C1"));

        store.set("call_id:a", "C2".to_string()).await.unwrap();
        assert_eq!(store.get("call_id:a").await.unwrap().as_deref(), Some("C2"));

        store.delete("call_id:a").await.unwrap();
        assert_eq!(store.get("call_id:a").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_delete_missing_key_is_ok() {
        let store = MemorySessionStore::new();
        assert!(store.delete("nope").await.is_ok());
    }

    #[tokio::test]
    async fn test_entries_expire() {
        let store = MemorySessionStore::with_ttl(Duration::from_millis(50));
        store.set("k", "v".to_string()).await.unwrap();
        tokio::time::sleep(Duration::from_millis(120)).await;
        assert_eq!(store.get("k").await.unwrap(), None);
    }
}
