//! Redelivery suppression for call-establishment events.
//!
//! Event Grid retries deliveries, so the same incoming call may arrive more
//! than once. Keys are remembered in a bounded FIFO set; with the `store`
//! scope they are also written to the session store so other processes
//! sharing it see them.

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::core::store::{SessionStore, keys};

pub const DEFAULT_IDEMPOTENCY_CAPACITY: usize = 1024;

/// Where processed event keys are remembered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdempotencyScope {
    #[default]
    Process,
    Store,
}

impl IdempotencyScope {
    pub fn from_str_or_default(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "store" => Self::Store,
            _ => Self::Process,
        }
    }
}

#[derive(Debug, Default)]
struct RecentKeys {
    order: VecDeque<String>,
    seen: HashSet<String>,
}

pub struct EventDeduplicator {
    scope: IdempotencyScope,
    capacity: usize,
    recent: Mutex<RecentKeys>,
    store: Option<Arc<dyn SessionStore>>,
}

impl std::fmt::Debug for EventDeduplicator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventDeduplicator")
            .field("scope", &self.scope)
            .field("capacity", &self.capacity)
            .finish()
    }
}

impl EventDeduplicator {
    pub fn new(
        scope: IdempotencyScope,
        capacity: usize,
        store: Option<Arc<dyn SessionStore>>,
    ) -> Self {
        Self {
            scope,
            capacity: capacity.max(1),
            recent: Mutex::new(RecentKeys::default()),
            store,
        }
    }

    /// Returns `true` the first time `key` is seen and marks it processed.
    pub async fn check_and_mark(&self, key: &str) -> bool {
        if !self.remember(key) {
            return false;
        }

        if self.scope == IdempotencyScope::Store
            && let Some(store) = &self.store
        {
            let store_key = keys::processed_event(key);
            match store.get(&store_key).await {
                Ok(Some(_)) => return false,
                Ok(None) => {
                    if let Err(e) = store.set(&store_key, "1".to_string()).await {
                        warn!(key = %key, "Failed to record processed event: {}", e);
                    }
                }
                Err(e) => warn!(key = %key, "Processed event lookup failed: {}", e),
            }
        }
        true
    }

    fn remember(&self, key: &str) -> bool {
        let mut recent = self.recent.lock();
        if recent.seen.contains(key) {
            return false;
        }
        if recent.order.len() >= self.capacity
            && let Some(oldest) = recent.order.pop_front()
        {
            recent.seen.remove(&oldest);
        }
        recent.order.push_back(key.to_string());
        recent.seen.insert(key.to_string());
        true
    }

    pub fn len(&self) -> usize {
        self.recent.lock().order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::store::MemorySessionStore;

    #[tokio::test]
    async fn test_second_delivery_skipped() {
        let dedup = EventDeduplicator::new(IdempotencyScope::Process, 16, None);
        assert!(dedup.check_and_mark("srv-1").await);
        assert!(!dedup.check_and_mark("srv-1").await);
        assert!(dedup.check_and_mark("srv-2").await);
    }

    #[tokio::test]
    async fn test_fifo_eviction() {
        let dedup = EventDeduplicator::new(IdempotencyScope::Process, 2, None);
        assert!(dedup.check_and_mark("a").await);
        assert!(dedup.check_and_mark("b").await);
        assert!(dedup.check_and_mark("c").await);
        assert_eq!(dedup.len(), 2);
        // "a" was evicted
        assert!(dedup.check_and_mark("a").await);
        assert!(!dedup.check_and_mark("c").await);
    }

    #[tokio::test]
    async fn test_store_scope_shared_between_instances() {
        let store: Arc<dyn SessionStore> = Arc::new(MemorySessionStore::new());
        let first = EventDeduplicator::new(IdempotencyScope::Store, 16, Some(store.clone()));
        let second = EventDeduplicator::new(IdempotencyScope::Store, 16, Some(store.clone()));

        assert!(first.check_and_mark("srv-1").await);
        assert!(!second.check_and_mark("srv-1").await);
        assert_eq!(
            store.get("processed_event:srv-1").await.unwrap().as_deref(),
            Some("1")
        );
    }

    #[test]
    fn test_scope_parsing() {
        assert_eq!(IdempotencyScope::from_str_or_default("STORE"), IdempotencyScope::Store);
        assert_eq!(IdempotencyScope::from_str_or_default("process"), IdempotencyScope::Process);
        assert_eq!(IdempotencyScope::from_str_or_default("bogus"), IdempotencyScope::Process);
    }
}
