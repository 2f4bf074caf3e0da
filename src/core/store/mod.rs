//! Session store adapter.
//!
//! A small key/value store for cross-request call bookkeeping (correlation
//! lookups, call payloads, processed event ids). Entries are hints only: the
//! call registry is the source of truth for call state.

mod memory;

pub use memory::MemorySessionStore;

use async_trait::async_trait;
use thiserror::Error;

/// Errors from a session store backend.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Store backend error: {0}")]
    Backend(String),
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Namespaced get/set/delete of small string values.
///
/// No ordering or transactional guarantees; last write wins.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn get(&self, key: &str) -> StoreResult<Option<String>>;
    async fn set(&self, key: &str, value: String) -> StoreResult<()>;
    async fn delete(&self, key: &str) -> StoreResult<()>;
}

/// Key builders for the entries the gateway writes.
pub mod keys {
    /// Correlation id to platform call id.
    pub fn call_id(correlation_id: &str) -> String {
        format!("call_id:{correlation_id}")
    }

    /// Platform call id to correlation id.
    pub fn correlation_id(call_id: &str) -> String {
        format!("correlation_id:{call_id}")
    }

    /// Call initiation payload, as JSON.
    pub fn payload(call_id: &str) -> String {
        format!("payload:{call_id}")
    }

    /// Marker for an already processed call-establishment event.
    pub fn processed_event(event_key: &str) -> String {
        format!("processed_event:{event_key}")
    }
}

#[cfg(test)]
mod tests {
    use super::keys;

    #[test]
    fn test_key_scheme() {
        assert_eq!(keys::call_id("corr-1"), "call_id:corr-1");
        assert_eq!(keys::correlation_id("C1"), "correlation_id:C1");
        assert_eq!(keys::payload("C1"), "payload:C1");
        assert_eq!(keys::processed_event("srv-9"), "processed_event:srv-9");
    }
}
