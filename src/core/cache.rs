//! Key/value cache abstractions shared by the providers

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

/// A named collection of raw byte entries with optional expiry.
#[async_trait]
pub trait KeyValueCollection: Send + Sync {
    async fn get(&self, key: &[u8]) -> Option<Vec<u8>>;
    async fn put(&self, key: &[u8], value: &[u8], ttl: Option<Duration>);
    async fn clear(&self);
}

pub trait Store: Send + Sync {
    /// Returns the named collection, creating it when missing. Persistent
    /// collections survive restarts when the backing keyspace is available.
    fn get_collection(&self, name: &str, persist: bool) -> Arc<dyn KeyValueCollection>;
}
