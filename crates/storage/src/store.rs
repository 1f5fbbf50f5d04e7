use std::time::Duration;

use async_trait::async_trait;

use crate::error::Result;

/// Key-value state store contract.
///
/// Values are opaque strings (the repos layer JSON on top). `put` with a
/// TTL makes the key expire after the given duration; backends may expire
/// lazily, but an expired key must never be returned from `get`.
#[async_trait]
pub trait StateStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;

    async fn put(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<()>;

    async fn delete(&self, key: &str) -> Result<()>;
}
