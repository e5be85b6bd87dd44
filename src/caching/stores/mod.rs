//! # Cache Stores Module
//!
//! The cache adapter boundary and its in-memory and Redis implementations.

pub mod memory;
pub mod redis_store;

pub use memory::InMemoryCache;
pub use redis_store::RedisCache;

use super::CacheResult;
use async_trait::async_trait;
use std::time::Duration;

/// Key-value store with per-entry TTL
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Get a live value, `None` on miss or expiry
    async fn get(&self, key: &str) -> CacheResult<Option<String>>;

    /// Set a value that expires after `ttl`
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> CacheResult<()>;

    /// Backend name for logs
    fn backend(&self) -> &'static str;
}
