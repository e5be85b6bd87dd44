//! # Redis Cache Store
//!
//! Shared cache backed by Redis. Values are written with `SET ... EX` so Redis owns
//! expiry; the connection manager reconnects on its own after transient failures.

use super::CacheStore;
use crate::caching::CacheResult;
use async_trait::async_trait;
use redis::{aio::ConnectionManager, AsyncCommands, Client};
use std::time::Duration;
use tracing::{debug, info};

/// Redis cache implementation
#[derive(Clone)]
pub struct RedisCache {
    connection_manager: ConnectionManager,
}

impl RedisCache {
    /// Connect to Redis at `url`
    pub async fn connect(url: &str) -> CacheResult<Self> {
        let client = Client::open(url)?;
        let connection_manager = ConnectionManager::new(client).await?;
        info!(url, "Redis cache connected");
        Ok(Self { connection_manager })
    }
}

#[async_trait]
impl CacheStore for RedisCache {
    async fn get(&self, key: &str) -> CacheResult<Option<String>> {
        let mut conn = self.connection_manager.clone();
        let value: Option<String> = conn.get(key).await?;
        debug!(key, hit = value.is_some(), "Redis cache lookup");
        Ok(value)
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> CacheResult<()> {
        let mut conn = self.connection_manager.clone();
        // EX 0 is rejected by Redis
        let seconds = ttl.as_secs().max(1);
        conn.set_ex::<_, _, ()>(key, value, seconds).await?;
        debug!(key, ttl_seconds = seconds, "Set Redis cache key");
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "redis"
    }
}
