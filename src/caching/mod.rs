//! # Caching Module
//!
//! Best-effort response caching for routes with a positive TTL.
//!
//! ## Architecture
//! 1. **Cache Stores**: the [`CacheStore`] adapter trait with in-memory and Redis backends
//! 2. **Key Generator**: deterministic keys from route, caller identity and query parameters
//!
//! Cached values are the already-transformed response payloads serialized as JSON
//! strings. A [`CacheError`] is always absorbed by the dispatcher: a failing store
//! degrades to a miss on read and to a no-op on write.

pub mod key_generator;
pub mod stores;

pub use key_generator::CacheKeyGenerator;
pub use stores::{CacheStore, InMemoryCache, RedisCache};

/// Cache operation result
pub type CacheResult<T> = Result<T, CacheError>;

/// Cache-specific error types
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("Cache store error: {message}")]
    Store { message: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),
}
