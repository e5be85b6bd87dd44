//! # Cache Key Generator
//!
//! Keys have the shape `{prefix}:{METHOD:/path}:{identity}:{query}` where `query` is
//! the JSON form of the query parameters with sorted keys, so the key is a pure function
//! of the parameter set and never of its insertion order.
//!
//! Keys longer than the configured maximum are replaced by
//! `{prefix}:sha256:{hex digest of the full key}` to stay within store limits.

use crate::core::types::{CallerIdentity, RouteKey};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashMap};

pub const DEFAULT_KEY_PREFIX: &str = "gateway:cache";
pub const DEFAULT_MAX_KEY_LENGTH: usize = 250;

/// Deterministic cache key builder
#[derive(Debug, Clone)]
pub struct CacheKeyGenerator {
    prefix: String,
    max_length: usize,
}

impl CacheKeyGenerator {
    pub fn new() -> Self {
        Self {
            prefix: DEFAULT_KEY_PREFIX.to_string(),
            max_length: DEFAULT_MAX_KEY_LENGTH,
        }
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    pub fn with_max_length(mut self, max_length: usize) -> Self {
        self.max_length = max_length;
        self
    }

    /// Build the key for a route, caller and query parameter set
    pub fn generate(
        &self,
        route: &RouteKey,
        caller: &CallerIdentity,
        query: &HashMap<String, String>,
    ) -> String {
        let key = format!(
            "{}:{}:{}:{}",
            self.prefix,
            route,
            caller.cache_segment(),
            canonical_query(query)
        );

        if key.len() <= self.max_length {
            return key;
        }
        self.hashed(&key)
    }

    fn hashed(&self, key: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(key.as_bytes());
        format!("{}:sha256:{}", self.prefix, hex::encode(hasher.finalize()))
    }
}

impl Default for CacheKeyGenerator {
    fn default() -> Self {
        Self::new()
    }
}

/// JSON object with sorted keys, `{}` for no parameters
fn canonical_query(query: &HashMap<String, String>) -> String {
    let sorted: BTreeMap<&String, &String> = query.iter().collect();
    serde_json::to_string(&sorted).unwrap_or_else(|_| "{}".to_string())
}
