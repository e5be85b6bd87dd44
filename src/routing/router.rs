//! # Router Module
//!
//! The route table maps an exact `(method, path)` key to a [`RouteConfig`]. There is no
//! pattern or wildcard support: method and path must match byte-for-byte.
//!
//! ## Rust Concepts Used
//!
//! - `RouteKind` is a closed, tagged enum, so a route either carries aggregation and/or
//!   transformation or it does not; there are no half-populated option combinations
//! - Configs are stored as `Arc<RouteConfig>` so a match hands out a cheap clone that
//!   stays valid even if the route is re-registered mid-request
//! - Registration replaces any previous entry for the same key (last write wins)

use crate::aggregation::AggregationConfig;
use crate::core::error::{GatewayError, GatewayResult};
use crate::core::types::RouteKey;
use crate::transformation::TransformationConfig;
use axum::http::Method;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

/// Longest accepted response cache lifetime (one year)
pub const MAX_CACHE_TTL_SECONDS: u64 = 365 * 24 * 60 * 60;

/// What a route does beyond reaching its target service
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RouteKind {
    /// Single proxy call through the load balancer
    #[default]
    Proxy,
    Aggregated {
        aggregation: AggregationConfig,
    },
    Transformed {
        transformation: TransformationConfig,
    },
    AggregatedAndTransformed {
        aggregation: AggregationConfig,
        transformation: TransformationConfig,
    },
}

/// Dispatch configuration for one route key
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteConfig {
    pub key: RouteKey,

    /// Service called by plain proxy routes
    pub target_service: String,

    /// Path sent upstream, the inbound path when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_path: Option<String>,

    /// Response cache lifetime, 0 disables caching
    #[serde(default)]
    pub cache_ttl_seconds: u64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms_override: Option<u64>,

    /// Informational; authentication is enforced before the gateway
    #[serde(default)]
    pub requires_auth: bool,

    #[serde(default)]
    pub kind: RouteKind,
}

impl RouteConfig {
    /// Create a plain proxy route
    pub fn proxy(method: Method, path: impl Into<String>, target_service: impl Into<String>) -> Self {
        Self {
            key: RouteKey::new(method, path),
            target_service: target_service.into(),
            target_path: None,
            cache_ttl_seconds: 0,
            timeout_ms_override: None,
            requires_auth: false,
            kind: RouteKind::Proxy,
        }
    }

    pub fn with_target_path(mut self, target_path: impl Into<String>) -> Self {
        self.target_path = Some(target_path.into());
        self
    }

    pub fn with_cache_ttl(mut self, seconds: u64) -> Self {
        self.cache_ttl_seconds = seconds;
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms_override = Some(timeout_ms);
        self
    }

    pub fn with_requires_auth(mut self, requires_auth: bool) -> Self {
        self.requires_auth = requires_auth;
        self
    }

    /// Attach an aggregation; disabled aggregations leave the route a plain proxy
    pub fn with_aggregation(mut self, aggregation: AggregationConfig) -> Self {
        if !aggregation.enabled {
            return self;
        }
        self.kind = match std::mem::take(&mut self.kind) {
            RouteKind::Transformed { transformation }
            | RouteKind::AggregatedAndTransformed { transformation, .. } => {
                RouteKind::AggregatedAndTransformed {
                    aggregation,
                    transformation,
                }
            }
            RouteKind::Proxy | RouteKind::Aggregated { .. } => RouteKind::Aggregated { aggregation },
        };
        self
    }

    pub fn with_transformation(mut self, transformation: TransformationConfig) -> Self {
        if transformation.is_empty() {
            return self;
        }
        self.kind = match std::mem::take(&mut self.kind) {
            RouteKind::Aggregated { aggregation }
            | RouteKind::AggregatedAndTransformed { aggregation, .. } => {
                RouteKind::AggregatedAndTransformed {
                    aggregation,
                    transformation,
                }
            }
            RouteKind::Proxy | RouteKind::Transformed { .. } => RouteKind::Transformed { transformation },
        };
        self
    }

    pub fn aggregation(&self) -> Option<&AggregationConfig> {
        match &self.kind {
            RouteKind::Aggregated { aggregation }
            | RouteKind::AggregatedAndTransformed { aggregation, .. } => Some(aggregation),
            _ => None,
        }
    }

    pub fn transformation(&self) -> Option<&TransformationConfig> {
        match &self.kind {
            RouteKind::Transformed { transformation }
            | RouteKind::AggregatedAndTransformed { transformation, .. } => Some(transformation),
            _ => None,
        }
    }

    /// Path sent upstream for an inbound path
    pub fn upstream_path<'a>(&'a self, inbound_path: &'a str) -> &'a str {
        self.target_path.as_deref().unwrap_or(inbound_path)
    }

    pub fn is_cacheable(&self) -> bool {
        self.cache_ttl_seconds > 0
    }
}

/// Exact-match route table
#[derive(Default)]
pub struct RouteTable {
    routes: RwLock<HashMap<RouteKey, Arc<RouteConfig>>>,
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a route, returning the config it replaced
    pub fn register(&self, config: RouteConfig) -> Option<Arc<RouteConfig>> {
        let key = config.key.clone();
        let previous = self.routes.write().insert(key.clone(), Arc::new(config));

        if previous.is_some() {
            info!(route = %key, "Replaced existing route");
        } else {
            info!(route = %key, "Registered route");
        }
        previous
    }

    /// Find the route for an exact (method, path) pair
    pub fn match_route(&self, method: &Method, path: &str) -> GatewayResult<Arc<RouteConfig>> {
        let key = RouteKey::new(method.clone(), path);
        match self.routes.read().get(&key) {
            Some(config) => {
                debug!(route = %key, service = %config.target_service, "Route matched");
                Ok(Arc::clone(config))
            }
            None => Err(GatewayError::RouteNotFound {
                method: method.to_string(),
                path: path.to_string(),
            }),
        }
    }

    /// All routes sorted by their `METHOD:/path` key
    pub fn list(&self) -> Vec<Arc<RouteConfig>> {
        let mut routes: Vec<_> = self.routes.read().values().cloned().collect();
        routes.sort_by_cached_key(|route| route.key.to_string());
        routes
    }

    pub fn len(&self) -> usize {
        self.routes.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.read().is_empty()
    }
}
