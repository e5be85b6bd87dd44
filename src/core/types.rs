//! # Core Types Module
//!
//! Data structures shared by every gateway component: endpoint descriptors owned by the
//! service registry, the `(method, path)` route key, the caller identity handed over by
//! upstream auth middleware and the inbound request itself.
//!
//! ## Rust Ownership Concepts in This Module
//!
//! - `ServiceEndpoint` is `Clone` so the load balancer can hand out owned snapshots
//!   instead of references into the registry's lock-protected pools
//! - `RouteKey` implements `Hash + Eq` so it can key the route table directly
//! - Request bodies are `serde_json::Value`, the payload currency of the whole pipeline

use axum::http::Method;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt;
use uuid::Uuid;

/// Sentinel used in logs for callers without a principal
pub const ANONYMOUS_IDENTITY: &str = "anonymous";

/// Cache key segment of anonymous callers; principals are always `user:`-prefixed
const ANONYMOUS_CACHE_SEGMENT: &str = "anon";

/// One concrete, health-flagged instance backing a logical service name
///
/// Several endpoints may share a `service_name`; together they form the pool the load
/// balancer rotates through. `priority` is stored and reported but never consulted
/// by selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceEndpoint {
    /// Logical service this endpoint belongs to
    pub service_name: String,

    /// Where the endpoint lives (base URL for HTTP upstreams, a label for local handlers)
    pub location: String,

    /// Deployed version of the service behind this endpoint
    #[serde(default = "default_version")]
    pub version: String,

    /// Manually-set health flag; unhealthy endpoints are filtered, never deleted
    #[serde(default = "default_healthy")]
    pub healthy: bool,

    #[serde(default)]
    pub priority: i32,

    /// Per-attempt time limit in milliseconds, 0 disables the limit
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Extra attempts allowed after a failed call
    #[serde(default)]
    pub retry_budget: u32,
}

fn default_version() -> String {
    "1.0.0".to_string()
}

fn default_healthy() -> bool {
    true
}

fn default_timeout_ms() -> u64 {
    30_000
}

impl ServiceEndpoint {
    /// Create a healthy endpoint with default version, timeout and no retries
    pub fn new(service_name: impl Into<String>, location: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            location: location.into(),
            version: default_version(),
            healthy: true,
            priority: 0,
            timeout_ms: default_timeout_ms(),
            retry_budget: 0,
        }
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    pub fn with_health(mut self, healthy: bool) -> Self {
        self.healthy = healthy;
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    pub fn with_retry_budget(mut self, retry_budget: u32) -> Self {
        self.retry_budget = retry_budget;
        self
    }
}

/// Unique key of a route table entry
///
/// Matching is exact: method and path must be byte-for-byte equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RouteKey {
    #[serde(with = "method_serde")]
    pub method: Method,
    pub path: String,
}

impl RouteKey {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
        }
    }
}

impl fmt::Display for RouteKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.method, self.path)
    }
}

/// Identity of the caller, established by auth middleware before the gateway
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum CallerIdentity {
    #[default]
    Anonymous,
    Principal(String),
}

impl CallerIdentity {
    /// Build an identity from an optional principal id, treating blanks as anonymous
    pub fn from_optional(principal: Option<&str>) -> Self {
        match principal.map(str::trim) {
            Some(id) if !id.is_empty() => Self::Principal(id.to_string()),
            _ => Self::Anonymous,
        }
    }

    /// Segment used in cache keys
    ///
    /// Anonymous callers and principals live in disjoint namespaces, so no principal id
    /// (not even `anonymous` or `anon`) can collide with the anonymous segment.
    pub fn cache_segment(&self) -> Cow<'_, str> {
        match self {
            Self::Anonymous => Cow::Borrowed(ANONYMOUS_CACHE_SEGMENT),
            Self::Principal(id) => Cow::Owned(format!("user:{}", id)),
        }
    }
}

impl fmt::Display for CallerIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Anonymous => f.write_str(ANONYMOUS_IDENTITY),
            Self::Principal(id) => f.write_str(id),
        }
    }
}

/// Request as it arrives at the gateway's single inbound boundary
#[derive(Debug, Clone)]
pub struct InboundRequest {
    /// Unique identifier for tracing and logging
    pub id: String,
    pub method: Method,
    pub path: String,
    pub query: HashMap<String, String>,
    /// Header names are stored lowercase
    pub headers: HashMap<String, String>,
    pub body: serde_json::Value,
    pub caller: CallerIdentity,
}

impl InboundRequest {
    /// Create an anonymous request with no query, headers or body
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            method,
            path: path.into(),
            query: HashMap::new(),
            headers: HashMap::new(),
            body: serde_json::Value::Null,
            caller: CallerIdentity::Anonymous,
        }
    }

    pub fn with_query(mut self, query: HashMap<String, String>) -> Self {
        self.query = query;
        self
    }

    pub fn with_query_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.insert(name.into(), value.into());
        self
    }

    pub fn with_header(mut self, name: impl AsRef<str>, value: impl Into<String>) -> Self {
        self.headers
            .insert(name.as_ref().to_ascii_lowercase(), value.into());
        self
    }

    pub fn with_body(mut self, body: serde_json::Value) -> Self {
        self.body = body;
        self
    }

    pub fn with_caller(mut self, caller: CallerIdentity) -> Self {
        self.caller = caller;
        self
    }

    /// Get a header value by (case-insensitive) name
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }
}

/// Serde support for a single HTTP method stored as its string form
pub(crate) mod method_serde {
    use axum::http::Method;
    use serde::{Deserialize, Deserializer, Serializer};
    use std::str::FromStr;

    pub fn serialize<S>(method: &Method, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(method.as_str())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Method, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Method::from_str(&raw.to_ascii_uppercase()).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_route_key_display() {
        let key = RouteKey::new(Method::GET, "/api/hotels");
        assert_eq!(key.to_string(), "GET:/api/hotels");
    }

    #[test]
    fn test_caller_identity_from_optional() {
        assert_eq!(CallerIdentity::from_optional(None), CallerIdentity::Anonymous);
        assert_eq!(CallerIdentity::from_optional(Some("  ")), CallerIdentity::Anonymous);
        assert_eq!(
            CallerIdentity::from_optional(Some("user-42")),
            CallerIdentity::Principal("user-42".to_string())
        );
        assert_eq!(CallerIdentity::Anonymous.to_string(), ANONYMOUS_IDENTITY);
    }

    #[test]
    fn test_principal_named_anonymous_has_own_cache_segment() {
        let impostor = CallerIdentity::Principal(ANONYMOUS_IDENTITY.to_string());
        let squatter = CallerIdentity::Principal(ANONYMOUS_CACHE_SEGMENT.to_string());

        assert_ne!(impostor.cache_segment(), CallerIdentity::Anonymous.cache_segment());
        assert_ne!(squatter.cache_segment(), CallerIdentity::Anonymous.cache_segment());
        assert_eq!(impostor.cache_segment(), "user:anonymous");
    }

    #[test]
    fn test_endpoint_deserialize_defaults() {
        let endpoint: ServiceEndpoint = serde_json::from_value(serde_json::json!({
            "service_name": "search",
            "location": "http://search-1:8080"
        }))
        .unwrap();

        assert!(endpoint.healthy);
        assert_eq!(endpoint.version, "1.0.0");
        assert_eq!(endpoint.timeout_ms, 30_000);
        assert_eq!(endpoint.retry_budget, 0);
    }

    #[test]
    fn test_header_lookup_is_case_insensitive() {
        let request = InboundRequest::new(Method::GET, "/api/flights").with_header("X-Trace", "abc");
        assert_eq!(request.header("x-trace"), Some("abc"));
        assert_eq!(request.header("X-TRACE"), Some("abc"));
    }

    #[test]
    fn test_route_key_serde_roundtrip_uses_method_string() {
        let key = RouteKey::new(Method::POST, "/api/bookings");
        let value = serde_json::to_value(&key).unwrap();
        assert_eq!(value["method"], "POST");
        let parsed: RouteKey = serde_json::from_value(serde_json::json!({"method": "post", "path": "/api/bookings"})).unwrap();
        assert_eq!(parsed, key);
    }
}
