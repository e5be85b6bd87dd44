//! # Dispatcher
//!
//! Orchestrates one inbound request through the fixed pipeline:
//!
//! 1. match the route (unmatched requests only count as `failed`)
//! 2. count the request against totals and its route
//! 3. cacheable routes: look the key up, a hit short-circuits with the stored payload
//! 4. request-side transformation of the body
//! 5. aggregation fan-out, or a single load-balanced proxy call
//! 6. response-side transformation
//! 7. cacheable routes: store the fresh, transformed payload
//! 8. record success or failure and latency
//!
//! Cache failures are logged and absorbed at steps 3 and 7; every other error is
//! returned to the caller after statistics are updated.

use crate::aggregation::Aggregator;
use crate::caching::{CacheError, CacheKeyGenerator, CacheStore};
use crate::core::error::GatewayResult;
use crate::core::types::InboundRequest;
use crate::observability::StatsCollector;
use crate::routing::{RouteConfig, RouteTable};
use crate::upstream::ProxyClient;
use serde_json::Value as JsonValue;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument, warn};

/// Executes inbound requests against the route table
pub struct Dispatcher {
    routes: Arc<RouteTable>,
    proxy: Arc<ProxyClient>,
    aggregator: Aggregator,
    cache: Arc<dyn CacheStore>,
    keys: CacheKeyGenerator,
    stats: Arc<StatsCollector>,
}

impl Dispatcher {
    pub fn new(
        routes: Arc<RouteTable>,
        proxy: Arc<ProxyClient>,
        cache: Arc<dyn CacheStore>,
        keys: CacheKeyGenerator,
        stats: Arc<StatsCollector>,
    ) -> Self {
        Self {
            aggregator: Aggregator::new(Arc::clone(&proxy)),
            routes,
            proxy,
            cache,
            keys,
            stats,
        }
    }

    /// Run one request through the pipeline
    #[instrument(
        name = "dispatch",
        skip(self, request),
        fields(request_id = %request.id, method = %request.method, path = %request.path)
    )]
    pub async fn execute(&self, request: InboundRequest) -> GatewayResult<JsonValue> {
        let route = match self.routes.match_route(&request.method, &request.path) {
            Ok(route) => route,
            Err(err) => {
                self.stats.record_route_not_found();
                warn!(error = %err, "No route matched");
                return Err(err);
            }
        };

        let route_key = route.key.to_string();
        self.stats.record_request(&route_key);
        let started = Instant::now();

        let result = self.run(&route, &route_key, request).await;

        let latency_ms = started.elapsed().as_millis() as u64;
        self.stats.record_completion(&route_key, latency_ms, result.is_ok());

        match &result {
            Ok(_) => info!(route = %route_key, latency_ms, "Request completed"),
            Err(err) => warn!(
                route = %route_key,
                latency_ms,
                kind = err.kind(),
                error = %err,
                "Request failed"
            ),
        }
        result
    }

    async fn run(
        &self,
        route: &RouteConfig,
        route_key: &str,
        mut request: InboundRequest,
    ) -> GatewayResult<JsonValue> {
        let cache_key = route
            .is_cacheable()
            .then(|| self.keys.generate(&route.key, &request.caller, &request.query));

        if let Some(key) = &cache_key {
            if let Some(cached) = self.cache_lookup(key).await {
                self.stats.record_cache_hit(route_key);
                debug!(route = %route_key, "Served from cache");
                return Ok(cached);
            }
        }

        let transformation = route.transformation();
        let mut transformed = false;

        if let Some(rules) = transformation.and_then(|t| t.request.as_ref()) {
            request.body = rules.apply(std::mem::take(&mut request.body))?;
            transformed = true;
        }

        let mut payload = match route.aggregation() {
            Some(aggregation) => {
                let composite = self.aggregator.aggregate(aggregation, &request).await?;
                self.stats.record_aggregated();
                composite
            }
            None => {
                self.proxy
                    .call(
                        &route.target_service,
                        route.upstream_path(&request.path),
                        &request.method,
                        &request.query,
                        &request.body,
                        route.timeout_ms_override,
                    )
                    .await?
            }
        };

        if let Some(rules) = transformation.and_then(|t| t.response.as_ref()) {
            payload = rules.apply(payload)?;
            transformed = true;
        }
        if transformed {
            self.stats.record_transformed();
        }

        if let Some(key) = &cache_key {
            self.cache_store(key, &payload, route.cache_ttl_seconds).await;
        }

        Ok(payload)
    }

    /// Read a cached payload; any failure is a miss
    async fn cache_lookup(&self, key: &str) -> Option<JsonValue> {
        let raw = match self.cache.get(key).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(err) => {
                warn!(key, backend = self.cache.backend(), error = %err, "Cache read failed, treating as miss");
                return None;
            }
        };

        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(err) => {
                warn!(key, error = %err, "Cached payload is not valid JSON, treating as miss");
                None
            }
        }
    }

    /// Write a payload; any failure is a no-op
    async fn cache_store(&self, key: &str, payload: &JsonValue, ttl_seconds: u64) {
        let result: Result<(), CacheError> = async {
            let raw = serde_json::to_string(payload)?;
            self.cache
                .set(key, &raw, Duration::from_secs(ttl_seconds))
                .await
        }
        .await;

        if let Err(err) = result {
            warn!(key, backend = self.cache.backend(), error = %err, "Cache write failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::caching::{CacheResult, InMemoryCache};
    use crate::core::circuit_breaker::CircuitBreakerRegistry;
    use crate::core::error::GatewayError;
    use crate::core::types::ServiceEndpoint;
    use crate::discovery::ServiceRegistry;
    use crate::load_balancing::RoundRobinBalancer;
    use crate::upstream::{LocalCall, LocalInvoker};
    use async_trait::async_trait;
    use axum::http::Method;
    use serde_json::json;

    struct BrokenCache;

    #[async_trait]
    impl CacheStore for BrokenCache {
        async fn get(&self, _key: &str) -> CacheResult<Option<String>> {
            Err(CacheError::Store {
                message: "connection refused".to_string(),
            })
        }

        async fn set(&self, _key: &str, _value: &str, _ttl: Duration) -> CacheResult<()> {
            Err(CacheError::Store {
                message: "connection refused".to_string(),
            })
        }

        fn backend(&self) -> &'static str {
            "broken"
        }
    }

    fn dispatcher(cache: Arc<dyn CacheStore>) -> (Dispatcher, Arc<RouteTable>, Arc<StatsCollector>) {
        let registry = Arc::new(ServiceRegistry::new());
        registry.register(ServiceEndpoint::new("search", "search-1"));

        let invoker = LocalInvoker::new();
        invoker.register("search", |call: LocalCall| async move {
            Ok(json!({"path": call.target_path, "body": call.body}))
        });

        let stats = Arc::new(StatsCollector::new());
        let routes = Arc::new(RouteTable::new());
        let proxy = Arc::new(ProxyClient::new(
            Arc::new(RoundRobinBalancer::new(registry)),
            Arc::new(invoker),
            Arc::new(CircuitBreakerRegistry::default()),
            Arc::clone(&stats),
        ));
        let dispatcher = Dispatcher::new(
            Arc::clone(&routes),
            proxy,
            cache,
            CacheKeyGenerator::new(),
            Arc::clone(&stats),
        );
        (dispatcher, routes, stats)
    }

    #[tokio::test]
    async fn test_unset_target_path_uses_inbound_path() {
        let (dispatcher, routes, _) = dispatcher(Arc::new(InMemoryCache::default()));
        routes.register(RouteConfig::proxy(Method::GET, "/api/hotels", "search"));
        routes.register(
            RouteConfig::proxy(Method::GET, "/api/flights", "search").with_target_path("/internal/flights"),
        );

        let hotels = dispatcher
            .execute(InboundRequest::new(Method::GET, "/api/hotels"))
            .await
            .unwrap();
        assert_eq!(hotels["path"], "/api/hotels");

        let flights = dispatcher
            .execute(InboundRequest::new(Method::GET, "/api/flights"))
            .await
            .unwrap();
        assert_eq!(flights["path"], "/internal/flights");
    }

    #[tokio::test]
    async fn test_broken_cache_never_fails_request() {
        let (dispatcher, routes, stats) = dispatcher(Arc::new(BrokenCache));
        routes.register(RouteConfig::proxy(Method::GET, "/api/hotels", "search").with_cache_ttl(60));

        for _ in 0..2 {
            dispatcher
                .execute(InboundRequest::new(Method::GET, "/api/hotels"))
                .await
                .unwrap();
        }

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.succeeded, 2);
        assert_eq!(snapshot.cache_hits, 0);
        assert_eq!(snapshot.failed, 0);
    }

    #[tokio::test]
    async fn test_route_not_found_counts_failed_only() {
        let (dispatcher, _, stats) = dispatcher(Arc::new(InMemoryCache::default()));
        let err = dispatcher
            .execute(InboundRequest::new(Method::DELETE, "/nothing"))
            .await
            .unwrap_err();

        assert!(matches!(err, GatewayError::RouteNotFound { .. }));
        let snapshot = stats.snapshot();
        assert_eq!(snapshot.failed, 1);
        assert_eq!(snapshot.requests_total, 0);
    }

    #[tokio::test]
    async fn test_request_transformation_reaches_upstream() {
        let (dispatcher, routes, stats) = dispatcher(Arc::new(InMemoryCache::default()));
        let transformation = crate::transformation::TransformationConfig {
            request: Some(crate::transformation::RequestTransformation {
                rename: [("q".to_string(), "query".to_string())].into(),
                ..Default::default()
            }),
            response: None,
        };
        routes.register(
            RouteConfig::proxy(Method::POST, "/api/search", "search").with_transformation(transformation),
        );

        let result = dispatcher
            .execute(InboundRequest::new(Method::POST, "/api/search").with_body(json!({"q": "Rome"})))
            .await
            .unwrap();

        assert_eq!(result["body"], json!({"query": "Rome"}));
        assert_eq!(stats.snapshot().transformed_count, 1);
    }
}
