//! # Gateway Context
//!
//! One explicit, instantiable object owning every piece of process-wide gateway state:
//! service registry, route table, round-robin cursors, circuit breakers and statistics.
//! Nothing lives in module-level statics, so tests build a fresh context each and never
//! share state.
//!
//! The context exposes the single inbound boundary ([`Gateway::handle`]) and the
//! admin/registration boundary (services, routes, health flags, statistics).

use super::dispatcher::Dispatcher;
use crate::caching::{CacheKeyGenerator, CacheStore, InMemoryCache};
use crate::core::circuit_breaker::{CircuitBreakerConfig, CircuitBreakerRegistry};
use crate::core::error::{GatewayError, GatewayResult};
use crate::core::types::{InboundRequest, ServiceEndpoint};
use crate::discovery::ServiceRegistry;
use crate::load_balancing::{LoadBalancer, LoadBalancerStats, RoundRobinBalancer};
use crate::observability::{StatsCollector, StatsSnapshot};
use crate::routing::{RouteConfig, RouteTable, MAX_CACHE_TTL_SECONDS};
use crate::upstream::{LocalInvoker, ProxyClient, UpstreamInvoker};
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::info;

/// The gateway: inbound handling plus registration and stats
pub struct Gateway {
    registry: Arc<ServiceRegistry>,
    routes: Arc<RouteTable>,
    balancer: Arc<RoundRobinBalancer>,
    stats: Arc<StatsCollector>,
    dispatcher: Dispatcher,
}

impl Gateway {
    pub fn builder() -> GatewayBuilder {
        GatewayBuilder::default()
    }

    /// Handle one inbound request
    pub async fn handle(&self, request: InboundRequest) -> GatewayResult<JsonValue> {
        self.dispatcher.execute(request).await
    }

    /// Append an endpoint to its service's pool
    pub fn register_service(&self, endpoint: ServiceEndpoint) {
        self.registry.register(endpoint);
    }

    /// Store a route, replacing any previous route with the same key
    ///
    /// Routes declaring an unsupported aggregation strategy or a cache TTL above
    /// [`MAX_CACHE_TTL_SECONDS`] are rejected. Transformation rules are checked when the
    /// route is dispatched.
    pub fn register_route(&self, route: RouteConfig) -> GatewayResult<Option<Arc<RouteConfig>>> {
        if route.cache_ttl_seconds > MAX_CACHE_TTL_SECONDS {
            return Err(GatewayError::invalid_request(format!(
                "cache_ttl_seconds {} exceeds the maximum of {}",
                route.cache_ttl_seconds, MAX_CACHE_TTL_SECONDS
            )));
        }
        if let Some(aggregation) = route.aggregation() {
            aggregation.ensure_supported()?;
        }
        Ok(self.routes.register(route))
    }

    /// Flip the manual health flag of every endpoint of `service` at `location`
    pub fn set_endpoint_health(&self, service: &str, location: &str, healthy: bool) -> GatewayResult<usize> {
        let updated = self.registry.set_health(service, location, healthy)?;
        info!(service, location, healthy, updated, "Endpoint health changed");
        Ok(updated)
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    pub fn reset_stats(&self) {
        self.stats.reset();
        info!("Gateway statistics reset");
    }

    pub fn list_services(&self) -> BTreeMap<String, Vec<ServiceEndpoint>> {
        self.registry.list()
    }

    pub fn list_routes(&self) -> Vec<Arc<RouteConfig>> {
        self.routes.list()
    }

    pub fn balancer_stats(&self) -> LoadBalancerStats {
        self.balancer.stats()
    }
}

/// Builder wiring the gateway's collaborators
pub struct GatewayBuilder {
    invoker: Option<Arc<dyn UpstreamInvoker>>,
    cache: Option<Arc<dyn CacheStore>>,
    circuit_breaker: CircuitBreakerConfig,
    key_generator: CacheKeyGenerator,
}

impl Default for GatewayBuilder {
    fn default() -> Self {
        Self {
            invoker: None,
            cache: None,
            circuit_breaker: CircuitBreakerConfig::default(),
            key_generator: CacheKeyGenerator::new(),
        }
    }
}

impl GatewayBuilder {
    /// Downstream invoker, defaults to an empty [`LocalInvoker`]
    pub fn invoker(mut self, invoker: Arc<dyn UpstreamInvoker>) -> Self {
        self.invoker = Some(invoker);
        self
    }

    /// Cache adapter, defaults to an [`InMemoryCache`]
    pub fn cache(mut self, cache: Arc<dyn CacheStore>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn circuit_breaker(mut self, config: CircuitBreakerConfig) -> Self {
        self.circuit_breaker = config;
        self
    }

    pub fn key_generator(mut self, key_generator: CacheKeyGenerator) -> Self {
        self.key_generator = key_generator;
        self
    }

    pub fn build(self) -> Gateway {
        let registry = Arc::new(ServiceRegistry::new());
        let routes = Arc::new(RouteTable::new());
        let stats = Arc::new(StatsCollector::new());
        let balancer = Arc::new(RoundRobinBalancer::new(Arc::clone(&registry)));

        let invoker = self
            .invoker
            .unwrap_or_else(|| Arc::new(LocalInvoker::new()));
        let cache = self
            .cache
            .unwrap_or_else(|| Arc::new(InMemoryCache::default()));

        let proxy = Arc::new(ProxyClient::new(
            Arc::clone(&balancer) as Arc<dyn LoadBalancer>,
            invoker,
            Arc::new(CircuitBreakerRegistry::new(self.circuit_breaker)),
            Arc::clone(&stats),
        ));

        let dispatcher = Dispatcher::new(
            Arc::clone(&routes),
            proxy,
            cache,
            self.key_generator,
            Arc::clone(&stats),
        );

        Gateway {
            registry,
            routes,
            balancer,
            stats,
            dispatcher,
        }
    }
}
