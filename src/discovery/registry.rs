//! # Service Registry
//!
//! Static pool of endpoint descriptors per logical service name. Endpoints are appended
//! in registration order and never removed; health is a manually-set flag and unhealthy
//! endpoints are filtered out at selection time instead of being deleted.
//!
//! Readers always receive owned snapshots so that health flips after a read cannot
//! affect a selection already in progress.

use crate::core::error::{GatewayError, GatewayResult};
use crate::core::types::ServiceEndpoint;
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, info};

/// Registry of endpoint pools keyed by service name
#[derive(Default)]
pub struct ServiceRegistry {
    pools: RwLock<HashMap<String, Vec<ServiceEndpoint>>>,
}

impl ServiceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an endpoint to the pool of its service
    ///
    /// Re-registering the same endpoint does not deduplicate.
    pub fn register(&self, endpoint: ServiceEndpoint) {
        info!(
            service = %endpoint.service_name,
            location = %endpoint.location,
            version = %endpoint.version,
            healthy = endpoint.healthy,
            "Registered service endpoint"
        );
        self.pools
            .write()
            .entry(endpoint.service_name.clone())
            .or_default()
            .push(endpoint);
    }

    /// Snapshot of every endpoint registered for a service, in registration order
    pub fn pool_for(&self, service_name: &str) -> Vec<ServiceEndpoint> {
        self.pools
            .read()
            .get(service_name)
            .cloned()
            .unwrap_or_default()
    }

    /// Snapshot of the healthy endpoints of a service, in registration order
    pub fn healthy_endpoints(&self, service_name: &str) -> Vec<ServiceEndpoint> {
        self.pools
            .read()
            .get(service_name)
            .map(|pool| pool.iter().filter(|e| e.healthy).cloned().collect())
            .unwrap_or_default()
    }

    /// Whether any endpoint (healthy or not) is registered for a service
    pub fn contains(&self, service_name: &str) -> bool {
        self.pools
            .read()
            .get(service_name)
            .is_some_and(|pool| !pool.is_empty())
    }

    /// Set the health flag of every endpoint of `service_name` living at `location`
    ///
    /// Returns the number of endpoints updated.
    pub fn set_health(&self, service_name: &str, location: &str, healthy: bool) -> GatewayResult<usize> {
        let mut pools = self.pools.write();
        let mut updated = 0;
        if let Some(pool) = pools.get_mut(service_name) {
            for endpoint in pool.iter_mut().filter(|e| e.location == location) {
                endpoint.healthy = healthy;
                updated += 1;
            }
        }

        if updated == 0 {
            return Err(GatewayError::EndpointNotFound {
                service: service_name.to_string(),
                location: location.to_string(),
            });
        }

        debug!(service = service_name, location, healthy, updated, "Endpoint health updated");
        Ok(updated)
    }

    /// All pools, sorted by service name
    pub fn list(&self) -> BTreeMap<String, Vec<ServiceEndpoint>> {
        self.pools
            .read()
            .iter()
            .map(|(name, pool)| (name.clone(), pool.clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_preserves_order_and_duplicates() {
        let registry = ServiceRegistry::new();
        registry.register(ServiceEndpoint::new("search", "search-a"));
        registry.register(ServiceEndpoint::new("search", "search-b"));
        registry.register(ServiceEndpoint::new("search", "search-a"));

        let locations: Vec<_> = registry
            .pool_for("search")
            .into_iter()
            .map(|e| e.location)
            .collect();
        assert_eq!(locations, vec!["search-a", "search-b", "search-a"]);
    }

    #[test]
    fn unknown_service_has_empty_pool() {
        let registry = ServiceRegistry::new();
        assert!(registry.pool_for("nope").is_empty());
        assert!(registry.healthy_endpoints("nope").is_empty());
        assert!(!registry.contains("nope"));
    }

    #[test]
    fn healthy_endpoints_filters_unhealthy() {
        let registry = ServiceRegistry::new();
        registry.register(ServiceEndpoint::new("booking", "booking-a"));
        registry.register(ServiceEndpoint::new("booking", "booking-b").with_health(false));

        let healthy = registry.healthy_endpoints("booking");
        assert_eq!(healthy.len(), 1);
        assert_eq!(healthy[0].location, "booking-a");
        assert_eq!(registry.pool_for("booking").len(), 2);
    }

    #[test]
    fn set_health_updates_matching_endpoints() {
        let registry = ServiceRegistry::new();
        registry.register(ServiceEndpoint::new("user", "user-a"));

        assert_eq!(registry.set_health("user", "user-a", false).unwrap(), 1);
        assert!(registry.healthy_endpoints("user").is_empty());

        let err = registry.set_health("user", "user-z", true).unwrap_err();
        assert!(matches!(err, GatewayError::EndpointNotFound { .. }));
    }

    #[test]
    fn list_is_sorted_by_service() {
        let registry = ServiceRegistry::new();
        registry.register(ServiceEndpoint::new("user", "u"));
        registry.register(ServiceEndpoint::new("auth", "a"));

        let names: Vec<_> = registry.list().into_keys().collect();
        assert_eq!(names, vec!["auth", "user"]);
    }
}
