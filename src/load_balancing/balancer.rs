//! # Load Balancer Module
//!
//! Selects one healthy endpoint per service name using round-robin.
//!
//! ## Rust Concepts Explained
//!
//! - `AtomicUsize::fetch_add` is a single read-modify-write, so concurrent selections for
//!   the same service each consume a distinct cursor value
//! - `DashMap` holds one cursor per service without a global lock
//! - The healthy list is a snapshot taken at selection time; the cursor indexes into the
//!   snapshot, never into the live registry
//!
//! ## Algorithm
//!
//! 1. Filter the service's pool to healthy endpoints (registration order)
//! 2. Fail with `ServiceUnavailable` if nothing is left
//! 3. Return `healthy[cursor % healthy.len()]` and advance the cursor by one
//!
//! The cursor is stored unwrapped; the modulo is applied on every read so the rotation
//! adapts when the healthy set grows or shrinks. `priority` is not consulted.

use crate::core::error::{GatewayError, GatewayResult};
use crate::core::types::ServiceEndpoint;
use crate::discovery::ServiceRegistry;
use dashmap::DashMap;
use metrics::counter;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

/// Core trait for endpoint selection strategies
pub trait LoadBalancer: Send + Sync {
    /// Select an endpoint for the given service
    fn select(&self, service_name: &str) -> GatewayResult<ServiceEndpoint>;

    /// Get the algorithm name for metrics and logging
    fn algorithm_name(&self) -> &'static str;

    /// Get current statistics for this load balancer
    fn stats(&self) -> LoadBalancerStats;
}

/// Load balancer statistics for monitoring
#[derive(Debug, Clone, Serialize)]
pub struct LoadBalancerStats {
    pub algorithm: String,
    pub total_selections: u64,
    pub failed_selections: u64,
    /// Raw (unwrapped) cursor value per service
    pub cursors: BTreeMap<String, usize>,
}

/// Round-robin load balancer with one atomic cursor per service
pub struct RoundRobinBalancer {
    registry: Arc<ServiceRegistry>,
    cursors: DashMap<String, AtomicUsize>,
    total_selections: AtomicU64,
    failed_selections: AtomicU64,
}

impl RoundRobinBalancer {
    /// Create a new round-robin load balancer over a registry
    pub fn new(registry: Arc<ServiceRegistry>) -> Self {
        Self {
            registry,
            cursors: DashMap::new(),
            total_selections: AtomicU64::new(0),
            failed_selections: AtomicU64::new(0),
        }
    }

    /// Consume the next cursor value for a service
    fn next_cursor(&self, service_name: &str) -> usize {
        if let Some(cursor) = self.cursors.get(service_name) {
            return cursor.fetch_add(1, Ordering::AcqRel);
        }
        self.cursors
            .entry(service_name.to_string())
            .or_insert_with(|| AtomicUsize::new(0))
            .fetch_add(1, Ordering::AcqRel)
    }

    /// Current raw cursor of a service (0 if never selected)
    pub fn cursor(&self, service_name: &str) -> usize {
        self.cursors
            .get(service_name)
            .map(|c| c.load(Ordering::Acquire))
            .unwrap_or(0)
    }
}

impl LoadBalancer for RoundRobinBalancer {
    fn select(&self, service_name: &str) -> GatewayResult<ServiceEndpoint> {
        let healthy = self.registry.healthy_endpoints(service_name);

        if healthy.is_empty() {
            self.failed_selections.fetch_add(1, Ordering::Relaxed);
            counter!("load_balancer_failed_selections", "service" => service_name.to_string())
                .increment(1);

            let reason = if self.registry.contains(service_name) {
                "no healthy endpoints"
            } else {
                "no endpoints registered"
            };
            warn!(service = service_name, reason, "Endpoint selection failed");
            return Err(GatewayError::service_unavailable(service_name, reason));
        }

        let cursor = self.next_cursor(service_name);
        let selected = healthy[cursor % healthy.len()].clone();

        self.total_selections.fetch_add(1, Ordering::Relaxed);
        counter!("load_balancer_selections", "service" => service_name.to_string()).increment(1);

        debug!(
            service = service_name,
            location = %selected.location,
            cursor,
            pool_size = healthy.len(),
            algorithm = "round_robin",
            "Selected endpoint"
        );

        Ok(selected)
    }

    fn algorithm_name(&self) -> &'static str {
        "round_robin"
    }

    fn stats(&self) -> LoadBalancerStats {
        LoadBalancerStats {
            algorithm: self.algorithm_name().to_string(),
            total_selections: self.total_selections.load(Ordering::Relaxed),
            failed_selections: self.failed_selections.load(Ordering::Relaxed),
            cursors: self
                .cursors
                .iter()
                .map(|entry| (entry.key().clone(), entry.value().load(Ordering::Relaxed)))
                .collect(),
        }
    }
}
