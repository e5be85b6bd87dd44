//! # Proxy Call Primitive
//!
//! The single-call dispatch used by plain proxy routes and by every aggregation
//! sub-call: select an endpoint through the load balancer, check the service's circuit
//! breaker, invoke under a time limit and retry retryable failures.
//!
//! ## Policy
//!
//! - Time limit per attempt: the route override if given, else the endpoint's
//!   `timeout_ms`; `0` means no limit
//! - Retries: up to `retry_budget` of the first selected endpoint, each retry goes back
//!   through the load balancer so it usually lands on another endpoint; only methods
//!   that are safe to repeat (GET, HEAD, PUT, DELETE, OPTIONS, TRACE) are retried
//! - Only `Upstream` and `Timeout` failures are retried and count against the breaker;
//!   a 4xx answer (other than 408/429) is `UpstreamRejected` and passed straight back
//! - Once the breaker opens during a call's own retries, the call stops and reports the
//!   last upstream failure
//! - `per_service.requests` is counted once per logical call, `errors` once per failed call

use super::{UpstreamError, UpstreamInvoker};
use crate::core::circuit_breaker::CircuitBreakerRegistry;
use crate::core::error::{GatewayError, GatewayResult};
use crate::core::types::ServiceEndpoint;
use crate::load_balancing::LoadBalancer;
use crate::observability::StatsCollector;
use axum::http::Method;
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Load-balanced, breaker-guarded upstream caller
pub struct ProxyClient {
    balancer: Arc<dyn LoadBalancer>,
    invoker: Arc<dyn UpstreamInvoker>,
    breakers: Arc<CircuitBreakerRegistry>,
    stats: Arc<StatsCollector>,
}

impl ProxyClient {
    pub fn new(
        balancer: Arc<dyn LoadBalancer>,
        invoker: Arc<dyn UpstreamInvoker>,
        breakers: Arc<CircuitBreakerRegistry>,
        stats: Arc<StatsCollector>,
    ) -> Self {
        Self {
            balancer,
            invoker,
            breakers,
            stats,
        }
    }

    /// Call `service` once, including retries
    pub async fn call(
        &self,
        service: &str,
        target_path: &str,
        method: &Method,
        query: &HashMap<String, String>,
        body: &JsonValue,
        timeout_override_ms: Option<u64>,
    ) -> GatewayResult<JsonValue> {
        self.stats.record_service_request(service);
        let breaker = self.breakers.for_service(service);
        let repeatable = is_repeatable(method);

        let mut retries_used = 0u32;
        let mut retry_budget: Option<u32> = None;
        let mut last_error: Option<GatewayError> = None;

        loop {
            let selected = if breaker.try_acquire() {
                self.balancer.select(service)
            } else {
                Err(GatewayError::CircuitOpen {
                    service: service.to_string(),
                })
            };

            let endpoint = match selected {
                Ok(endpoint) => endpoint,
                Err(err) => {
                    // A retry that cannot start reports the failure that caused it
                    let err = last_error.take().unwrap_or(err);
                    self.stats.record_service_error(service, err.kind());
                    return Err(err);
                }
            };
            let budget = *retry_budget.get_or_insert(if repeatable { endpoint.retry_budget } else { 0 });
            let timeout_ms = timeout_override_ms.unwrap_or(endpoint.timeout_ms);

            match self
                .attempt(&endpoint, target_path, method, query, body, timeout_ms)
                .await
            {
                Ok(value) => {
                    breaker.record_success();
                    debug!(service, endpoint = %endpoint.location, retries_used, "Upstream call succeeded");
                    return Ok(value);
                }
                Err(err) => {
                    let mut tripped = false;
                    if err.should_trigger_circuit_breaker() {
                        tripped = breaker.record_failure();
                        if tripped {
                            self.stats.record_circuit_trip(service);
                        }
                    } else if matches!(err, GatewayError::UpstreamRejected { .. }) {
                        // The service answered; the request was at fault
                        breaker.record_success();
                    }

                    if !tripped && err.is_retryable() && retries_used < budget {
                        retries_used += 1;
                        warn!(
                            service,
                            endpoint = %endpoint.location,
                            error = %err,
                            retry = retries_used,
                            budget,
                            "Retrying upstream call"
                        );
                        last_error = Some(err);
                        continue;
                    }

                    warn!(service, endpoint = %endpoint.location, error = %err, "Upstream call failed");
                    self.stats.record_service_error(service, err.kind());
                    return Err(err);
                }
            }
        }
    }

    async fn attempt(
        &self,
        endpoint: &ServiceEndpoint,
        target_path: &str,
        method: &Method,
        query: &HashMap<String, String>,
        body: &JsonValue,
        timeout_ms: u64,
    ) -> GatewayResult<JsonValue> {
        let invocation = self
            .invoker
            .invoke(endpoint, target_path, method, query, body);

        let result = if timeout_ms == 0 {
            invocation.await
        } else {
            match tokio::time::timeout(Duration::from_millis(timeout_ms), invocation).await {
                Ok(result) => result,
                Err(_) => {
                    return Err(GatewayError::Timeout {
                        service: endpoint.service_name.clone(),
                        timeout_ms,
                    })
                }
            }
        };

        result.map_err(|e| match e {
            UpstreamError::Status { status, body } if is_client_error(status) => {
                GatewayError::UpstreamRejected {
                    service: endpoint.service_name.clone(),
                    status,
                    message: body,
                }
            }
            other => GatewayError::upstream(&endpoint.service_name, other.to_string()),
        })
    }
}

/// Methods that may be sent again without changing the outcome
fn is_repeatable(method: &Method) -> bool {
    matches!(
        *method,
        Method::GET | Method::HEAD | Method::PUT | Method::DELETE | Method::OPTIONS | Method::TRACE
    )
}

/// 4xx answers except the transient 408 and 429
fn is_client_error(status: u16) -> bool {
    (400..500).contains(&status) && status != 408 && status != 429
}
