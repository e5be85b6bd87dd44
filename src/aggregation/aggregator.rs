//! # Aggregator
//!
//! Fans one inbound request out to several logical services and merges the settled
//! outcomes into a single composite payload:
//!
//! ```json
//! { "aggregated": true, "strategy": "parallel", "timestamp": "...",
//!   "hotels": { ... }, "flights": { "error": "..." } }
//! ```
//!
//! Every sub-call goes through the same [`ProxyClient::call`] primitive as a plain proxy
//! route. A failed sub-call becomes an inline `{"error": message}` marker under its output
//! field and never aborts its siblings.
//!
//! ## Strategies
//!
//! - `parallel`: all sub-calls are issued at once and joined with `join_all`, so wall
//!   clock time is bounded by the slowest one
//! - `sequential`: one at a time in declared order, continuing past failures
//! - `waterfall`: reserved name with no defined data-threading contract, always rejected
//!   with [`GatewayError::UnsupportedStrategy`]

use crate::core::error::{GatewayError, GatewayResult};
use crate::core::types::{method_serde, InboundRequest};
use crate::upstream::ProxyClient;
use axum::http::Method;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value as JsonValue};
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

/// How the sub-calls of an aggregated route are executed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregationStrategy {
    #[default]
    Parallel,
    Sequential,
    Waterfall,
}

impl AggregationStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Parallel => "parallel",
            Self::Sequential => "sequential",
            Self::Waterfall => "waterfall",
        }
    }

    pub fn is_supported(&self) -> bool {
        !matches!(self, Self::Waterfall)
    }
}

impl fmt::Display for AggregationStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One downstream call of an aggregated route
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubCall {
    pub service_name: String,
    pub path: String,

    #[serde(with = "method_serde", default = "default_method")]
    pub method: Method,

    /// Key of this call's result in the composite payload, defaults to the service name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_field: Option<String>,
}

fn default_method() -> Method {
    Method::GET
}

impl SubCall {
    pub fn new(service_name: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            path: path.into(),
            method: Method::GET,
            output_field: None,
        }
    }

    pub fn with_method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    pub fn with_output_field(mut self, field: impl Into<String>) -> Self {
        self.output_field = Some(field.into());
        self
    }

    /// Key under which this call's outcome is merged
    pub fn output_key(&self) -> &str {
        self.output_field.as_deref().unwrap_or(&self.service_name)
    }
}

/// Aggregation declared on a route
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregationConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    #[serde(default)]
    pub strategy: AggregationStrategy,

    pub sub_calls: Vec<SubCall>,
}

fn default_enabled() -> bool {
    true
}

impl AggregationConfig {
    pub fn new(strategy: AggregationStrategy, sub_calls: Vec<SubCall>) -> Self {
        Self {
            enabled: true,
            strategy,
            sub_calls,
        }
    }

    /// Fail with `UnsupportedStrategy` for strategies without a defined contract
    pub fn ensure_supported(&self) -> GatewayResult<()> {
        if self.strategy.is_supported() {
            Ok(())
        } else {
            Err(GatewayError::UnsupportedStrategy {
                strategy: self.strategy.to_string(),
            })
        }
    }
}

/// Executes aggregation configs against the proxy primitive
pub struct Aggregator {
    proxy: Arc<ProxyClient>,
}

impl Aggregator {
    pub fn new(proxy: Arc<ProxyClient>) -> Self {
        Self { proxy }
    }

    /// Run every sub-call and merge the outcomes
    ///
    /// Only an unsupported strategy fails the whole aggregation; sub-call failures are
    /// embedded in the result.
    pub async fn aggregate(
        &self,
        config: &AggregationConfig,
        request: &InboundRequest,
    ) -> GatewayResult<JsonValue> {
        let started = Instant::now();

        let outcomes = match config.strategy {
            AggregationStrategy::Parallel => {
                join_all(config.sub_calls.iter().map(|call| self.run(call, request))).await
            }
            AggregationStrategy::Sequential => {
                let mut outcomes = Vec::with_capacity(config.sub_calls.len());
                for call in &config.sub_calls {
                    outcomes.push(self.run(call, request).await);
                }
                outcomes
            }
            AggregationStrategy::Waterfall => {
                return Err(GatewayError::UnsupportedStrategy {
                    strategy: config.strategy.to_string(),
                })
            }
        };

        let mut composite = Map::new();
        composite.insert("aggregated".to_string(), JsonValue::Bool(true));
        composite.insert("strategy".to_string(), json!(config.strategy.as_str()));
        composite.insert("timestamp".to_string(), json!(chrono::Utc::now().to_rfc3339()));

        let mut failures = 0usize;
        for (call, outcome) in config.sub_calls.iter().zip(outcomes) {
            let value = match outcome {
                Ok(value) => value,
                Err(err) => {
                    failures += 1;
                    json!({ "error": err.to_string() })
                }
            };
            composite.insert(call.output_key().to_string(), value);
        }

        debug!(
            request_id = %request.id,
            strategy = %config.strategy,
            sub_calls = config.sub_calls.len(),
            failures,
            latency_ms = started.elapsed().as_millis() as u64,
            "Aggregation completed"
        );

        Ok(JsonValue::Object(composite))
    }

    async fn run(&self, call: &SubCall, request: &InboundRequest) -> GatewayResult<JsonValue> {
        let result = self
            .proxy
            .call(
                &call.service_name,
                &call.path,
                &call.method,
                &request.query,
                &request.body,
                None,
            )
            .await;

        if let Err(err) = &result {
            warn!(
                request_id = %request.id,
                service = %call.service_name,
                output_field = call.output_key(),
                error = %err,
                "Aggregation sub-call failed"
            );
        }
        result
    }
}
