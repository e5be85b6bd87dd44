//! # Travel Gateway Library
//!
//! Routing and composition gateway in front of the travel booking backend's services
//! (search, booking, user, auth). It matches requests to routes, dispatches them
//! round-robin across endpoint pools, fans out to several services when a route
//! aggregates, reshapes payloads, caches responses and keeps per-route and
//! per-service statistics.
//!
//! ## Request flow
//!
//! ```text
//! inbound request -> route table -> cache lookup -> aggregator | proxy call
//!                 -> response transformation -> cache write -> statistics
//! ```
//!
//! All shared state lives in one [`Gateway`] value built with [`Gateway::builder`];
//! there are no process-wide singletons.

/// Error types, configuration, shared data structures and the circuit breaker
pub mod core;

/// Dispatcher, gateway context and HTTP server
pub mod gateway;

/// Round-robin endpoint selection
pub mod load_balancing;

/// Static service registry with manual health flags
pub mod discovery;

/// Exact-match route table
pub mod routing;

/// Request/response reshaping rules
pub mod transformation;

/// Multi-service fan-out
pub mod aggregation;

/// Response cache stores and key generation
pub mod caching;

/// Downstream invocation: local handlers and HTTP
pub mod upstream;

/// Statistics and logging
pub mod observability;

pub use core::config::GatewayConfig;
pub use core::error::{GatewayError, GatewayResult};
pub use core::types::{CallerIdentity, InboundRequest, RouteKey, ServiceEndpoint};

pub use aggregation::{AggregationConfig, AggregationStrategy, SubCall};
pub use gateway::{Gateway, GatewayBuilder};
pub use observability::StatsSnapshot;
pub use routing::{RouteConfig, RouteKind};
pub use transformation::{RequestTransformation, ResponseTransformation, TransformationConfig};
pub use upstream::{HttpInvoker, LocalCall, LocalInvoker, UpstreamInvoker};
