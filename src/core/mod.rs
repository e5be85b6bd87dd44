//! Core building blocks shared by every gateway component.

pub mod circuit_breaker;
pub mod config;
pub mod error;
pub mod types;

pub use config::GatewayConfig;
pub use error::{GatewayError, GatewayResult};
pub use types::{CallerIdentity, InboundRequest, RouteKey, ServiceEndpoint};
