//! # Upstream Invocation
//!
//! The downstream boundary of the gateway: `invoke(endpoint, target_path, method, body)`.
//! The dispatcher and aggregator only ever talk to [`ProxyClient`], which selects an
//! endpoint, guards it with a circuit breaker and hands the call to whichever
//! [`UpstreamInvoker`] the gateway was built with.
//!
//! - [`LocalInvoker`] calls in-process handlers registered per service name
//! - [`HttpInvoker`] forwards the call over HTTP, treating `location` as a base URL

pub mod http;
pub mod local;
pub mod proxy;

use crate::core::types::ServiceEndpoint;
use async_trait::async_trait;
use axum::http::Method;
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use thiserror::Error;

pub use http::HttpInvoker;
pub use local::{LocalCall, LocalInvoker};
pub use proxy::ProxyClient;

/// Failure of a single endpoint invocation
#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("no handler registered for service '{0}'")]
    NoHandler(String),

    #[error("handler failed: {0}")]
    Handler(String),

    #[error("invalid endpoint location '{location}': {reason}")]
    InvalidLocation { location: String, reason: String },

    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("upstream responded with status {status}: {body}")]
    Status { status: u16, body: String },
}

/// Capability to invoke one concrete endpoint
#[async_trait]
pub trait UpstreamInvoker: Send + Sync {
    /// Invoke `endpoint`; `query` holds the inbound query parameters to forward
    async fn invoke(
        &self,
        endpoint: &ServiceEndpoint,
        target_path: &str,
        method: &Method,
        query: &HashMap<String, String>,
        body: &JsonValue,
    ) -> Result<JsonValue, UpstreamError>;
}
