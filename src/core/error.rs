//! # Error Handling Module
//!
//! Every failure the gateway can surface to a caller is a variant of [`GatewayError`].
//! Variants carry plain strings rather than source errors so the type stays `Clone`
//! and can be recorded in statistics, logged and rendered without borrowing issues.
//!
//! ## Propagation policy
//!
//! - `RouteNotFound`, `ServiceUnavailable`, `Transformation` and `UnsupportedStrategy`
//!   always reach the caller as a structured `{kind, message}` body.
//! - `Upstream`, `Timeout` and `CircuitOpen` are terminal for a simple proxy route but are
//!   absorbed into inline error markers inside an aggregation fan-out.
//! - Cache failures never become a `GatewayError` on the request path; see
//!   [`crate::caching::CacheError`].

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

/// Main result type used throughout the gateway
pub type GatewayResult<T> = Result<T, GatewayError>;

/// Errors produced by the gateway core and its admin boundary
#[derive(Debug, Error, Clone, PartialEq)]
pub enum GatewayError {
    /// No route table entry for the (method, path) pair
    #[error("No route for {method} {path}")]
    RouteNotFound { method: String, path: String },

    /// The target service has zero healthy endpoints at selection time
    #[error("Service unavailable: {service} - {reason}")]
    ServiceUnavailable { service: String, reason: String },

    /// The invoked endpoint raised an error
    #[error("Upstream error from {service}: {message}")]
    Upstream { service: String, message: String },

    /// The invoked endpoint refused the request itself (a 4xx answer); the service is healthy
    #[error("Upstream {service} rejected the request with status {status}: {message}")]
    UpstreamRejected {
        service: String,
        status: u16,
        message: String,
    },

    /// The invoked endpoint did not answer within its time limit
    #[error("Upstream {service} timed out after {timeout_ms}ms")]
    Timeout { service: String, timeout_ms: u64 },

    /// The circuit breaker for the service is open
    #[error("Circuit breaker open for service: {service}")]
    CircuitOpen { service: String },

    /// Malformed or conflicting transformation configuration
    #[error("Transformation failed: {reason}")]
    Transformation { reason: String },

    /// Aggregation strategy with no defined merge behaviour
    #[error("Aggregation strategy '{strategy}' is not supported")]
    UnsupportedStrategy { strategy: String },

    /// Admin call referenced an endpoint that is not registered
    #[error("Endpoint {location} is not registered for service {service}")]
    EndpointNotFound { service: String, location: String },

    /// Invalid inbound request (unparseable body, bad method, ...)
    #[error("Invalid request: {reason}")]
    InvalidRequest { reason: String },

    /// Configuration-related errors (invalid config, missing files, etc.)
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// Cache backend could not be constructed
    #[error("Cache error: {message}")]
    Cache { message: String },

    /// Internal server errors for unexpected failures
    #[error("Internal server error: {message}")]
    Internal { message: String },

    /// I/O errors (file operations, listener binding, etc.)
    #[error("I/O error: {message}")]
    Io { message: String },

    /// JSON serialization/deserialization errors
    #[error("JSON error: {message}")]
    Json { message: String },

    /// YAML parsing errors for configuration files
    #[error("YAML error: {message}")]
    Yaml { message: String },
}

impl GatewayError {
    /// Create a configuration error with a custom message
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create a service unavailable error
    pub fn service_unavailable<S: Into<String>, R: Into<String>>(service: S, reason: R) -> Self {
        Self::ServiceUnavailable {
            service: service.into(),
            reason: reason.into(),
        }
    }

    /// Create an upstream error for a service
    pub fn upstream<S: Into<String>, M: Into<String>>(service: S, message: M) -> Self {
        Self::Upstream {
            service: service.into(),
            message: message.into(),
        }
    }

    /// Create a transformation error with a custom reason
    pub fn transformation<S: Into<String>>(reason: S) -> Self {
        Self::Transformation {
            reason: reason.into(),
        }
    }

    /// Create an invalid request error
    pub fn invalid_request<S: Into<String>>(reason: S) -> Self {
        Self::InvalidRequest {
            reason: reason.into(),
        }
    }

    /// Create an internal error with a custom message
    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Get the appropriate HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::RouteNotFound { .. } => StatusCode::NOT_FOUND,
            Self::EndpointNotFound { .. } => StatusCode::NOT_FOUND,
            Self::ServiceUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            Self::CircuitOpen { .. } => StatusCode::SERVICE_UNAVAILABLE,
            Self::Upstream { .. } => StatusCode::BAD_GATEWAY,
            Self::UpstreamRejected { status, .. } => {
                StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY)
            }
            Self::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            Self::InvalidRequest { .. } => StatusCode::BAD_REQUEST,
            Self::Json { .. } => StatusCode::BAD_REQUEST,
            Self::Transformation { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            Self::UnsupportedStrategy { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Configuration { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Cache { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Io { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Yaml { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable machine-readable tag used in error bodies and logs
    pub fn kind(&self) -> &'static str {
        match self {
            Self::RouteNotFound { .. } => "route_not_found",
            Self::ServiceUnavailable { .. } => "service_unavailable",
            Self::Upstream { .. } => "upstream_error",
            Self::UpstreamRejected { .. } => "upstream_rejected",
            Self::Timeout { .. } => "timeout",
            Self::CircuitOpen { .. } => "circuit_open",
            Self::Transformation { .. } => "transformation_error",
            Self::UnsupportedStrategy { .. } => "unsupported_strategy",
            Self::EndpointNotFound { .. } => "endpoint_not_found",
            Self::InvalidRequest { .. } => "invalid_request",
            Self::Configuration { .. } => "configuration_error",
            Self::Cache { .. } => "cache_error",
            Self::Internal { .. } => "internal_error",
            Self::Io { .. } => "io_error",
            Self::Json { .. } => "json_error",
            Self::Yaml { .. } => "yaml_error",
        }
    }

    /// Check if a proxy attempt that failed with this error may be retried
    ///
    /// Only failures of the invoked endpoint itself qualify; selection failures
    /// and open circuits would fail again immediately.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Upstream { .. } | Self::Timeout { .. })
    }

    /// Check if this error should count against the service's circuit breaker
    pub fn should_trigger_circuit_breaker(&self) -> bool {
        matches!(self, Self::Upstream { .. } | Self::Timeout { .. })
    }

    /// Structured `{kind, message}` body returned to callers
    pub fn to_body(&self) -> serde_json::Value {
        json!({
            "kind": self.kind(),
            "message": self.to_string(),
        })
    }
}

impl From<std::io::Error> for GatewayError {
    fn from(err: std::io::Error) -> Self {
        Self::Io {
            message: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for GatewayError {
    fn from(err: serde_json::Error) -> Self {
        Self::Json {
            message: err.to_string(),
        }
    }
}

impl From<serde_yaml::Error> for GatewayError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::Yaml {
            message: err.to_string(),
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        (self.status_code(), Json(self.to_body())).into_response()
    }
}
