//! # Configuration Module
//!
//! File-based bootstrap configuration. The gateway core itself is programmatic; the
//! binary loads a [`GatewayConfig`] and turns its `services` and `routes` into
//! registration calls.
//!
//! ## Key Features
//! - YAML parsing with serde, durations in humantime form (`30s`, `1m`)
//! - Environment variable overrides of the form `GATEWAY_<SECTION>_<FIELD>`
//! - Validation that collects every problem before failing

use crate::aggregation::AggregationConfig;
use crate::caching::key_generator::{DEFAULT_KEY_PREFIX, DEFAULT_MAX_KEY_LENGTH};
use crate::core::circuit_breaker::CircuitBreakerConfig;
use crate::core::error::{GatewayError, GatewayResult};
use crate::core::types::{method_serde, ServiceEndpoint};
use crate::observability::logging::{LogFormat, LoggingConfig};
use crate::routing::{RouteConfig, MAX_CACHE_TTL_SECONDS};
use crate::transformation::TransformationConfig;
use axum::http::Method;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;
use url::Url;

/// Main gateway configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    pub server: ServerConfig,
    pub cache: CacheConfig,
    pub circuit_breaker: CircuitBreakerConfig,
    pub logging: LoggingConfig,
    pub metrics: MetricsConfig,

    /// Endpoints registered at bootstrap, in order
    pub services: Vec<ServiceEndpoint>,

    /// Routes registered at bootstrap, in order (later duplicates win)
    pub routes: Vec<RouteDefinition>,
}

/// HTTP listener settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_address: String,

    /// Mount the `/admin` registration and stats routes
    pub admin_enabled: bool,

    /// Maximum inbound body size in bytes
    pub max_body_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            admin_enabled: true,
            max_body_size: 1024 * 1024,
        }
    }
}

/// Cache backend selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackend {
    #[default]
    Memory,
    Redis,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub backend: CacheBackend,

    /// Required when `backend` is `redis`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redis_url: Option<String>,

    pub key_prefix: String,

    /// Capacity of the in-memory backend
    pub max_entries: usize,

    /// Keys longer than this are replaced by their SHA-256 digest
    pub max_key_length: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            backend: CacheBackend::Memory,
            redis_url: None,
            key_prefix: DEFAULT_KEY_PREFIX.to_string(),
            max_entries: 10_000,
            max_key_length: DEFAULT_MAX_KEY_LENGTH,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Install the Prometheus exporter at startup
    pub prometheus_enabled: bool,
    pub listen_address: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            prometheus_enabled: false,
            listen_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Route as written in the configuration file
///
/// Optional sections are flattened here and folded into a [`RouteConfig`] kind by
/// [`RouteDefinition::into_route_config`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteDefinition {
    #[serde(with = "method_serde")]
    pub method: Method,
    pub path: String,
    pub target_service: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_path: Option<String>,

    #[serde(default)]
    pub cache_ttl_seconds: u64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms_override: Option<u64>,

    #[serde(default)]
    pub requires_auth: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aggregation: Option<AggregationConfig>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transformation: Option<TransformationConfig>,
}

impl RouteDefinition {
    pub fn into_route_config(self) -> RouteConfig {
        let mut route = RouteConfig::proxy(self.method, self.path, self.target_service)
            .with_cache_ttl(self.cache_ttl_seconds)
            .with_requires_auth(self.requires_auth);

        if let Some(target_path) = self.target_path {
            route = route.with_target_path(target_path);
        }
        if let Some(timeout_ms) = self.timeout_ms_override {
            route = route.with_timeout_ms(timeout_ms);
        }
        if let Some(aggregation) = self.aggregation {
            route = route.with_aggregation(aggregation);
        }
        if let Some(transformation) = self.transformation {
            route = route.with_transformation(transformation);
        }
        route
    }
}

impl GatewayConfig {
    /// Load configuration from a YAML file, apply env overrides and validate
    pub async fn load_from_file<P: AsRef<Path>>(path: P) -> GatewayResult<Self> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| GatewayError::config(format!("Failed to read config file: {}", e)))?;

        let mut config = Self::from_yaml_str(&content)?;
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Parse YAML without overrides or validation
    pub fn from_yaml_str(content: &str) -> GatewayResult<Self> {
        serde_yaml::from_str(content)
            .map_err(|e| GatewayError::config(format!("Failed to parse config: {}", e)))
    }

    /// Apply environment variable overrides to configuration
    pub fn apply_env_overrides(&mut self) -> GatewayResult<()> {
        use std::env;

        if let Ok(addr) = env::var("GATEWAY_SERVER_BIND_ADDRESS") {
            self.server.bind_address = addr;
        }

        if let Ok(size) = env::var("GATEWAY_SERVER_MAX_BODY_SIZE") {
            self.server.max_body_size = size.parse().map_err(|e| {
                GatewayError::config(format!("Invalid GATEWAY_SERVER_MAX_BODY_SIZE: {}", e))
            })?;
        }

        if let Ok(level) = env::var("GATEWAY_LOG_LEVEL") {
            self.logging.level = level;
        }

        if let Ok(format) = env::var("GATEWAY_LOG_FORMAT") {
            self.logging.format = match format.to_lowercase().as_str() {
                "json" => LogFormat::Json,
                "text" => LogFormat::Text,
                other => {
                    return Err(GatewayError::config(format!(
                        "Invalid GATEWAY_LOG_FORMAT: {}",
                        other
                    )))
                }
            };
        }

        if let Ok(url) = env::var("GATEWAY_CACHE_REDIS_URL") {
            self.cache.redis_url = Some(url);
        }

        if let Ok(duration) = env::var("GATEWAY_CIRCUIT_BREAKER_OPEN_DURATION") {
            self.circuit_breaker.open_duration = humantime::parse_duration(&duration).map_err(|e| {
                GatewayError::config(format!("Invalid GATEWAY_CIRCUIT_BREAKER_OPEN_DURATION: {}", e))
            })?;
        }

        Ok(())
    }

    /// Validate the whole configuration, reporting every problem at once
    pub fn validate(&self) -> GatewayResult<()> {
        let mut errors = Vec::new();

        if self.server.bind_address.parse::<SocketAddr>().is_err() {
            errors.push(format!(
                "bind_address '{}' is not a valid socket address",
                self.server.bind_address
            ));
        }
        if self.server.max_body_size == 0 {
            errors.push("max_body_size must be greater than 0".to_string());
        }

        if self.cache.backend == CacheBackend::Redis {
            match self.cache.redis_url.as_deref() {
                None | Some("") => errors.push("cache.redis_url is required for the redis backend".to_string()),
                Some(url) => match Url::parse(url) {
                    Ok(parsed) if matches!(parsed.scheme(), "redis" | "rediss") => {}
                    _ => errors.push(format!("cache.redis_url '{}' is not a redis:// URL", url)),
                },
            }
        }
        if self.cache.key_prefix.is_empty() {
            errors.push("cache.key_prefix cannot be empty".to_string());
        }
        // room for "{prefix}:sha256:{64 hex chars}"
        let hashed_len = self.cache.key_prefix.len() + ":sha256:".len() + 64;
        if self.cache.max_key_length < hashed_len {
            errors.push(format!(
                "cache.max_key_length must be at least {} for prefix '{}'",
                hashed_len, self.cache.key_prefix
            ));
        }
        if self.cache.max_entries == 0 {
            errors.push("cache.max_entries must be greater than 0".to_string());
        }

        if self.circuit_breaker.enabled {
            if self.circuit_breaker.failure_threshold == 0 {
                errors.push("circuit_breaker.failure_threshold must be greater than 0".to_string());
            }
            if self.circuit_breaker.success_threshold == 0 {
                errors.push("circuit_breaker.success_threshold must be greater than 0".to_string());
            }
        }

        if self.metrics.prometheus_enabled && self.metrics.listen_address.parse::<SocketAddr>().is_err() {
            errors.push(format!(
                "metrics.listen_address '{}' is not a valid socket address",
                self.metrics.listen_address
            ));
        }

        for (index, service) in self.services.iter().enumerate() {
            if service.service_name.is_empty() {
                errors.push(format!("Service {} has empty service_name", index));
            }
            if service.location.is_empty() {
                errors.push(format!("Service '{}' has empty location", service.service_name));
            }
        }

        for (index, route) in self.routes.iter().enumerate() {
            if !route.path.starts_with('/') {
                errors.push(format!("Route {} path '{}' must start with '/'", index, route.path));
            }
            if route.cache_ttl_seconds > MAX_CACHE_TTL_SECONDS {
                errors.push(format!(
                    "Route '{} {}' cache_ttl_seconds {} exceeds the maximum of {}",
                    route.method, route.path, route.cache_ttl_seconds, MAX_CACHE_TTL_SECONDS
                ));
            }
            if route.target_service.is_empty() {
                errors.push(format!("Route '{} {}' has empty target_service", route.method, route.path));
            }

            if let Some(aggregation) = route.aggregation.as_ref().filter(|a| a.enabled) {
                if let Err(err) = aggregation.ensure_supported() {
                    errors.push(format!("Route '{} {}': {}", route.method, route.path, err));
                }
                if aggregation.sub_calls.is_empty() {
                    errors.push(format!(
                        "Route '{} {}' enables aggregation without sub_calls",
                        route.method, route.path
                    ));
                }
            }

            if let Some(transformation) = &route.transformation {
                let checks = [
                    transformation.request.as_ref().map(|r| r.validate()),
                    transformation.response.as_ref().map(|r| r.validate()),
                ];
                for err in checks.into_iter().flatten().filter_map(Result::err) {
                    errors.push(format!("Route '{} {}': {}", route.method, route.path, err));
                }
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(GatewayError::config(errors.join("; ")))
        }
    }
}
