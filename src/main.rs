//! # Travel Gateway - Main Entry Point
//!
//! Loads the YAML configuration (`GATEWAY_CONFIG_PATH`, default `config/gateway.yaml`),
//! installs logging and the optional Prometheus exporter, registers the configured
//! services and routes, then serves HTTP until Ctrl-C.

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use metrics_exporter_prometheus::PrometheusBuilder;
use tracing::{error, info, warn};

use travel_gateway::caching::{CacheKeyGenerator, CacheStore, InMemoryCache, RedisCache};
use travel_gateway::core::config::CacheBackend;
use travel_gateway::gateway::serve;
use travel_gateway::observability::init_logging;
use travel_gateway::{Gateway, GatewayConfig, GatewayError, GatewayResult, HttpInvoker};

#[tokio::main]
async fn main() -> GatewayResult<()> {
    let config = load_config().await?;
    init_logging(&config.logging);

    info!(version = env!("CARGO_PKG_VERSION"), "Starting travel gateway");

    if config.metrics.prometheus_enabled {
        install_prometheus(&config.metrics.listen_address)?;
    }

    let gateway = match build_gateway(&config).await {
        Ok(gateway) => Arc::new(gateway),
        Err(e) => {
            error!(error = %e, "Failed to start gateway");
            return Err(e);
        }
    };

    serve(gateway, &config.server).await?;
    info!("Travel gateway shutdown complete");
    Ok(())
}

/// Load the config file, or defaults plus env overrides when the file does not exist
async fn load_config() -> GatewayResult<GatewayConfig> {
    let path = std::env::var("GATEWAY_CONFIG_PATH").unwrap_or_else(|_| "config/gateway.yaml".to_string());

    if Path::new(&path).exists() {
        return GatewayConfig::load_from_file(&path).await;
    }

    // Logging is not up yet
    eprintln!("config file {} not found, using defaults", path);
    let mut config = GatewayConfig::default();
    config.apply_env_overrides()?;
    config.validate()?;
    Ok(config)
}

fn install_prometheus(listen_address: &str) -> GatewayResult<()> {
    let addr: SocketAddr = listen_address
        .parse()
        .map_err(|e| GatewayError::config(format!("Invalid metrics listen address: {}", e)))?;

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| GatewayError::internal(format!("Failed to install Prometheus exporter: {}", e)))?;

    info!(address = %addr, "Prometheus exporter listening");
    Ok(())
}

async fn build_gateway(config: &GatewayConfig) -> GatewayResult<Gateway> {
    let invoker = HttpInvoker::new()
        .map_err(|e| GatewayError::internal(format!("Failed to build HTTP client: {}", e)))?;

    let cache: Arc<dyn CacheStore> = match config.cache.backend {
        CacheBackend::Memory => Arc::new(InMemoryCache::new(config.cache.max_entries)),
        CacheBackend::Redis => {
            let url = config
                .cache
                .redis_url
                .as_deref()
                .ok_or_else(|| GatewayError::config("cache.redis_url is required for the redis backend"))?;
            let redis = RedisCache::connect(url).await.map_err(|e| GatewayError::Cache {
                message: e.to_string(),
            })?;
            Arc::new(redis)
        }
    };

    let gateway = Gateway::builder()
        .invoker(Arc::new(invoker))
        .cache(cache)
        .circuit_breaker(config.circuit_breaker.clone())
        .key_generator(
            CacheKeyGenerator::new()
                .with_prefix(config.cache.key_prefix.clone())
                .with_max_length(config.cache.max_key_length),
        )
        .build();

    for endpoint in &config.services {
        gateway.register_service(endpoint.clone());
    }
    for definition in &config.routes {
        let route = definition.clone().into_route_config();
        if gateway.register_route(route)?.is_some() {
            warn!(route = %format!("{} {}", definition.method, definition.path), "Duplicate route in config, last one wins");
        }
    }

    info!(
        services = config.services.len(),
        routes = gateway.list_routes().len(),
        cache = ?config.cache.backend,
        "Gateway initialized"
    );
    Ok(gateway)
}
