//! # HTTP Server
//!
//! Exposes the gateway over HTTP with axum:
//!
//! - every request outside `/admin` is turned into an [`InboundRequest`] and handed to
//!   [`Gateway::handle`]; the caller identity comes from the `x-user-id` header that the
//!   upstream auth middleware sets
//! - `/admin` (when enabled) exposes registration, health flags and statistics
//!
//! Gateway errors render as `{kind, message}` with the status from
//! [`GatewayError::status_code`].

use super::context::Gateway;
use crate::core::config::{RouteDefinition, ServerConfig};
use crate::core::error::{GatewayError, GatewayResult};
use crate::core::types::{CallerIdentity, InboundRequest, ServiceEndpoint};
use crate::routing::RouteConfig;
use axum::{
    extract::{DefaultBodyLimit, Path, Request, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, put},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, instrument, warn};

/// Header carrying the authenticated principal id
pub const CALLER_HEADER: &str = "x-user-id";

/// Shared state of every handler
#[derive(Clone)]
pub struct ServerState {
    pub gateway: Arc<Gateway>,
    pub max_body_size: usize,
}

/// Build the axum application
pub fn router(gateway: Arc<Gateway>, config: &ServerConfig) -> Router {
    let state = ServerState {
        gateway,
        max_body_size: config.max_body_size,
    };

    let mut app = Router::new();
    if config.admin_enabled {
        app = app.nest("/admin", admin_routes());
    }

    app.fallback(handle_request)
        .layer(DefaultBodyLimit::max(config.max_body_size))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn admin_routes() -> Router<ServerState> {
    Router::new()
        .route("/health", get(health_check))
        .route("/services", get(list_services).post(register_service))
        .route("/services/:service/health", put(set_endpoint_health))
        .route("/routes", get(list_routes).post(register_route))
        .route("/stats", get(get_stats).delete(reset_stats))
        .route("/load-balancer", get(balancer_stats))
}

/// Bind `config.bind_address` and serve until Ctrl-C
pub async fn serve(gateway: Arc<Gateway>, config: &ServerConfig) -> GatewayResult<()> {
    let listener = TcpListener::bind(&config.bind_address).await.map_err(|e| {
        GatewayError::internal(format!(
            "Failed to bind gateway server to {}: {}",
            config.bind_address, e
        ))
    })?;

    info!(address = %config.bind_address, admin = config.admin_enabled, "Gateway HTTP server listening");

    axum::serve(listener, router(gateway, config))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| GatewayError::internal(format!("Gateway server error: {}", e)))
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = %err, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

/// Main request handler for everything outside `/admin`
#[instrument(skip(state, request), fields(method = %request.method(), path = %request.uri().path()))]
async fn handle_request(State(state): State<ServerState>, request: Request) -> Response {
    let (parts, body) = request.into_parts();

    let body_bytes = match axum::body::to_bytes(body, state.max_body_size).await {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!(error = %e, "Failed to read request body");
            return GatewayError::invalid_request("failed to read request body").into_response();
        }
    };

    let body = if body_bytes.is_empty() {
        serde_json::Value::Null
    } else {
        match serde_json::from_slice(&body_bytes) {
            Ok(value) => value,
            Err(e) => {
                return GatewayError::invalid_request(format!("body is not valid JSON: {}", e))
                    .into_response()
            }
        }
    };

    let query: HashMap<String, String> = parts
        .uri
        .query()
        .map(|q| url::form_urlencoded::parse(q.as_bytes()).into_owned().collect())
        .unwrap_or_default();

    let mut inbound = InboundRequest::new(parts.method, parts.uri.path())
        .with_query(query)
        .with_body(body);
    for (name, value) in &parts.headers {
        if let Ok(value) = value.to_str() {
            inbound = inbound.with_header(name.as_str(), value);
        }
    }
    let caller = CallerIdentity::from_optional(inbound.header(CALLER_HEADER));
    inbound = inbound.with_caller(caller);

    debug!(request_id = %inbound.id, caller = %inbound.caller, "Processing incoming request");

    match state.gateway.handle(inbound).await {
        Ok(payload) => (StatusCode::OK, Json(payload)).into_response(),
        Err(err) => err.into_response(),
    }
}

async fn health_check() -> impl IntoResponse {
    Json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn list_services(State(state): State<ServerState>) -> impl IntoResponse {
    Json(state.gateway.list_services())
}

async fn register_service(
    State(state): State<ServerState>,
    Json(endpoint): Json<ServiceEndpoint>,
) -> Result<impl IntoResponse, GatewayError> {
    if endpoint.service_name.is_empty() || endpoint.location.is_empty() {
        return Err(GatewayError::invalid_request("service_name and location are required"));
    }
    state.gateway.register_service(endpoint.clone());
    Ok((StatusCode::CREATED, Json(endpoint)))
}

#[derive(Debug, Deserialize)]
struct HealthUpdate {
    location: String,
    healthy: bool,
}

async fn set_endpoint_health(
    State(state): State<ServerState>,
    Path(service): Path<String>,
    Json(update): Json<HealthUpdate>,
) -> Result<impl IntoResponse, GatewayError> {
    let updated = state
        .gateway
        .set_endpoint_health(&service, &update.location, update.healthy)?;
    Ok(Json(json!({
        "service": service,
        "location": update.location,
        "healthy": update.healthy,
        "updated": updated,
    })))
}

async fn list_routes(State(state): State<ServerState>) -> impl IntoResponse {
    let routes: Vec<RouteConfig> = state
        .gateway
        .list_routes()
        .iter()
        .map(|route| route.as_ref().clone())
        .collect();
    Json(routes)
}

async fn register_route(
    State(state): State<ServerState>,
    Json(definition): Json<RouteDefinition>,
) -> Result<impl IntoResponse, GatewayError> {
    let route = definition.into_route_config();
    let key = route.key.to_string();
    let replaced = state.gateway.register_route(route)?.is_some();
    Ok((StatusCode::CREATED, Json(json!({ "route": key, "replaced": replaced }))))
}

async fn get_stats(State(state): State<ServerState>) -> impl IntoResponse {
    Json(state.gateway.stats())
}

async fn reset_stats(State(state): State<ServerState>) -> impl IntoResponse {
    state.gateway.reset_stats();
    StatusCode::NO_CONTENT
}

async fn balancer_stats(State(state): State<ServerState>) -> impl IntoResponse {
    Json(state.gateway.balancer_stats())
}
