//! # HTTP Server Tests
//!
//! Drive the axum application in-process with `tower::ServiceExt::oneshot`: proxy
//! traffic through the fallback handler and the `/admin` surface.

use axum::body::{to_bytes, Body};
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;
use travel_gateway::core::config::ServerConfig;
use travel_gateway::gateway::router;
use travel_gateway::{Gateway, LocalCall, LocalInvoker, RouteConfig, ServiceEndpoint};

fn create_test_app(admin_enabled: bool) -> (Router, Arc<Gateway>) {
    let invoker = LocalInvoker::new();
    invoker.register("search", |call: LocalCall| async move {
        Ok(json!({
            "location": call.endpoint.location,
            "path": call.target_path,
            "method": call.method.as_str(),
            "body": call.body,
        }))
    });
    invoker.register("user", |_call: LocalCall| async move { Err("profile store offline".to_string()) });

    let gateway = Arc::new(Gateway::builder().invoker(Arc::new(invoker)).build());
    gateway.register_service(ServiceEndpoint::new("search", "search-1"));
    gateway.register_service(ServiceEndpoint::new("user", "user-1"));
    gateway
        .register_route(RouteConfig::proxy(Method::GET, "/api/hotels", "search").with_target_path("/hotels"))
        .unwrap();
    gateway
        .register_route(RouteConfig::proxy(Method::POST, "/api/search", "search"))
        .unwrap();
    gateway
        .register_route(RouteConfig::proxy(Method::GET, "/api/me", "user").with_cache_ttl(30))
        .unwrap();

    let config = ServerConfig {
        admin_enabled,
        ..ServerConfig::default()
    };
    (router(Arc::clone(&gateway), &config), gateway)
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

fn json_request(method: Method, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn test_proxy_request_through_fallback() {
    let (app, _) = create_test_app(true);

    let request = Request::builder()
        .uri("/api/hotels?city=Porto")
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(&app, request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["location"], "search-1");
    assert_eq!(body["path"], "/hotels");
    assert_eq!(body["body"], Value::Null);
}

#[tokio::test]
async fn test_json_body_is_forwarded() {
    let (app, _) = create_test_app(true);

    let (status, body) = send(
        &app,
        json_request(Method::POST, "/api/search", json!({"from": "LIS", "to": "OPO"})),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["method"], "POST");
    assert_eq!(body["body"]["to"], "OPO");
}

#[tokio::test]
async fn test_unknown_route_returns_structured_404() {
    let (app, _) = create_test_app(true);

    let request = Request::builder().uri("/api/cars").body(Body::empty()).unwrap();
    let (status, body) = send(&app, request).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["kind"], "route_not_found");
    assert!(body["message"].as_str().unwrap().contains("/api/cars"));
}

#[tokio::test]
async fn test_invalid_json_body_is_rejected() {
    let (app, gateway) = create_test_app(true);

    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/search")
        .body(Body::from("{not json"))
        .unwrap();
    let (status, body) = send(&app, request).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["kind"], "invalid_request");
    assert_eq!(gateway.stats().requests_total, 0);
}

#[tokio::test]
async fn test_upstream_failure_maps_to_bad_gateway() {
    let (app, gateway) = create_test_app(true);

    let request = Request::builder().uri("/api/me").body(Body::empty()).unwrap();
    let (status, body) = send(&app, request).await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["kind"], "upstream_error");
    assert_eq!(gateway.stats().failed, 1);
}

#[tokio::test]
async fn test_caller_header_scopes_cache() {
    let invoker = LocalInvoker::new();
    let counter = Arc::new(std::sync::atomic::AtomicUsize::new(0));
    let seen = Arc::clone(&counter);
    invoker.register("user", move |_call: LocalCall| {
        let n = seen.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        async move { Ok(json!({ "call": n })) }
    });
    let gateway = Arc::new(Gateway::builder().invoker(Arc::new(invoker)).build());
    gateway.register_service(ServiceEndpoint::new("user", "user-1"));
    gateway
        .register_route(RouteConfig::proxy(Method::GET, "/api/me", "user").with_cache_ttl(30))
        .unwrap();
    let app = router(Arc::clone(&gateway), &ServerConfig::default());

    let as_user = |id: &str| {
        Request::builder()
            .uri("/api/me")
            .header("x-user-id", id)
            .body(Body::empty())
            .unwrap()
    };

    let (_, alice) = send(&app, as_user("alice")).await;
    let (_, bob) = send(&app, as_user("bob")).await;
    let (_, alice_again) = send(&app, as_user("alice")).await;

    assert_eq!(alice, json!({"call": 0}));
    assert_eq!(bob, json!({"call": 1}));
    assert_eq!(alice_again, alice);
    assert_eq!(gateway.stats().cache_hits, 1);
}

#[tokio::test]
async fn test_admin_health_and_listing() {
    let (app, _) = create_test_app(true);

    let (status, health) = send(
        &app,
        Request::builder().uri("/admin/health").body(Body::empty()).unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(health["status"], "healthy");

    let (_, services) = send(
        &app,
        Request::builder().uri("/admin/services").body(Body::empty()).unwrap(),
    )
    .await;
    assert_eq!(services["search"][0]["location"], "search-1");

    let (_, routes) = send(
        &app,
        Request::builder().uri("/admin/routes").body(Body::empty()).unwrap(),
    )
    .await;
    assert_eq!(routes.as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn test_admin_registration_flow() {
    let (app, _) = create_test_app(true);

    let (status, _) = send(
        &app,
        json_request(
            Method::POST,
            "/admin/services",
            json!({"service_name": "search", "location": "search-2"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, created) = send(
        &app,
        json_request(
            Method::POST,
            "/admin/routes",
            json!({"method": "get", "path": "/api/flights", "target_service": "search"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created, json!({"route": "GET:/api/flights", "replaced": false}));

    let get_flights = || Request::builder().uri("/api/flights").body(Body::empty()).unwrap();
    let (_, first) = send(&app, get_flights()).await;
    let (_, second) = send(&app, get_flights()).await;
    assert_eq!(first["location"], "search-1");
    assert_eq!(second["location"], "search-2");

    let (status, update) = send(
        &app,
        json_request(
            Method::PUT,
            "/admin/services/search/health",
            json!({"location": "search-1", "healthy": false}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(update["updated"], 1);

    for _ in 0..2 {
        let (_, body) = send(&app, get_flights()).await;
        assert_eq!(body["location"], "search-2");
    }
}

#[tokio::test]
async fn test_admin_health_update_for_unknown_endpoint() {
    let (app, _) = create_test_app(true);

    let (status, body) = send(
        &app,
        json_request(
            Method::PUT,
            "/admin/services/search/health",
            json!({"location": "nowhere", "healthy": false}),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["kind"], "endpoint_not_found");
}

#[tokio::test]
async fn test_admin_rejects_waterfall_route() {
    let (app, _) = create_test_app(true);

    let (status, body) = send(
        &app,
        json_request(
            Method::POST,
            "/admin/routes",
            json!({
                "method": "GET",
                "path": "/api/trip",
                "target_service": "search",
                "aggregation": {
                    "strategy": "waterfall",
                    "sub_calls": [{"service_name": "search", "path": "/hotels"}]
                }
            }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["kind"], "unsupported_strategy");
}

#[tokio::test]
async fn test_admin_stats_and_reset() {
    let (app, _) = create_test_app(true);

    for _ in 0..3 {
        send(
            &app,
            Request::builder().uri("/api/hotels").body(Body::empty()).unwrap(),
        )
        .await;
    }

    let (_, stats) = send(
        &app,
        Request::builder().uri("/admin/stats").body(Body::empty()).unwrap(),
    )
    .await;
    assert_eq!(stats["requests_total"], 3);
    assert_eq!(stats["success_rate"], "100.00%");
    assert_eq!(stats["per_route"]["GET:/api/hotels"]["count"], 3);

    let (_, balancer) = send(
        &app,
        Request::builder().uri("/admin/load-balancer").body(Body::empty()).unwrap(),
    )
    .await;
    assert_eq!(balancer["algorithm"], "round_robin");
    assert_eq!(balancer["total_selections"], 3);

    let (status, _) = send(
        &app,
        Request::builder()
            .method(Method::DELETE)
            .uri("/admin/stats")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, stats) = send(
        &app,
        Request::builder().uri("/admin/stats").body(Body::empty()).unwrap(),
    )
    .await;
    assert_eq!(stats["requests_total"], 0);
}

#[tokio::test]
async fn test_admin_can_be_disabled() {
    let (app, _) = create_test_app(false);

    let (status, body) = send(
        &app,
        Request::builder().uri("/admin/stats").body(Body::empty()).unwrap(),
    )
    .await;

    // falls through to the proxy handler, which has no such route
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["kind"], "route_not_found");
}
