//! Generic route pipeline, end to end over HTTP.

use axum::routing::{get, post};
use axum::Router;
use render_gateway::config::Environment;
use render_gateway::http::{ApiResponse, ApiRouteConfig};
use render_gateway::security::RateLimitConfig;
use render_gateway::Gateway;
use reqwest::StatusCode;
use serde_json::{json, Value};

mod common;

use common::{BEARER_TOKEN, BEARER_USER, TRUSTED_ORIGIN};

async fn catalog() -> ApiResponse<Value> {
    ApiResponse::ok(json!({ "items": [] }))
}

#[tokio::test]
async fn test_thirty_one_rapid_calls_from_one_ip() {
    let (config, _, _) = common::test_config(Environment::Production);
    let gateway = Gateway::builder(&config).build();
    let router = Router::new().route(
        "/api/catalog",
        gateway
            .api_route(
                ApiRouteConfig::public("GET /api/catalog")
                    .rate_limited(RateLimitConfig::new(30, 60_000)),
            )
            .wrap(get(catalog)),
    );
    let (addr, shutdown) = common::serve_router(router).await;
    let client = reqwest::Client::new();
    let url = format!("http://{addr}/api/catalog");

    for call in 1..=30u32 {
        let res = client
            .get(&url)
            .header("x-forwarded-for", "203.0.113.7")
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK, "call {call}");
        assert_eq!(res.headers()["x-ratelimit-limit"], "30");
        let remaining: u32 = res.headers()["x-ratelimit-remaining"]
            .to_str()
            .unwrap()
            .parse()
            .unwrap();
        assert_eq!(remaining, 30 - call);
    }

    let res = client
        .get(&url)
        .header("x-forwarded-for", "203.0.113.7")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::TOO_MANY_REQUESTS);
    let retry_after: u64 = res.headers()["retry-after"]
        .to_str()
        .unwrap()
        .parse()
        .unwrap();
    assert!(retry_after > 0 && retry_after <= 60);
    assert_eq!(res.headers()["x-ratelimit-remaining"], "0");

    let body: Value = res.json().await.unwrap();
    assert_eq!(body["success"], false);
    assert_eq!(body["errorCode"], "RATE_LIMIT_EXCEEDED");
    assert_eq!(body["details"]["limit"], 30);

    // A different client IP has its own window.
    let other = client
        .get(&url)
        .header("x-forwarded-for", "203.0.113.8")
        .send()
        .await
        .unwrap();
    assert_eq!(other.status(), StatusCode::OK);

    shutdown.trigger();
}

#[tokio::test]
async fn test_preflight_for_trusted_origin() {
    let gw = common::spawn_gateway(Environment::Production).await;
    let res = reqwest::Client::new()
        .request(reqwest::Method::OPTIONS, gw.url("/api/me"))
        .header("origin", TRUSTED_ORIGIN)
        .header("access-control-request-method", "GET")
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::NO_CONTENT);
    let headers = res.headers();
    assert_eq!(headers["access-control-allow-origin"], TRUSTED_ORIGIN);
    assert_eq!(headers["access-control-allow-credentials"], "true");
    assert_eq!(headers["access-control-max-age"], "86400");
    assert_eq!(headers["cache-control"], "public, max-age=86400, immutable");
    assert!(headers["access-control-allow-methods"]
        .to_str()
        .unwrap()
        .contains("POST"));
}

#[tokio::test]
async fn test_preflight_for_untrusted_origin() {
    let gw = common::spawn_gateway(Environment::Production).await;
    let client = reqwest::Client::new();

    for origin in ["https://evil.example", "https://renderiq.io.evil.example", "not a url"] {
        let res = client
            .request(reqwest::Method::OPTIONS, gw.url("/api/me"))
            .header("origin", origin)
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::FORBIDDEN, "{origin}");
        assert!(res.headers().get("access-control-allow-origin").is_none());
        let body: Value = res.json().await.unwrap();
        assert_eq!(body["errorCode"], "ORIGIN_NOT_ALLOWED");
    }
}

#[tokio::test]
async fn test_localhost_trusted_only_in_development() {
    let client = reqwest::Client::new();

    let prod = common::spawn_gateway(Environment::Production).await;
    let res = client
        .request(reqwest::Method::OPTIONS, prod.url("/api/health"))
        .header("origin", "http://localhost:3000")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    let dev = common::spawn_gateway(Environment::Development).await;
    let res = client
        .request(reqwest::Method::OPTIONS, dev.url("/api/health"))
        .header("origin", "http://localhost:3000")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NO_CONTENT);
    assert_eq!(
        res.headers()["access-control-allow-origin"],
        "http://localhost:3000"
    );
}

#[tokio::test]
async fn test_same_origin_preflight_has_no_allow_origin() {
    let gw = common::spawn_gateway(Environment::Production).await;
    let res = reqwest::Client::new()
        .request(reqwest::Method::OPTIONS, gw.url("/api/health"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NO_CONTENT);
    assert!(res.headers().get("access-control-allow-origin").is_none());
    assert!(res.headers().get("access-control-allow-methods").is_some());
}

#[tokio::test]
async fn test_unauthenticated_response_still_carries_cors() {
    let gw = common::spawn_gateway(Environment::Production).await;
    let res = reqwest::Client::new()
        .get(gw.url("/api/me"))
        .header("origin", TRUSTED_ORIGIN)
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(res.headers()["access-control-allow-origin"], TRUSTED_ORIGIN);
    assert_eq!(res.headers()["vary"], "Origin");
    let body: Value = res.json().await.unwrap();
    assert_eq!(
        body,
        json!({
            "success": false,
            "error": "Authentication required",
            "errorCode": "AUTH_REQUIRED"
        })
    );
}

#[tokio::test]
async fn test_api_key_does_not_authenticate_generic_route() {
    let gw = common::spawn_gateway(Environment::Production).await;
    let res = reqwest::Client::new()
        .get(gw.url("/api/me"))
        .header("x-api-key", gw.full_key.as_str())
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_bearer_caller_reaches_handler() {
    let gw = common::spawn_gateway(Environment::Production).await;
    let res = reqwest::Client::new()
        .get(gw.url("/api/me"))
        .bearer_auth(BEARER_TOKEN)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["id"], BEARER_USER);
}

#[tokio::test]
async fn test_render_submission_is_rate_limited_and_validated() {
    let gw = common::spawn_gateway(Environment::Production).await;
    let client = reqwest::Client::new();

    let res = client
        .post(gw.url("/api/renders"))
        .bearer_auth(BEARER_TOKEN)
        .json(&json!({ "prompt": "modern kitchen, dusk", "projectId": "p1" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::ACCEPTED);
    assert_eq!(res.headers()["x-ratelimit-limit"], "10");
    assert_eq!(res.headers()["x-ratelimit-remaining"], "9");
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["data"]["status"], "queued");

    let res = client
        .post(gw.url("/api/renders"))
        .bearer_auth(BEARER_TOKEN)
        .json(&json!({ "projectId": "p1" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert!(res.headers().get("x-ratelimit-limit").is_none());
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["errorCode"], "MISSING_REQUIRED_FIELD");
    assert_eq!(body["details"]["field"], "prompt");
}

#[tokio::test]
async fn test_declared_body_size_is_checked_first() {
    let (config, _, _) = common::test_config(Environment::Production);
    let gateway = Gateway::builder(&config).build();
    let router = Router::new().route(
        "/api/upload",
        gateway
            .api_route(ApiRouteConfig::authenticated("POST /api/upload").max_body_size(16))
            .wrap(post(catalog)),
    );
    let (addr, shutdown) = common::serve_router(router).await;

    // No credentials: the size guard answers before authentication would.
    let res = reqwest::Client::new()
        .post(format!("http://{addr}/api/upload"))
        .body(vec![b'x'; 64])
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::PAYLOAD_TOO_LARGE);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["errorCode"], "PAYLOAD_TOO_LARGE");
    assert_eq!(body["details"]["sizeBytes"], 64);
    assert_eq!(body["details"]["maxBytes"], 16);

    shutdown.trigger();
}

#[tokio::test]
async fn test_request_id_is_assigned_and_propagated() {
    let gw = common::spawn_gateway(Environment::Production).await;
    let client = reqwest::Client::new();

    let res = client.get(gw.url("/api/health")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let generated = res.headers()["x-request-id"].to_str().unwrap().to_string();
    assert!(uuid::Uuid::parse_str(&generated).is_ok());

    let res = client
        .get(gw.url("/api/health"))
        .header("x-request-id", "trace-abc")
        .send()
        .await
        .unwrap();
    assert_eq!(res.headers()["x-request-id"], "trace-abc");
}
