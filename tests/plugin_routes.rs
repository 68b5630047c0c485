//! Plugin and adaptive routes, driven through the plugin SDK.

use plugin_sdk::{Credentials, PluginClient, SdkError};
use render_gateway::config::Environment;
use reqwest::StatusCode;
use serde_json::{json, Value};

mod common;

use common::{BEARER_TOKEN, BEARER_USER, KEY_USER};

#[tokio::test]
async fn test_bearer_plugin_gets_platform_limits() {
    let gw = common::spawn_gateway(Environment::Production).await;
    let client = PluginClient::new(&gw.base_url(), "blender", "4.1.0")
        .with_credentials(Credentials::Bearer(BEARER_TOKEN.into()));

    let reply = client.get_json("/api/plugins/projects").await.unwrap();
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.data["userId"], BEARER_USER);
    assert_eq!(reply.data["platform"]["platform"], "blender");
    assert_eq!(reply.data["platform"]["version"], "4.1.0");

    let limit = reply.rate_limit.unwrap();
    assert_eq!(limit.limit, 90);
    assert_eq!(limit.remaining, 89);
}

#[tokio::test]
async fn test_api_key_plugin_with_scope() {
    let gw = common::spawn_gateway(Environment::Production).await;
    let client = PluginClient::new(&gw.base_url(), "revit", "2.0.0")
        .with_credentials(Credentials::ApiKey(gw.full_key.clone()));

    let reply = client
        .post_json("/api/plugins/renders", &json!({ "prompt": "atrium, overcast" }))
        .await
        .unwrap();
    assert_eq!(reply.status, StatusCode::ACCEPTED);
    assert_eq!(reply.data["platform"], "revit");
    assert_eq!(reply.rate_limit.unwrap().limit, 30);
}

#[tokio::test]
async fn test_api_key_without_scope_is_forbidden() {
    let gw = common::spawn_gateway(Environment::Production).await;
    let client = PluginClient::new(&gw.base_url(), "rhino", "8.0")
        .with_credentials(Credentials::ApiKey(gw.read_only_key.clone()));

    let projects = client.get_json("/api/plugins/projects").await.unwrap();
    assert_eq!(projects.data["userId"], KEY_USER);

    let err = client
        .post_json("/api/plugins/renders", &json!({ "prompt": "loft" }))
        .await
        .unwrap_err();
    match err {
        SdkError::Api {
            status,
            code,
            details,
            ..
        } => {
            assert_eq!(status, StatusCode::FORBIDDEN);
            assert_eq!(code, "INSUFFICIENT_PERMISSIONS");
            assert_eq!(details.unwrap()["requiredScope"], "renders:create");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_unknown_api_key_is_unauthorized() {
    let gw = common::spawn_gateway(Environment::Production).await;
    let client = PluginClient::new(&gw.base_url(), "sketchup", "23.1")
        .with_credentials(Credentials::ApiKey("rk_live_0000".into()));

    let err = client.get_json("/api/plugins/projects").await.unwrap_err();
    assert!(matches!(err, SdkError::Unauthorized));
    assert_eq!(err.code(), Some("AUTH_REQUIRED"));
}

#[tokio::test]
async fn test_bearer_wins_over_api_key() {
    let gw = common::spawn_gateway(Environment::Production).await;
    let res = reqwest::Client::new()
        .post(gw.url("/api/plugins/renders"))
        .header("x-renderiq-platform", "archicad")
        .bearer_auth(BEARER_TOKEN)
        .header("x-api-key", gw.read_only_key.as_str())
        .json(&json!({ "prompt": "pavilion" }))
        .send()
        .await
        .unwrap();
    // The read-only key would be forbidden; the bearer identity holds every scope.
    assert_eq!(res.status(), StatusCode::ACCEPTED);
}

#[tokio::test]
async fn test_plugin_bucket_is_exhausted_per_user_and_platform() {
    let gw = common::spawn_gateway(Environment::Production).await;
    let autocad = PluginClient::new(&gw.base_url(), "autocad", "2025")
        .with_credentials(Credentials::Bearer(BEARER_TOKEN.into()));

    for _ in 0..30 {
        autocad.get_json("/api/plugins/projects").await.unwrap();
    }
    match autocad.get_json("/api/plugins/projects").await.unwrap_err() {
        SdkError::RateLimited {
            retry_after_secs,
            rate_limit,
        } => {
            assert!(retry_after_secs > 0 && retry_after_secs <= 60);
            assert_eq!(rate_limit.unwrap().remaining, 0);
        }
        other => panic!("unexpected error: {other:?}"),
    }

    // Same user from another platform has its own bucket.
    let sketchup = PluginClient::new(&gw.base_url(), "sketchup", "24.0")
        .with_credentials(Credentials::Bearer(BEARER_TOKEN.into()));
    let reply = sketchup.get_json("/api/plugins/projects").await.unwrap();
    assert_eq!(reply.rate_limit.unwrap().remaining, 59);
}

#[tokio::test]
async fn test_platform_detected_from_user_agent() {
    let gw = common::spawn_gateway(Environment::Production).await;
    let res = reqwest::Client::new()
        .get(gw.url("/api/plugins/projects"))
        .header("user-agent", "Renderiq-Plugin Blender/3.6.2 (Linux)")
        .bearer_auth(BEARER_TOKEN)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["data"]["platform"]["platform"], "blender");
    assert_eq!(body["data"]["platform"]["version"], "3.6.2");
}

#[tokio::test]
async fn test_adaptive_route_picks_pipeline() {
    let gw = common::spawn_gateway(Environment::Production).await;

    // Plugin callers may use an API key here.
    let plugin = PluginClient::new(&gw.base_url(), "3dsmax", "2024")
        .with_credentials(Credentials::ApiKey(gw.full_key.clone()));
    let reply = plugin.get_json("/api/renders/r-42").await.unwrap();
    assert_eq!(reply.data["via"], "plugin");
    assert_eq!(reply.data["userId"], KEY_USER);
    assert_eq!(reply.rate_limit.unwrap().limit, 30);

    // Web callers go through the generic pipeline, which accepts bearer tokens only.
    let client = reqwest::Client::new();
    let res = client
        .get(gw.url("/api/renders/r-42"))
        .header("x-api-key", gw.full_key.as_str())
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let res = client
        .get(gw.url("/api/renders/r-42"))
        .bearer_auth(BEARER_TOKEN)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["data"]["via"], "web");
    assert_eq!(body["data"]["id"], "r-42");
}
