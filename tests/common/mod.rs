//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;

use axum::Router;
use render_gateway::auth::memory::generate_api_key;
use render_gateway::config::{ApiKeyConfig, Environment, GatewayConfig, StaticTokenConfig};
use render_gateway::{HttpServer, Shutdown};
use tokio::net::TcpListener;

pub const BEARER_TOKEN: &str = "integration-token";
pub const BEARER_USER: &str = "user-bearer";
pub const KEY_USER: &str = "user-key";
pub const TRUSTED_ORIGIN: &str = "https://app.renderiq.io";

/// A running gateway. Stops when dropped.
pub struct TestGateway {
    pub addr: SocketAddr,
    /// Key with `projects:read` and `renders:create`.
    pub full_key: String,
    /// Key with `projects:read` only.
    pub read_only_key: String,
    shutdown: Shutdown,
}

impl TestGateway {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }
}

impl Drop for TestGateway {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}

fn api_key(id: &str, scopes: &[&str]) -> (String, ApiKeyConfig) {
    let (key, key_hash) = generate_api_key();
    let config = ApiKeyConfig {
        id: id.to_string(),
        user_id: KEY_USER.to_string(),
        name: id.to_string(),
        key_hash,
        scopes: scopes.iter().map(|s| s.to_string()).collect(),
        expires_at_ms: None,
        is_active: true,
    };
    (key, config)
}

/// Configuration with one static bearer token and two seeded API keys.
pub fn test_config(environment: Environment) -> (GatewayConfig, String, String) {
    let mut config = GatewayConfig::default();
    config.environment = environment;
    config.listener.bind_address = "127.0.0.1:0".to_string();
    config.cors.allowed_domains = vec!["renderiq.io".to_string()];
    config.auth.static_tokens.push(StaticTokenConfig {
        token: BEARER_TOKEN.to_string(),
        user_id: BEARER_USER.to_string(),
        email: Some("bearer@renderiq.io".to_string()),
    });

    let (full_key, full) = api_key("key-full", &["projects:read", "renders:create"]);
    let (read_only_key, read_only) = api_key("key-read", &["projects:read"]);
    config.auth.api_keys.push(full);
    config.auth.api_keys.push(read_only);
    (config, full_key, read_only_key)
}

/// Start the full gateway on an ephemeral port.
pub async fn spawn_gateway(environment: Environment) -> TestGateway {
    let (config, full_key, read_only_key) = test_config(environment);
    let listener = TcpListener::bind(&config.listener.bind_address).await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = Shutdown::new();

    let server = HttpServer::new(config);
    let handle = shutdown.clone();
    tokio::spawn(async move {
        server.run(listener, handle).await.unwrap();
    });

    TestGateway {
        addr,
        full_key,
        read_only_key,
        shutdown,
    }
}

/// Serve an arbitrary router on an ephemeral port.
pub async fn serve_router(router: Router) -> (SocketAddr, Shutdown) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = Shutdown::new();
    let wait = shutdown.wait();
    tokio::spawn(async move {
        axum::serve(listener, router)
            .with_graceful_shutdown(wait)
            .await
            .unwrap();
    });
    (addr, shutdown)
}
