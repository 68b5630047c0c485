//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::security::cors::CorsOptions;
use crate::security::limits::DEFAULT_MAX_BODY_SIZE;
use crate::security::rate_limit::RateLimitConfig;

/// Root configuration for the gateway.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GatewayConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Execution mode. Controls error verbosity and local-origin trust.
    pub environment: Environment,

    /// Origin allow-list and default CORS options.
    pub cors: CorsConfig,

    /// Default limit for generic routes that opt into rate limiting.
    pub rate_limit: RateLimitConfig,

    /// Per-platform rate-limit overrides for plugin routes, keyed by platform tag.
    pub platforms: HashMap<String, RateLimitConfig>,

    /// Credential collaborators.
    pub auth: AuthConfig,

    /// Request guards.
    pub security: SecurityConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Execution mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Development,
    #[default]
    Production,
}

impl Environment {
    pub fn is_development(self) -> bool {
        self == Environment::Development
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Cross-origin configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CorsConfig {
    /// Domains whose origins (and subdomains) are trusted.
    pub allowed_domains: Vec<String>,

    /// Options applied to every route that does not override them.
    pub options: CorsOptions,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_domains: vec!["renderiq.io".to_string(), "www.renderiq.io".to_string()],
            options: CorsOptions::default(),
        }
    }
}

/// Identity provider and API key store settings.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct AuthConfig {
    /// Base URL of the remote identity provider. When unset, `static_tokens` are used.
    pub identity_provider_url: Option<String>,

    /// Public key sent alongside bearer tokens to the identity provider.
    pub identity_provider_anon_key: Option<String>,

    /// Fixed bearer tokens, for local development and tests.
    pub static_tokens: Vec<StaticTokenConfig>,

    /// API keys loaded into the in-memory key store at startup.
    pub api_keys: Vec<ApiKeyConfig>,
}

/// A bearer token that resolves to a fixed user.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StaticTokenConfig {
    pub token: String,
    pub user_id: String,
    #[serde(default)]
    pub email: Option<String>,
}

/// A pre-provisioned API key. Only the SHA-256 hex digest is stored.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApiKeyConfig {
    pub id: String,
    pub user_id: String,
    #[serde(default)]
    pub name: String,
    pub key_hash: String,
    #[serde(default)]
    pub scopes: Vec<String>,
    /// Expiry as epoch milliseconds.
    #[serde(default)]
    pub expires_at_ms: Option<u64>,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

/// Request guard configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Default maximum declared body size in bytes.
    pub max_body_size: u64,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            max_body_size: DEFAULT_MAX_BODY_SIZE,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
