//! Shared pipeline components.
//!
//! # Responsibilities
//! - Own the origin negotiator, rate limiter, authenticator, detector and reporter
//! - Build them from configuration, with injection points for tests
//! - Hand out route wrappers bound to these components
//!
//! # Design Decisions
//! - One `Gateway` per process, cloned cheaply into every route (single `Arc`)
//! - The limiter is injected behind `RateLimiter`; there is no module-level table

use std::sync::Arc;

use crate::auth::{
    ApiKeyStore, CredentialAuthenticator, IdentityProvider, MemoryApiKeyStore,
    RemoteIdentityProvider, StaticIdentityProvider,
};
use crate::config::{Environment, GatewayConfig};
use crate::http::plugin::{PluginRoute, PluginRouteConfig};
use crate::http::route::{AdaptiveRoute, ApiRoute, ApiRouteConfig};
use crate::observability::{ErrorReporter, TracingReporter};
use crate::platform::{PlatformDetector, PlatformPolicies};
use crate::security::{
    CorsNegotiator, CorsOptions, FixedWindowLimiter, OriginValidator, RateLimitConfig,
    RateLimiter, SecurityLog,
};

pub(crate) struct GatewayInner {
    pub(crate) environment: Environment,
    pub(crate) cors: CorsNegotiator,
    pub(crate) cors_defaults: CorsOptions,
    pub(crate) limiter: Arc<dyn RateLimiter>,
    pub(crate) default_rate_limit: RateLimitConfig,
    pub(crate) authenticator: CredentialAuthenticator,
    pub(crate) detector: PlatformDetector,
    pub(crate) policies: PlatformPolicies,
    pub(crate) reporter: Arc<dyn ErrorReporter>,
    pub(crate) security: SecurityLog,
    pub(crate) max_body_size: u64,
}

/// The interceptor pipeline's collaborators, shared by every route.
#[derive(Clone)]
pub struct Gateway {
    pub(crate) inner: Arc<GatewayInner>,
}

impl Gateway {
    pub fn builder(config: &GatewayConfig) -> GatewayBuilder {
        GatewayBuilder::from_config(config)
    }

    pub fn environment(&self) -> Environment {
        self.inner.environment
    }

    pub fn limiter(&self) -> &Arc<dyn RateLimiter> {
        &self.inner.limiter
    }

    pub fn detector(&self) -> PlatformDetector {
        self.inner.detector
    }

    /// A generic route wrapper using these components.
    pub fn api_route(&self, config: ApiRouteConfig) -> ApiRoute {
        ApiRoute::new(self.clone(), config)
    }

    /// A plugin route wrapper using these components.
    pub fn plugin_route(&self, config: PluginRouteConfig) -> PluginRoute {
        PluginRoute::new(self.clone(), config)
    }

    /// A wrapper that sends plugin callers through the plugin pipeline and everyone
    /// else through the generic one.
    pub fn adaptive_route(&self, generic: ApiRouteConfig, plugin: PluginRouteConfig) -> AdaptiveRoute {
        AdaptiveRoute::new(self.api_route(generic), self.plugin_route(plugin))
    }
}

/// Assembles a `Gateway`. Every collaborator defaults to the one configuration implies.
pub struct GatewayBuilder {
    environment: Environment,
    allowed_domains: Vec<String>,
    cors_defaults: CorsOptions,
    default_rate_limit: RateLimitConfig,
    policies: PlatformPolicies,
    max_body_size: u64,
    limiter: Option<Arc<dyn RateLimiter>>,
    identity_provider: Arc<dyn IdentityProvider>,
    key_store: Arc<dyn ApiKeyStore>,
    reporter: Arc<dyn ErrorReporter>,
    security: SecurityLog,
}

impl GatewayBuilder {
    pub fn from_config(config: &GatewayConfig) -> Self {
        let identity_provider: Arc<dyn IdentityProvider> = match &config.auth.identity_provider_url
        {
            Some(url) => Arc::new(RemoteIdentityProvider::new(
                url,
                config.auth.identity_provider_anon_key.clone(),
            )),
            None => Arc::new(StaticIdentityProvider::from_config(
                &config.auth.static_tokens,
            )),
        };

        Self {
            environment: config.environment,
            allowed_domains: config.cors.allowed_domains.clone(),
            cors_defaults: config.cors.options.clone(),
            default_rate_limit: config.rate_limit,
            policies: PlatformPolicies::from_config(&config.platforms),
            max_body_size: config.security.max_body_size,
            limiter: None,
            identity_provider,
            key_store: Arc::new(MemoryApiKeyStore::from_config(&config.auth.api_keys)),
            reporter: Arc::new(TracingReporter),
            security: SecurityLog::disabled(),
        }
    }

    pub fn limiter(mut self, limiter: Arc<dyn RateLimiter>) -> Self {
        self.limiter = Some(limiter);
        self
    }

    pub fn identity_provider(mut self, provider: Arc<dyn IdentityProvider>) -> Self {
        self.identity_provider = provider;
        self
    }

    pub fn key_store(mut self, store: Arc<dyn ApiKeyStore>) -> Self {
        self.key_store = store;
        self
    }

    pub fn reporter(mut self, reporter: Arc<dyn ErrorReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    pub fn security_log(mut self, security: SecurityLog) -> Self {
        self.security = security;
        self
    }

    pub fn build(self) -> Gateway {
        let validator = OriginValidator::new(&self.allowed_domains, self.environment);
        let inner = GatewayInner {
            environment: self.environment,
            cors: CorsNegotiator::new(validator, self.security.clone()),
            cors_defaults: self.cors_defaults,
            limiter: self
                .limiter
                .unwrap_or_else(|| Arc::new(FixedWindowLimiter::new())),
            default_rate_limit: self.default_rate_limit,
            authenticator: CredentialAuthenticator::new(self.identity_provider, self.key_store),
            detector: PlatformDetector,
            policies: self.policies,
            reporter: self.reporter,
            security: self.security,
            max_body_size: self.max_body_size,
        };
        Gateway {
            inner: Arc::new(inner),
        }
    }
}
