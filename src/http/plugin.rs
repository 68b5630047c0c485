//! Route wrapper for plugin-facing routes.
//!
//! # Pipeline
//! ```text
//! OPTIONS → preflight
//! otherwise:
//!     → body-size guard
//!     → detect platform
//!     → authenticate once (bearer, then API key)
//!     → rate limit on plugin:<platform>:user:<id> | plugin:<platform>:ip:<ip>
//!     → key store outage                     500
//!     → reject when required and anonymous   401
//!     → handler (PlatformInfo + PluginAuthResult in extensions)
//!     → CORS headers
//! ```
//!
//! # Design Decisions
//! - The identity used for the bucket comes from the same authentication the handler
//!   sees; credentials are verified once per request
//! - An authentication outage falls back to the IP bucket, so the caller is still
//!   limited before the outage turns into a 500
//! - Scopes are checked by handlers, not here

use std::sync::Arc;
use std::time::Instant;

use axum::{
    body::Body,
    extract::State,
    http::{Method, Request},
    middleware::{from_fn_with_state, Next},
    response::{IntoResponse, Response},
    routing::MethodRouter,
};

use crate::http::error::{ApiError, ErrorCode, GatewayError};
use crate::http::gateway::Gateway;
use crate::http::request;
use crate::http::route::{handle_failure, invoke, rate_limit_rejection, ErrorHook};
use crate::observability::metrics;
use crate::platform::plugin_identifier;
use crate::security::audit::SecurityLevel;
use crate::security::cors::CorsOptions;
use crate::security::limits::check_body_size;
use crate::security::rate_limit::apply_rate_limit_headers;

#[derive(Clone)]
pub struct PluginRouteConfig {
    /// Default `true`.
    pub require_auth: bool,
    /// Default `true`.
    pub enable_cors: bool,
    pub cors: Option<CorsOptions>,
    pub max_body_size: Option<u64>,
    pub route_name: String,
    pub on_error: Option<ErrorHook>,
}

impl PluginRouteConfig {
    pub fn new(route_name: impl Into<String>) -> Self {
        Self {
            require_auth: true,
            enable_cors: true,
            cors: None,
            max_body_size: None,
            route_name: route_name.into(),
            on_error: None,
        }
    }

    /// Let anonymous plugin callers through; they are still limited per IP.
    pub fn allow_anonymous(mut self) -> Self {
        self.require_auth = false;
        self
    }

    pub fn cors(mut self, options: CorsOptions) -> Self {
        self.cors = Some(options);
        self
    }

    pub fn max_body_size(mut self, bytes: u64) -> Self {
        self.max_body_size = Some(bytes);
        self
    }
}

/// A plugin route wrapper, bound to a `Gateway`.
#[derive(Clone)]
pub struct PluginRoute {
    gateway: Gateway,
    config: Arc<PluginRouteConfig>,
}

impl PluginRoute {
    pub(crate) fn new(gateway: Gateway, config: PluginRouteConfig) -> Self {
        Self {
            gateway,
            config: Arc::new(config),
        }
    }

    pub fn wrap<S>(self, router: MethodRouter<S>) -> MethodRouter<S>
    where
        S: Clone + Send + Sync + 'static,
    {
        router.layer(from_fn_with_state(self, plugin_route_middleware))
    }

    fn cors_options(&self) -> &CorsOptions {
        self.config
            .cors
            .as_ref()
            .unwrap_or(&self.gateway.inner.cors_defaults)
    }

    pub async fn handle(&self, request: Request<Body>, next: Next) -> Response {
        let started = Instant::now();
        let origin = request::origin(request.headers()).map(str::to_string);

        if self.config.enable_cors && request.method() == Method::OPTIONS {
            return self
                .gateway
                .inner
                .cors
                .preflight(origin.as_deref(), self.cors_options());
        }

        let mut response = self.run(request, next).await;
        if self.config.enable_cors {
            self.gateway
                .inner
                .cors
                .apply(&mut response, origin.as_deref(), self.cors_options());
        }
        metrics::record_request(
            &self.config.route_name,
            response.status().as_u16(),
            started.elapsed(),
        );
        response
    }

    async fn run(&self, mut request: Request<Body>, next: Next) -> Response {
        let gateway = &self.gateway.inner;
        let route = self.config.route_name.as_str();
        let on_error = self.config.on_error.as_ref();

        let max_body = self.config.max_body_size.unwrap_or(gateway.max_body_size);
        if let Err(e) = check_body_size(request.headers(), max_body) {
            return e.into_response();
        }

        let platform = gateway.detector.detect(request.headers());
        let ip = request::client_ip(request.headers());
        let auth = gateway
            .authenticator
            .authenticate_plugin(request.headers())
            .await;

        let user_id = match &auth {
            Ok(auth) => auth.as_ref().map(|a| a.user.id.as_str()),
            Err(e) => {
                tracing::warn!(route, error = %e, "Plugin identity unavailable, limiting by IP");
                None
            }
        };
        let bucket = plugin_identifier(platform.platform, user_id, &ip);
        let limit = gateway.policies.policy_for(platform.platform);
        let decision = gateway.limiter.check(&bucket, &limit);
        if !decision.allowed {
            return rate_limit_rejection(
                &self.gateway,
                route,
                platform.platform.as_str(),
                &bucket,
                &decision,
            );
        }

        let auth = match auth {
            Ok(auth) => auth,
            Err(e) => return handle_failure(&self.gateway, route, on_error, &GatewayError::from(e)),
        };

        match auth {
            Some(auth) => {
                request.extensions_mut().insert(auth);
            }
            None if self.config.require_auth => {
                gateway.security.emit(
                    "plugin_auth_failed",
                    SecurityLevel::Warn,
                    vec![
                        ("route", route.to_string()),
                        ("platform", platform.platform.as_str().to_string()),
                    ],
                );
                return ApiError::new(ErrorCode::AuthRequired).into_response();
            }
            None => {}
        }

        tracing::debug!(
            route,
            platform = %platform.platform,
            version = platform.version.as_deref().unwrap_or("-"),
            "Plugin request admitted"
        );
        request.extensions_mut().insert(platform);

        let mut response = invoke(&self.gateway, route, on_error, request, next).await;
        if response.status().is_success() {
            apply_rate_limit_headers(response.headers_mut(), &decision);
        }
        response
    }
}

pub async fn plugin_route_middleware(
    State(route): State<PluginRoute>,
    request: Request<Body>,
    next: Next,
) -> Response {
    route.handle(request, next).await
}
