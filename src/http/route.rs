//! Route wrapper for generic (web) routes.
//!
//! # Responsibilities
//! - Run the interceptor pipeline in front of a handler
//! - Catch handler failures (returned errors and panics) in one place
//! - Attach CORS headers to every response, error responses included
//!
//! # Pipeline
//! ```text
//! OPTIONS → preflight (nothing else runs)
//! otherwise:
//!     → body-size guard          413
//!     → rate limit (by IP)       429
//!     → authenticate (bearer)    401 when required and absent
//!     → handler                  500 on failure
//!     → CORS headers
//! ```
//!
//! # Design Decisions
//! - Attached with `MethodRouter::layer` so OPTIONS reaches the wrapper even when the
//!   route declares no OPTIONS handler
//! - Expected failures short-circuit as `ApiError` responses; only `GatewayError` and
//!   panics reach the central failure handler

use std::any::Any;
use std::panic::AssertUnwindSafe;
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
use futures_util::FutureExt;
use serde_json::json;

use crate::http::error::{safe_error_message, ApiError, ErrorCode, GatewayError, HandlerFailure};
use crate::http::gateway::Gateway;
use crate::http::plugin::PluginRoute;
use crate::http::request;
use crate::observability::metrics;
use crate::security::audit::SecurityLevel;
use crate::security::cors::CorsOptions;
use crate::security::limits::check_body_size;
use crate::security::rate_limit::{
    apply_rate_limit_headers, rate_limited_response, RateLimitConfig, RateLimitDecision,
};

/// Lets a route turn selected failures into its own error response.
pub type ErrorHook = Arc<dyn Fn(&GatewayError) -> Option<ApiError> + Send + Sync>;

/// Per-route pipeline settings.
#[derive(Clone)]
pub struct ApiRouteConfig {
    /// Reject unauthenticated callers with `AUTH_REQUIRED`. Default `true`.
    pub require_auth: bool,
    /// Default `true`.
    pub enable_cors: bool,
    /// Overrides the gateway's default CORS options.
    pub cors: Option<CorsOptions>,
    /// Default `false`.
    pub enable_rate_limit: bool,
    /// Overrides the gateway's default limit.
    pub rate_limit: Option<RateLimitConfig>,
    /// Overrides the gateway's default body ceiling.
    pub max_body_size: Option<u64>,
    pub route_name: String,
    pub on_error: Option<ErrorHook>,
}

impl Default for ApiRouteConfig {
    fn default() -> Self {
        Self {
            require_auth: true,
            enable_cors: true,
            cors: None,
            enable_rate_limit: false,
            rate_limit: None,
            max_body_size: None,
            route_name: "unknown".to_string(),
            on_error: None,
        }
    }
}

impl ApiRouteConfig {
    /// A route anyone may call.
    pub fn public(route_name: impl Into<String>) -> Self {
        Self {
            require_auth: false,
            route_name: route_name.into(),
            ..Self::default()
        }
    }

    /// A route that requires a verified bearer token.
    pub fn authenticated(route_name: impl Into<String>) -> Self {
        Self {
            route_name: route_name.into(),
            ..Self::default()
        }
    }

    pub fn rate_limited(mut self, limit: RateLimitConfig) -> Self {
        self.enable_rate_limit = true;
        self.rate_limit = Some(limit);
        self
    }

    pub fn cors(mut self, options: CorsOptions) -> Self {
        self.cors = Some(options);
        self
    }

    pub fn without_cors(mut self) -> Self {
        self.enable_cors = false;
        self
    }

    pub fn max_body_size(mut self, bytes: u64) -> Self {
        self.max_body_size = Some(bytes);
        self
    }

    pub fn on_error<F>(mut self, hook: F) -> Self
    where
        F: Fn(&GatewayError) -> Option<ApiError> + Send + Sync + 'static,
    {
        self.on_error = Some(Arc::new(hook));
        self
    }
}

/// A generic route wrapper, bound to a `Gateway`.
#[derive(Clone)]
pub struct ApiRoute {
    gateway: Gateway,
    config: Arc<ApiRouteConfig>,
}

impl ApiRoute {
    pub(crate) fn new(gateway: Gateway, config: ApiRouteConfig) -> Self {
        Self {
            gateway,
            config: Arc::new(config),
        }
    }

    pub fn route_name(&self) -> &str {
        &self.config.route_name
    }

    /// Put this pipeline in front of every method of `router`.
    pub fn wrap<S>(self, router: MethodRouter<S>) -> MethodRouter<S>
    where
        S: Clone + Send + Sync + 'static,
    {
        router.layer(from_fn_with_state(self, api_route_middleware))
    }

    fn cors_options(&self) -> &CorsOptions {
        self.config
            .cors
            .as_ref()
            .unwrap_or(&self.gateway.inner.cors_defaults)
    }

    /// Run the full pipeline for one request.
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

        let status = response.status();
        metrics::record_request(&self.config.route_name, status.as_u16(), started.elapsed());
        tracing::debug!(
            route = %self.config.route_name,
            status = status.as_u16(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Route completed"
        );
        response
    }

    async fn run(&self, mut request: Request<Body>, next: Next) -> Response {
        let gateway = &self.gateway.inner;
        let route = self.config.route_name.as_str();

        let max_body = self.config.max_body_size.unwrap_or(gateway.max_body_size);
        if let Err(e) = check_body_size(request.headers(), max_body) {
            tracing::warn!(route, "Request body too large");
            return e.into_response();
        }

        let mut decision = None;
        if self.config.enable_rate_limit {
            let limit = self.config.rate_limit.unwrap_or(gateway.default_rate_limit);
            let ip = request::client_ip(request.headers());
            let d = gateway.limiter.check(&ip, &limit);
            if !d.allowed {
                return rate_limit_rejection(&self.gateway, route, "ip", &ip, &d);
            }
            decision = Some(d);
        }

        if self.config.require_auth {
            match gateway.authenticator.authenticate(request.headers()).await {
                Some(auth) => {
                    request.extensions_mut().insert(auth);
                }
                None => {
                    gateway.security.emit(
                        "api_auth_failed",
                        SecurityLevel::Warn,
                        vec![
                            ("route", route.to_string()),
                            (
                                "has_bearer",
                                request::bearer_token(request.headers()).is_some().to_string(),
                            ),
                        ],
                    );
                    return ApiError::new(ErrorCode::AuthRequired).into_response();
                }
            }
        }

        let mut response =
            invoke(&self.gateway, route, self.config.on_error.as_ref(), request, next).await;
        if let Some(d) = decision {
            if response.status().is_success() {
                apply_rate_limit_headers(response.headers_mut(), &d);
            }
        }
        response
    }
}

/// Axum entry point for `ApiRoute::wrap`.
pub async fn api_route_middleware(
    State(route): State<ApiRoute>,
    request: Request<Body>,
    next: Next,
) -> Response {
    route.handle(request, next).await
}

/// Generic and plugin pipelines behind one route, chosen per request by platform.
#[derive(Clone)]
pub struct AdaptiveRoute {
    generic: ApiRoute,
    plugin: PluginRoute,
}

impl AdaptiveRoute {
    pub(crate) fn new(generic: ApiRoute, plugin: PluginRoute) -> Self {
        Self { generic, plugin }
    }

    pub fn wrap<S>(self, router: MethodRouter<S>) -> MethodRouter<S>
    where
        S: Clone + Send + Sync + 'static,
    {
        router.layer(from_fn_with_state(self, adaptive_route_middleware))
    }
}

pub async fn adaptive_route_middleware(
    State(route): State<AdaptiveRoute>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let info = route.generic.gateway.inner.detector.detect(request.headers());
    if info.is_plugin_request() {
        route.plugin.handle(request, next).await
    } else {
        route.generic.handle(request, next).await
    }
}

/// Shared 429 path for both pipelines.
pub(crate) fn rate_limit_rejection(
    gateway: &Gateway,
    route: &str,
    scope: &str,
    bucket: &str,
    decision: &RateLimitDecision,
) -> Response {
    let gateway = &gateway.inner;
    tracing::warn!(route, bucket, limit = decision.limit, "Rate limit exceeded");
    metrics::record_rate_limited(scope);
    gateway.security.emit(
        "rate_limit_exceeded",
        SecurityLevel::Warn,
        vec![("route", route.to_string()), ("bucket", bucket.to_string())],
    );
    rate_limited_response(decision, gateway.limiter.now_ms())
}

/// Run the handler and convert failures into the uniform 500.
pub(crate) async fn invoke(
    gateway: &Gateway,
    route: &str,
    on_error: Option<&ErrorHook>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let outcome = AssertUnwindSafe(next.run(request)).catch_unwind().await;
    let response = match outcome {
        Ok(response) => response,
        Err(panic) => {
            let error = GatewayError::Panic(panic_message(panic.as_ref()));
            return handle_failure(gateway, route, on_error, &error);
        }
    };

    match response.extensions().get::<HandlerFailure>().cloned() {
        Some(HandlerFailure(error)) => handle_failure(gateway, route, on_error, &error),
        None => response,
    }
}

/// The one place unexpected failures are logged, reported and rendered.
pub(crate) fn handle_failure(
    gateway: &Gateway,
    route: &str,
    on_error: Option<&ErrorHook>,
    error: &GatewayError,
) -> Response {
    if let Some(custom) = on_error.and_then(|hook| hook(error)) {
        return custom.into_response();
    }

    let gateway = &gateway.inner;
    let safe = safe_error_message(error);

    tracing::error!(route, error = %error, "Route handler failed");
    gateway.reporter.capture(route, error);
    gateway.security.emit(
        "api_error",
        SecurityLevel::Error,
        vec![("route", route.to_string()), ("error", safe.clone())],
    );

    let api_error = ApiError::new(ErrorCode::InternalError);
    let api_error = if gateway.environment.is_development() {
        api_error
            .with_message(format!("Internal server error: {safe}"))
            .with_details(json!({ "message": error.to_string() }))
    } else {
        api_error
    };
    api_error.into_response()
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
