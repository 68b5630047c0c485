//! HTTP server setup.
//!
//! # Responsibilities
//! - Build the shared `Gateway` from configuration
//! - Mount the render API behind its route wrappers
//! - Wire up server-wide layers (request ID, tracing)
//! - Serve until the `Shutdown` handle fires
//!
//! # Routes
//! ```text
//! GET  /api/health           public
//! GET  /api/me               bearer
//! POST /api/renders          bearer, IP rate limit
//! GET  /api/renders/{id}     adaptive (plugin or web caller)
//! GET  /api/plugins/projects plugin, scope projects:read
//! POST /api/plugins/renders  plugin, scope renders:create
//! ```

use axum::{
    body::{Body, Bytes},
    extract::Path,
    http::{Request, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Extension, Router,
};
use serde::Deserialize;
use serde_json::json;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use uuid::Uuid;

use crate::auth::{has_scope, AuthResult, PluginAuthResult};
use crate::config::GatewayConfig;
use crate::http::error::{ApiError, ErrorCode};
use crate::http::gateway::Gateway;
use crate::http::plugin::PluginRouteConfig;
use crate::http::request::X_REQUEST_ID;
use crate::http::response::ApiResponse;
use crate::http::route::ApiRouteConfig;
use crate::lifecycle::Shutdown;
use crate::platform::PlatformInfo;
use crate::security::audit::{self, SecurityEvent};
use crate::security::{RateLimitConfig, SecurityLog};

const RENDER_SUBMISSIONS_PER_MINUTE: u32 = 10;

/// HTTP server for the render API.
pub struct HttpServer {
    router: Router,
    gateway: Gateway,
    security_events: Option<mpsc::UnboundedReceiver<SecurityEvent>>,
}

impl HttpServer {
    /// Create a server whose security events are drained into the log.
    pub fn new(config: GatewayConfig) -> Self {
        let (security, rx) = SecurityLog::channel();
        let gateway = Gateway::builder(&config).security_log(security).build();
        let mut server = Self::with_gateway(gateway);
        server.security_events = Some(rx);
        server
    }

    /// Create a server around an already assembled gateway.
    pub fn with_gateway(gateway: Gateway) -> Self {
        let router = build_router(&gateway);
        Self {
            router,
            gateway,
            security_events: None,
        }
    }

    pub fn gateway(&self) -> &Gateway {
        &self.gateway
    }

    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Run the server, accepting connections on `listener` until `shutdown` fires.
    pub async fn run(self, listener: TcpListener, shutdown: Shutdown) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            environment = ?self.gateway.environment(),
            "HTTP server starting"
        );

        if let Some(rx) = self.security_events {
            tokio::spawn(audit::drain(rx));
        }

        axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown.wait())
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

fn build_router(gateway: &Gateway) -> Router {
    let renders_route = gateway
        .api_route(
            ApiRouteConfig::authenticated("POST /api/renders")
                .rate_limited(RateLimitConfig::new(RENDER_SUBMISSIONS_PER_MINUTE, 60_000)),
        )
        .wrap(post(create_render));

    let status_route = gateway
        .adaptive_route(
            ApiRouteConfig::authenticated("GET /api/renders/{id}"),
            PluginRouteConfig::new("GET /api/renders/{id}"),
        )
        .wrap(get(render_status));

    let projects_route = gateway
        .plugin_route(PluginRouteConfig::new("GET /api/plugins/projects"))
        .wrap(get(plugin_projects));

    let plugin_renders_route = gateway
        .plugin_route(PluginRouteConfig::new("POST /api/plugins/renders"))
        .wrap(post(plugin_create_render));

    Router::new()
        .route(
            "/api/health",
            gateway
                .api_route(ApiRouteConfig::public("GET /api/health"))
                .wrap(get(health)),
        )
        .route(
            "/api/me",
            gateway
                .api_route(ApiRouteConfig::authenticated("GET /api/me"))
                .wrap(get(me)),
        )
        .route("/api/renders", renders_route)
        .route("/api/renders/{id}", status_route)
        .route("/api/plugins/projects", projects_route)
        .route("/api/plugins/renders", plugin_renders_route)
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(TraceLayer::new_for_http().make_span_with(request_span))
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
}

fn request_span(request: &Request<Body>) -> tracing::Span {
    let request_id = request
        .headers()
        .get(X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("-");
    tracing::info_span!(
        "request",
        method = %request.method(),
        uri = %request.uri(),
        request_id,
    )
}

async fn health() -> Response {
    ApiResponse::ok(json!({ "status": "ok" })).into_response()
}

async fn me(Extension(auth): Extension<AuthResult>) -> Response {
    ApiResponse::ok(auth.user).into_response()
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RenderRequest {
    prompt: Option<String>,
    #[serde(default)]
    project_id: Option<String>,
}

fn parse_render_request(body: &Bytes) -> Result<(String, Option<String>), ApiError> {
    let request: RenderRequest = serde_json::from_slice(body).map_err(|e| {
        ApiError::new(ErrorCode::InvalidFormat).with_details(json!({ "reason": e.to_string() }))
    })?;
    match request.prompt {
        Some(prompt) if !prompt.trim().is_empty() => Ok((prompt, request.project_id)),
        _ => Err(ApiError::new(ErrorCode::MissingRequiredField)
            .with_details(json!({ "field": "prompt" }))),
    }
}

async fn create_render(Extension(auth): Extension<AuthResult>, body: Bytes) -> Response {
    let (prompt, project_id) = match parse_render_request(&body) {
        Ok(parsed) => parsed,
        Err(e) => return e.into_response(),
    };
    tracing::info!(user_id = %auth.user.id, "Render queued");
    ApiResponse::ok(json!({
        "id": Uuid::new_v4().to_string(),
        "status": "queued",
        "prompt": prompt,
        "projectId": project_id,
    }))
    .with_status(StatusCode::ACCEPTED)
}

async fn render_status(Path(id): Path<String>, request: Request<Body>) -> Response {
    let extensions = request.extensions();
    let (user_id, via) = match (
        extensions.get::<PluginAuthResult>(),
        extensions.get::<AuthResult>(),
    ) {
        (Some(plugin), _) => (plugin.user.id.clone(), "plugin"),
        (None, Some(web)) => (web.user.id.clone(), "web"),
        (None, None) => return ApiError::new(ErrorCode::AuthRequired).into_response(),
    };
    ApiResponse::ok(json!({
        "id": id,
        "status": "queued",
        "userId": user_id,
        "via": via,
    }))
    .into_response()
}

async fn plugin_projects(
    Extension(platform): Extension<PlatformInfo>,
    Extension(auth): Extension<PluginAuthResult>,
) -> Response {
    if !has_scope(&auth, "projects:read") {
        return missing_scope("projects:read");
    }
    ApiResponse::ok(json!({
        "projects": [],
        "platform": platform,
        "userId": auth.user.id,
    }))
    .into_response()
}

async fn plugin_create_render(
    Extension(platform): Extension<PlatformInfo>,
    Extension(auth): Extension<PluginAuthResult>,
    body: Bytes,
) -> Response {
    if !has_scope(&auth, "renders:create") {
        return missing_scope("renders:create");
    }
    let (prompt, project_id) = match parse_render_request(&body) {
        Ok(parsed) => parsed,
        Err(e) => return e.into_response(),
    };
    tracing::info!(
        user_id = %auth.user.id,
        platform = %platform.platform,
        auth_type = auth.auth_type.as_str(),
        "Plugin render queued"
    );
    ApiResponse::ok(json!({
        "id": Uuid::new_v4().to_string(),
        "status": "queued",
        "prompt": prompt,
        "projectId": project_id,
        "platform": platform.platform,
    }))
    .with_status(StatusCode::ACCEPTED)
}

fn missing_scope(scope: &str) -> Response {
    ApiError::new(ErrorCode::InsufficientPermissions)
        .with_details(json!({ "requiredScope": scope }))
        .into_response()
}
