//! Cross-origin negotiation.
//!
//! # Responsibilities
//! - Turn an origin verdict into response headers
//! - Answer OPTIONS preflights without touching the rest of the pipeline
//! - Enqueue a security event for every rejected origin
//!
//! # Design Decisions
//! - No `Access-Control-*` header at all for a rejected origin; the browser enforces
//! - With credentials the allowed origin is echoed verbatim, never `*`
//! - `skip_origin_check` emits `*` and never emits `Allow-Credentials`
//! - Preflight does no I/O: allow-list lookup is synchronous, logging is enqueue-only

use std::sync::Arc;

use axum::{
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};

use crate::http::error::{ApiError, ErrorCode};
use crate::observability::metrics;
use crate::security::audit::{SecurityLevel, SecurityLog};
use crate::security::origin::OriginValidator;

/// Per-route CORS options. Defaults apply to every route that does not override them.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct CorsOptions {
    pub allowed_methods: Vec<String>,
    pub allowed_headers: Vec<String>,
    pub exposed_headers: Vec<String>,
    /// Preflight cache lifetime in seconds.
    pub max_age: u64,
    pub allow_credentials: bool,
    pub skip_origin_check: bool,
}

impl Default for CorsOptions {
    fn default() -> Self {
        Self {
            allowed_methods: ["GET", "POST", "PUT", "DELETE", "PATCH", "OPTIONS", "HEAD"]
                .map(String::from)
                .to_vec(),
            allowed_headers: [
                "Content-Type",
                "Authorization",
                "X-Requested-With",
                "Accept",
                "Origin",
                "Cache-Control",
                "X-File-Name",
            ]
            .map(String::from)
            .to_vec(),
            exposed_headers: Vec::new(),
            max_age: 86_400,
            allow_credentials: true,
            skip_origin_check: false,
        }
    }
}

/// Outcome of checking an origin against the options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OriginVerdict {
    /// No `Origin` header: a same-origin or non-browser call.
    SameOrigin,
    /// Allow-listed; echo this value.
    Allowed(HeaderValue),
    /// Origin checks disabled for the route.
    Any,
    Rejected,
}

#[derive(Debug, Clone)]
pub struct CorsNegotiator {
    validator: Arc<OriginValidator>,
    security: SecurityLog,
}

impl CorsNegotiator {
    pub fn new(validator: OriginValidator, security: SecurityLog) -> Self {
        Self {
            validator: Arc::new(validator),
            security,
        }
    }

    pub fn verdict(&self, origin: Option<&str>, options: &CorsOptions) -> OriginVerdict {
        if options.skip_origin_check {
            return OriginVerdict::Any;
        }
        let Some(origin) = origin else {
            return OriginVerdict::SameOrigin;
        };
        if !self.validator.is_allowed(origin) {
            return OriginVerdict::Rejected;
        }
        match HeaderValue::from_str(origin) {
            Ok(value) => OriginVerdict::Allowed(value),
            Err(_) => OriginVerdict::Rejected,
        }
    }

    /// Headers for an actual (non-preflight) response.
    pub fn headers(&self, origin: Option<&str>, options: &CorsOptions) -> HeaderMap {
        let verdict = self.verdict(origin, options);
        if verdict == OriginVerdict::Rejected {
            self.reject("cors_invalid_origin", origin);
        }
        build_headers(&verdict, options)
    }

    /// Merge CORS headers into an outgoing response.
    pub fn apply(&self, response: &mut Response, origin: Option<&str>, options: &CorsOptions) {
        let headers = self.headers(origin, options);
        response.headers_mut().extend(headers);
    }

    /// Answer an OPTIONS preflight: 204 when the origin is acceptable, 403 otherwise.
    pub fn preflight(&self, origin: Option<&str>, options: &CorsOptions) -> Response {
        let verdict = self.verdict(origin, options);
        if verdict == OriginVerdict::Rejected {
            self.reject("cors_invalid_origin", origin);
            self.reject("cors_preflight_blocked", origin);
            return ApiError::new(ErrorCode::OriginNotAllowed).into_response();
        }

        let mut headers = build_headers(&verdict, options);
        headers.insert(header::CACHE_CONTROL, preflight_cache_control(options.max_age));

        let mut response = StatusCode::NO_CONTENT.into_response();
        response.headers_mut().extend(headers);
        response
    }

    fn reject(&self, event: &'static str, origin: Option<&str>) {
        metrics::record_cors_rejected();
        self.security.emit(
            event,
            SecurityLevel::Warn,
            vec![("origin", origin.unwrap_or_default().to_string())],
        );
    }
}

fn build_headers(verdict: &OriginVerdict, options: &CorsOptions) -> HeaderMap {
    let mut headers = HeaderMap::new();
    match verdict {
        OriginVerdict::Rejected => return headers,
        OriginVerdict::Any => {
            headers.insert(
                header::ACCESS_CONTROL_ALLOW_ORIGIN,
                HeaderValue::from_static("*"),
            );
        }
        OriginVerdict::Allowed(origin) => {
            headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, origin.clone());
            if options.allow_credentials {
                headers.insert(
                    header::ACCESS_CONTROL_ALLOW_CREDENTIALS,
                    HeaderValue::from_static("true"),
                );
            }
            headers.insert(header::VARY, HeaderValue::from_static("Origin"));
        }
        OriginVerdict::SameOrigin => {}
    }

    if let Some(methods) = joined(&options.allowed_methods) {
        headers.insert(header::ACCESS_CONTROL_ALLOW_METHODS, methods);
    }
    if let Some(allowed) = joined(&options.allowed_headers) {
        headers.insert(header::ACCESS_CONTROL_ALLOW_HEADERS, allowed);
    }
    if let Some(exposed) = joined(&options.exposed_headers) {
        headers.insert(header::ACCESS_CONTROL_EXPOSE_HEADERS, exposed);
    }
    headers.insert(
        header::ACCESS_CONTROL_MAX_AGE,
        HeaderValue::from(options.max_age),
    );
    headers
}

fn joined(values: &[String]) -> Option<HeaderValue> {
    if values.is_empty() {
        return None;
    }
    HeaderValue::from_str(&values.join(", ")).ok()
}

fn preflight_cache_control(max_age: u64) -> HeaderValue {
    HeaderValue::from_str(&format!("public, max-age={max_age}, immutable"))
        .unwrap_or_else(|_| HeaderValue::from_static("no-store"))
}
