//! Error taxonomy and uniform error responses.
//!
//! # Responsibilities
//! - Closed set of error codes, grouped by class
//! - One static message and one HTTP status per code
//! - Build the `{success: false, error, errorCode, details?}` envelope
//! - Carry unexpected failures (`GatewayError`) to the central handler
//!
//! # Design Decisions
//! - Messages come from a static table, never formatted, so clients branch on `errorCode`
//! - Expected failures are `ApiError` values returned inline; only `GatewayError` is
//!   treated as an exception
//! - `Retry-After` is only ever emitted for retryable codes (429, 503)

use std::borrow::Cow;
use std::sync::Arc;

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::auth::AuthError;
use crate::http::response::ApiResponse;

/// Broad class an error code belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Authentication,
    Validation,
    Resource,
    BusinessRule,
    System,
    Webhook,
    ApiKey,
    Cors,
}

/// Every error code a caller can observe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Authentication
    AuthRequired,
    AuthFailed,
    TokenExpired,
    TokenInvalid,
    InsufficientPermissions,

    // Validation
    InvalidInput,
    MissingRequiredField,
    InvalidFormat,
    PayloadTooLarge,

    // Resource
    NotFound,
    AlreadyExists,
    ResourceConflict,

    // Business rules
    InsufficientCredits,
    RateLimitExceeded,
    QuotaExceeded,
    RenderFailed,

    // System
    InternalError,
    ServiceUnavailable,
    Timeout,

    // Webhooks
    WebhookInvalidSignature,
    WebhookDeliveryFailed,

    // API key lifecycle
    ApiKeyInvalid,
    ApiKeyExpired,
    ApiKeyRevoked,

    // Cross-origin
    OriginNotAllowed,
}

impl ErrorCode {
    pub const ALL: [ErrorCode; 25] = [
        ErrorCode::AuthRequired,
        ErrorCode::AuthFailed,
        ErrorCode::TokenExpired,
        ErrorCode::TokenInvalid,
        ErrorCode::InsufficientPermissions,
        ErrorCode::InvalidInput,
        ErrorCode::MissingRequiredField,
        ErrorCode::InvalidFormat,
        ErrorCode::PayloadTooLarge,
        ErrorCode::NotFound,
        ErrorCode::AlreadyExists,
        ErrorCode::ResourceConflict,
        ErrorCode::InsufficientCredits,
        ErrorCode::RateLimitExceeded,
        ErrorCode::QuotaExceeded,
        ErrorCode::RenderFailed,
        ErrorCode::InternalError,
        ErrorCode::ServiceUnavailable,
        ErrorCode::Timeout,
        ErrorCode::WebhookInvalidSignature,
        ErrorCode::WebhookDeliveryFailed,
        ErrorCode::ApiKeyInvalid,
        ErrorCode::ApiKeyExpired,
        ErrorCode::ApiKeyRevoked,
        ErrorCode::OriginNotAllowed,
    ];

    /// Wire representation, identical to the serialized form.
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::AuthRequired => "AUTH_REQUIRED",
            ErrorCode::AuthFailed => "AUTH_FAILED",
            ErrorCode::TokenExpired => "TOKEN_EXPIRED",
            ErrorCode::TokenInvalid => "TOKEN_INVALID",
            ErrorCode::InsufficientPermissions => "INSUFFICIENT_PERMISSIONS",
            ErrorCode::InvalidInput => "INVALID_INPUT",
            ErrorCode::MissingRequiredField => "MISSING_REQUIRED_FIELD",
            ErrorCode::InvalidFormat => "INVALID_FORMAT",
            ErrorCode::PayloadTooLarge => "PAYLOAD_TOO_LARGE",
            ErrorCode::NotFound => "NOT_FOUND",
            ErrorCode::AlreadyExists => "ALREADY_EXISTS",
            ErrorCode::ResourceConflict => "RESOURCE_CONFLICT",
            ErrorCode::InsufficientCredits => "INSUFFICIENT_CREDITS",
            ErrorCode::RateLimitExceeded => "RATE_LIMIT_EXCEEDED",
            ErrorCode::QuotaExceeded => "QUOTA_EXCEEDED",
            ErrorCode::RenderFailed => "RENDER_FAILED",
            ErrorCode::InternalError => "INTERNAL_ERROR",
            ErrorCode::ServiceUnavailable => "SERVICE_UNAVAILABLE",
            ErrorCode::Timeout => "TIMEOUT",
            ErrorCode::WebhookInvalidSignature => "WEBHOOK_INVALID_SIGNATURE",
            ErrorCode::WebhookDeliveryFailed => "WEBHOOK_DELIVERY_FAILED",
            ErrorCode::ApiKeyInvalid => "API_KEY_INVALID",
            ErrorCode::ApiKeyExpired => "API_KEY_EXPIRED",
            ErrorCode::ApiKeyRevoked => "API_KEY_REVOKED",
            ErrorCode::OriginNotAllowed => "ORIGIN_NOT_ALLOWED",
        }
    }

    /// The one message clients will ever see for this code.
    pub fn message(self) -> &'static str {
        match self {
            ErrorCode::AuthRequired => "Authentication required",
            ErrorCode::AuthFailed => "Authentication failed",
            ErrorCode::TokenExpired => "Access token has expired",
            ErrorCode::TokenInvalid => "Access token is invalid",
            ErrorCode::InsufficientPermissions => {
                "Insufficient permissions to perform this action"
            }
            ErrorCode::InvalidInput => "Invalid input provided",
            ErrorCode::MissingRequiredField => "A required field is missing",
            ErrorCode::InvalidFormat => "Invalid data format",
            ErrorCode::PayloadTooLarge => "Request payload too large",
            ErrorCode::NotFound => "Resource not found",
            ErrorCode::AlreadyExists => "Resource already exists",
            ErrorCode::ResourceConflict => "Resource conflict",
            ErrorCode::InsufficientCredits => "Insufficient credits",
            ErrorCode::RateLimitExceeded => "Rate limit exceeded. Please try again later.",
            ErrorCode::QuotaExceeded => "Usage quota exceeded",
            ErrorCode::RenderFailed => "Render generation failed",
            ErrorCode::InternalError => {
                "Internal server error. Please try again or contact support if the issue persists."
            }
            ErrorCode::ServiceUnavailable => "Service temporarily unavailable",
            ErrorCode::Timeout => "Request timed out",
            ErrorCode::WebhookInvalidSignature => "Invalid webhook signature",
            ErrorCode::WebhookDeliveryFailed => "Webhook delivery failed",
            ErrorCode::ApiKeyInvalid => "API key is invalid",
            ErrorCode::ApiKeyExpired => "API key has expired",
            ErrorCode::ApiKeyRevoked => "API key has been revoked",
            ErrorCode::OriginNotAllowed => "CORS policy: Origin not allowed",
        }
    }

    pub fn status(self) -> StatusCode {
        match self {
            ErrorCode::AuthRequired
            | ErrorCode::AuthFailed
            | ErrorCode::TokenExpired
            | ErrorCode::TokenInvalid
            | ErrorCode::WebhookInvalidSignature
            | ErrorCode::ApiKeyInvalid
            | ErrorCode::ApiKeyExpired
            | ErrorCode::ApiKeyRevoked => StatusCode::UNAUTHORIZED,
            ErrorCode::InsufficientPermissions
            | ErrorCode::QuotaExceeded
            | ErrorCode::OriginNotAllowed => StatusCode::FORBIDDEN,
            ErrorCode::InvalidInput
            | ErrorCode::MissingRequiredField
            | ErrorCode::InvalidFormat => StatusCode::BAD_REQUEST,
            ErrorCode::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            ErrorCode::NotFound => StatusCode::NOT_FOUND,
            ErrorCode::AlreadyExists | ErrorCode::ResourceConflict => StatusCode::CONFLICT,
            ErrorCode::InsufficientCredits => StatusCode::PAYMENT_REQUIRED,
            ErrorCode::RateLimitExceeded => StatusCode::TOO_MANY_REQUESTS,
            ErrorCode::RenderFailed | ErrorCode::InternalError => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            ErrorCode::ServiceUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            ErrorCode::Timeout => StatusCode::GATEWAY_TIMEOUT,
            ErrorCode::WebhookDeliveryFailed => StatusCode::BAD_GATEWAY,
        }
    }

    pub fn category(self) -> ErrorCategory {
        match self {
            ErrorCode::AuthRequired
            | ErrorCode::AuthFailed
            | ErrorCode::TokenExpired
            | ErrorCode::TokenInvalid
            | ErrorCode::InsufficientPermissions => ErrorCategory::Authentication,
            ErrorCode::InvalidInput
            | ErrorCode::MissingRequiredField
            | ErrorCode::InvalidFormat
            | ErrorCode::PayloadTooLarge => ErrorCategory::Validation,
            ErrorCode::NotFound | ErrorCode::AlreadyExists | ErrorCode::ResourceConflict => {
                ErrorCategory::Resource
            }
            ErrorCode::InsufficientCredits
            | ErrorCode::RateLimitExceeded
            | ErrorCode::QuotaExceeded
            | ErrorCode::RenderFailed => ErrorCategory::BusinessRule,
            ErrorCode::InternalError | ErrorCode::ServiceUnavailable | ErrorCode::Timeout => {
                ErrorCategory::System
            }
            ErrorCode::WebhookInvalidSignature | ErrorCode::WebhookDeliveryFailed => {
                ErrorCategory::Webhook
            }
            ErrorCode::ApiKeyInvalid | ErrorCode::ApiKeyExpired | ErrorCode::ApiKeyRevoked => {
                ErrorCategory::ApiKey
            }
            ErrorCode::OriginNotAllowed => ErrorCategory::Cors,
        }
    }

    /// Whether a client may retry after backing off.
    pub fn is_retryable(self) -> bool {
        matches!(
            self,
            ErrorCode::RateLimitExceeded | ErrorCode::ServiceUnavailable
        )
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An expected, caller-facing failure.
#[derive(Debug, Clone)]
pub struct ApiError {
    code: ErrorCode,
    message: Option<Cow<'static, str>>,
    details: Option<Value>,
    retry_after_secs: Option<u64>,
}

impl ApiError {
    pub fn new(code: ErrorCode) -> Self {
        Self {
            code,
            message: None,
            details: None,
            retry_after_secs: None,
        }
    }

    /// Attach structured, caller-safe context.
    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    /// Set `Retry-After`. Ignored for codes that are not retryable.
    pub fn with_retry_after(mut self, secs: u64) -> Self {
        if self.code.is_retryable() {
            self.retry_after_secs = Some(secs.max(1));
        }
        self
    }

    /// Replace the catalog message. Only the central handler does this, and only in
    /// development mode.
    pub(crate) fn with_message(mut self, message: impl Into<Cow<'static, str>>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn code(&self) -> ErrorCode {
        self.code
    }

    pub fn status(&self) -> StatusCode {
        self.code.status()
    }

    pub fn details(&self) -> Option<&Value> {
        self.details.as_ref()
    }

    pub fn message(&self) -> &str {
        self.message.as_deref().unwrap_or(self.code.message())
    }

    pub fn body(&self) -> ApiResponse<()> {
        ApiResponse::failure(self.code, self.message().to_string(), self.details.clone())
    }
}

impl From<ErrorCode> for ApiError {
    fn from(code: ErrorCode) -> Self {
        Self::new(code)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut response = (self.status(), Json(self.body())).into_response();
        if let Some(secs) = self.retry_after_secs {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(secs));
        }
        response
    }
}

/// Unexpected failures. These are the only errors that reach the central handler.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error("{0}")]
    Internal(String),

    #[error("handler panicked: {0}")]
    Panic(String),
}

impl GatewayError {
    pub fn internal(message: impl Into<String>) -> Self {
        GatewayError::Internal(message.into())
    }
}

/// Marker placed in response extensions so the route wrapper can find handler failures.
#[derive(Debug, Clone)]
pub struct HandlerFailure(pub Arc<GatewayError>);

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        // Outside a route wrapper this is still a safe, generic 500.
        let mut response = ApiError::new(ErrorCode::InternalError).into_response();
        response
            .extensions_mut()
            .insert(HandlerFailure(Arc::new(self)));
        response
    }
}

const SENSITIVE_MARKERS: [&str; 8] = [
    "database",
    "supabase",
    "postgres",
    "connection",
    "timeout",
    "internal",
    "stack",
    "trace",
];

/// Client-safe rendition of an unexpected error: infrastructure details are replaced,
/// everything else is stripped of markup and capped at 200 characters.
pub fn safe_error_message(error: &GatewayError) -> String {
    let message = error.to_string();
    let lowered = message.to_lowercase();
    if SENSITIVE_MARKERS.iter().any(|m| lowered.contains(m)) {
        return "An error occurred. Please try again later.".to_string();
    }
    message
        .chars()
        .filter(|c| *c != '<' && *c != '>')
        .take(200)
        .collect::<String>()
        .trim()
        .to_string()
}
