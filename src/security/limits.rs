//! Request size limits.
//!
//! # Responsibilities
//! - Reject requests whose declared body exceeds the route ceiling
//!
//! # Design Decisions
//! - Checked against `Content-Length` before the body is read (early rejection)
//! - A missing or unparseable `Content-Length` passes; the platform's body cap applies
//! - Configurable per route, falling back to the gateway default

use axum::http::HeaderMap;
use serde_json::json;

use crate::http::error::{ApiError, ErrorCode};
use crate::http::request;

/// 4.5 MiB.
pub const DEFAULT_MAX_BODY_SIZE: u64 = 4_718_592;

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// Reject with 413 when the declared body is larger than `max_bytes`.
pub fn check_body_size(headers: &HeaderMap, max_bytes: u64) -> Result<(), ApiError> {
    let Some(declared) = request::content_length(headers) else {
        return Ok(());
    };
    if declared <= max_bytes {
        return Ok(());
    }

    Err(ApiError::new(ErrorCode::PayloadTooLarge).with_details(json!({
        "sizeBytes": declared,
        "maxBytes": max_bytes,
        "sizeMB": to_mb(declared),
        "maxSizeMB": to_mb(max_bytes),
    })))
}

fn to_mb(bytes: u64) -> f64 {
    ((bytes as f64 / BYTES_PER_MB) * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{header, HeaderValue, StatusCode};

    fn with_length(len: &'static str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_LENGTH, HeaderValue::from_static(len));
        headers
    }

    #[test]
    fn test_within_limit_passes() {
        assert!(check_body_size(&with_length("4718592"), DEFAULT_MAX_BODY_SIZE).is_ok());
        assert!(check_body_size(&HeaderMap::new(), 10).is_ok());
        assert!(check_body_size(&with_length("lots"), 10).is_ok());
    }

    #[test]
    fn test_over_limit_is_413_with_sizes() {
        let err = check_body_size(&with_length("5242880"), DEFAULT_MAX_BODY_SIZE).unwrap_err();
        assert_eq!(err.code(), ErrorCode::PayloadTooLarge);
        assert_eq!(err.status(), StatusCode::PAYLOAD_TOO_LARGE);

        let details = err.details().unwrap();
        assert_eq!(details["sizeBytes"], 5_242_880);
        assert_eq!(details["maxBytes"], 4_718_592);
        assert_eq!(details["sizeMB"], 5.0);
        assert_eq!(details["maxSizeMB"], 4.5);
    }
}
