//! Request metadata extraction.
//!
//! # Responsibilities
//! - Name the inbound headers the interceptor consumes
//! - Best-effort caller IP from proxy headers
//! - Origin lookup for CORS negotiation
//!
//! # Design Decisions
//! - Header values that are not valid visible ASCII are treated as absent
//! - The first `X-Forwarded-For` hop wins; the platform edge appends, never prepends

use axum::http::{header, HeaderMap, HeaderName};

pub const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");
pub const X_FORWARDED_FOR: HeaderName = HeaderName::from_static("x-forwarded-for");
pub const X_REAL_IP: HeaderName = HeaderName::from_static("x-real-ip");
pub const X_API_KEY: HeaderName = HeaderName::from_static("x-api-key");
pub const X_PLATFORM: HeaderName = HeaderName::from_static("x-renderiq-platform");
pub const X_PLUGIN_VERSION: HeaderName = HeaderName::from_static("x-renderiq-plugin-version");

pub const UNKNOWN_CLIENT: &str = "unknown";

fn header_str<'a>(headers: &'a HeaderMap, name: &HeaderName) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

/// Caller IP: first `X-Forwarded-For` entry, else `X-Real-IP`, else `"unknown"`.
pub fn client_ip(headers: &HeaderMap) -> String {
    if let Some(forwarded) = header_str(headers, &X_FORWARDED_FOR) {
        if let Some(first) = forwarded.split(',').map(str::trim).find(|s| !s.is_empty()) {
            return first.to_string();
        }
    }
    header_str(headers, &X_REAL_IP)
        .unwrap_or(UNKNOWN_CLIENT)
        .to_string()
}

/// The `Origin` header, if present.
pub fn origin(headers: &HeaderMap) -> Option<&str> {
    header_str(headers, &header::ORIGIN)
}

pub fn user_agent(headers: &HeaderMap) -> &str {
    header_str(headers, &header::USER_AGENT).unwrap_or_default()
}

pub fn platform_header(headers: &HeaderMap) -> Option<&str> {
    header_str(headers, &X_PLATFORM)
}

pub fn plugin_version_header(headers: &HeaderMap) -> Option<&str> {
    header_str(headers, &X_PLUGIN_VERSION)
}

pub fn api_key_header(headers: &HeaderMap) -> Option<&str> {
    header_str(headers, &X_API_KEY)
}

/// Token from `Authorization: Bearer <token>`.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = header_str(headers, &header::AUTHORIZATION)?;
    let (scheme, token) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

/// Declared body size, when the client sent a parseable `Content-Length`.
pub fn content_length(headers: &HeaderMap) -> Option<u64> {
    header_str(headers, &header::CONTENT_LENGTH)?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (k, v) in pairs {
            map.insert(*k, HeaderValue::from_static(v));
        }
        map
    }

    #[test]
    fn test_client_ip_prefers_first_forwarded_hop() {
        let map = headers(&[
            ("x-forwarded-for", "192.168.1.1, 10.0.0.1"),
            ("x-real-ip", "10.0.0.9"),
        ]);
        assert_eq!(client_ip(&map), "192.168.1.1");
    }

    #[test]
    fn test_client_ip_falls_back_to_real_ip_then_unknown() {
        assert_eq!(client_ip(&headers(&[("x-real-ip", "192.168.1.1")])), "192.168.1.1");
        assert_eq!(client_ip(&HeaderMap::new()), "unknown");
        assert_eq!(client_ip(&headers(&[("x-forwarded-for", " , ")])), "unknown");
    }

    #[test]
    fn test_bearer_token_extraction() {
        assert_eq!(
            bearer_token(&headers(&[("authorization", "Bearer abc.def")])),
            Some("abc.def")
        );
        assert_eq!(
            bearer_token(&headers(&[("authorization", "bearer abc")])),
            Some("abc")
        );
        assert_eq!(bearer_token(&headers(&[("authorization", "Basic abc")])), None);
        assert_eq!(bearer_token(&headers(&[("authorization", "Bearer ")])), None);
        assert_eq!(bearer_token(&HeaderMap::new()), None);
    }

    #[test]
    fn test_content_length_parsing() {
        assert_eq!(content_length(&headers(&[("content-length", "1024")])), Some(1024));
        assert_eq!(content_length(&headers(&[("content-length", "lots")])), None);
        assert_eq!(content_length(&HeaderMap::new()), None);
    }

    #[test]
    fn test_empty_origin_is_absent() {
        assert_eq!(origin(&headers(&[("origin", "")])), None);
        assert_eq!(
            origin(&headers(&[("origin", "https://renderiq.io")])),
            Some("https://renderiq.io")
        );
    }
}
