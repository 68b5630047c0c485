use reqwest::{header::HeaderMap, Client, RequestBuilder, StatusCode};
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

pub const PLATFORM_HEADER: &str = "x-renderiq-platform";
pub const PLUGIN_VERSION_HEADER: &str = "x-renderiq-plugin-version";
pub const API_KEY_HEADER: &str = "x-api-key";

/// How the plugin identifies its user.
#[derive(Debug, Clone)]
pub enum Credentials {
    Bearer(String),
    ApiKey(String),
}

/// The gateway's view of the caller's bucket, from `X-RateLimit-*` headers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitStatus {
    pub limit: u32,
    pub remaining: u32,
    /// Epoch seconds at which the window resets.
    pub reset: u64,
}

impl RateLimitStatus {
    pub fn from_headers(headers: &HeaderMap) -> Option<Self> {
        fn number<T: std::str::FromStr>(headers: &HeaderMap, name: &str) -> Option<T> {
            headers.get(name)?.to_str().ok()?.parse().ok()
        }
        Some(Self {
            limit: number(headers, "x-ratelimit-limit")?,
            remaining: number(headers, "x-ratelimit-remaining")?,
            reset: number(headers, "x-ratelimit-reset")?,
        })
    }
}

/// A successful call: the `data` member of the envelope plus rate-limit state.
#[derive(Debug, Clone)]
pub struct ApiReply {
    pub status: StatusCode,
    pub data: Value,
    pub rate_limit: Option<RateLimitStatus>,
}

#[derive(Debug, Error)]
pub enum SdkError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("authentication required")]
    Unauthorized,

    #[error("rate limited, retry after {retry_after_secs}s")]
    RateLimited {
        retry_after_secs: u64,
        rate_limit: Option<RateLimitStatus>,
    },

    #[error("{code}: {message}")]
    Api {
        status: StatusCode,
        code: String,
        message: String,
        details: Option<Value>,
    },
}

impl SdkError {
    /// The gateway's error code, when the failure came from the gateway.
    pub fn code(&self) -> Option<&str> {
        match self {
            SdkError::Unauthorized => Some("AUTH_REQUIRED"),
            SdkError::RateLimited { .. } => Some("RATE_LIMIT_EXCEEDED"),
            SdkError::Api { code, .. } => Some(code),
            SdkError::Transport(_) => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PluginClient {
    client: Client,
    base_url: String,
    platform: String,
    plugin_version: String,
    credentials: Option<Credentials>,
}

impl PluginClient {
    pub fn new(base_url: &str, platform: &str, plugin_version: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            platform: platform.to_string(),
            plugin_version: plugin_version.to_string(),
            credentials: None,
        }
    }

    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    pub async fn get_json(&self, path: &str) -> Result<ApiReply, SdkError> {
        self.send(self.client.get(self.url(path))).await
    }

    pub async fn post_json<B: Serialize>(&self, path: &str, body: &B) -> Result<ApiReply, SdkError> {
        self.send(self.client.post(self.url(path)).json(body)).await
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn decorate(&self, request: RequestBuilder) -> RequestBuilder {
        let request = request
            .header(PLATFORM_HEADER, &self.platform)
            .header(PLUGIN_VERSION_HEADER, &self.plugin_version);
        match &self.credentials {
            Some(Credentials::Bearer(token)) => request.bearer_auth(token),
            Some(Credentials::ApiKey(key)) => request.header(API_KEY_HEADER, key),
            None => request,
        }
    }

    async fn send(&self, request: RequestBuilder) -> Result<ApiReply, SdkError> {
        let response = self.decorate(request).send().await?;
        let status = response.status();
        let rate_limit = RateLimitStatus::from_headers(response.headers());
        let retry_after = response
            .headers()
            .get("retry-after")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse().ok());
        let body: Value = response.json().await.unwrap_or(Value::Null);

        if status.is_success() {
            return Ok(ApiReply {
                status,
                data: body.get("data").cloned().unwrap_or(Value::Null),
                rate_limit,
            });
        }

        Err(match status {
            StatusCode::UNAUTHORIZED => SdkError::Unauthorized,
            StatusCode::TOO_MANY_REQUESTS => SdkError::RateLimited {
                retry_after_secs: retry_after.unwrap_or(60),
                rate_limit,
            },
            _ => SdkError::Api {
                status,
                code: body
                    .get("errorCode")
                    .and_then(Value::as_str)
                    .unwrap_or("UNKNOWN")
                    .to_string(),
                message: body
                    .get("error")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
                details: body.get("details").cloned(),
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    #[test]
    fn test_rate_limit_status_requires_all_headers() {
        let mut headers = HeaderMap::new();
        headers.insert("x-ratelimit-limit", HeaderValue::from_static("60"));
        headers.insert("x-ratelimit-remaining", HeaderValue::from_static("59"));
        assert_eq!(RateLimitStatus::from_headers(&headers), None);

        headers.insert("x-ratelimit-reset", HeaderValue::from_static("1700000060"));
        assert_eq!(
            RateLimitStatus::from_headers(&headers),
            Some(RateLimitStatus {
                limit: 60,
                remaining: 59,
                reset: 1_700_000_060,
            })
        );
    }

    #[test]
    fn test_base_url_trailing_slash() {
        let client = PluginClient::new("http://localhost:8080/", "blender", "1.0.0");
        assert_eq!(client.url("/api/health"), "http://localhost:8080/api/health");
    }
}
