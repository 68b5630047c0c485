//! Identity provider reached over HTTP.
//!
//! Calls `GET <base>/auth/v1/user` with the caller's bearer token. A 401 or 403 means the
//! token is not valid; anything else unexpected is a `ProviderError`.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;

use crate::auth::types::{IdentityProvider, ProviderError, User};

#[derive(Debug, Deserialize)]
struct UserPayload {
    id: String,
    #[serde(default)]
    email: Option<String>,
}

#[derive(Debug, Clone)]
pub struct RemoteIdentityProvider {
    client: reqwest::Client,
    user_url: String,
    anon_key: Option<String>,
}

impl RemoteIdentityProvider {
    pub fn new(base_url: &str, anon_key: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            user_url: format!("{}/auth/v1/user", base_url.trim_end_matches('/')),
            anon_key,
        }
    }
}

#[async_trait]
impl IdentityProvider for RemoteIdentityProvider {
    async fn verify(&self, token: &str) -> Result<Option<User>, ProviderError> {
        let mut request = self.client.get(&self.user_url).bearer_auth(token);
        if let Some(key) = &self.anon_key {
            request = request.header("apikey", key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| ProviderError::Transport(e.to_string()))?;

        match response.status() {
            StatusCode::OK => {
                let payload: UserPayload = response
                    .json()
                    .await
                    .map_err(|e| ProviderError::Decode(e.to_string()))?;
                Ok(Some(User {
                    id: payload.id,
                    email: payload.email,
                }))
            }
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Ok(None),
            status => Err(ProviderError::Status(status.as_u16())),
        }
    }
}
