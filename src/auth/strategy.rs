//! Credential strategies and the authenticator that chains them.
//!
//! # Responsibilities
//! - Bearer: exchange `Authorization: Bearer` with the identity provider
//! - API key: verify `X-Api-Key` against the key store
//! - Fold the strategies in order, first success wins
//!
//! # Design Decisions
//! - A rejected or unverifiable bearer token is "no identity", never an error, so the
//!   chain falls through to the API key
//! - Key store failures are unexpected and propagate to the route wrapper
//! - The generic (web) path only uses bearer tokens

use std::sync::Arc;

use async_trait::async_trait;
use axum::http::HeaderMap;

use crate::auth::types::{
    ApiKeyStore, AuthError, AuthResult, AuthType, IdentityProvider, PluginAuthResult, User,
};
use crate::http::request;
use crate::observability::metrics;

/// One way of turning request headers into an identity.
#[async_trait]
pub trait CredentialStrategy: Send + Sync {
    fn scheme(&self) -> AuthType;

    /// `Ok(None)` when this scheme does not identify the caller.
    async fn authenticate(&self, headers: &HeaderMap)
        -> Result<Option<PluginAuthResult>, AuthError>;
}

pub struct BearerStrategy {
    provider: Arc<dyn IdentityProvider>,
}

impl BearerStrategy {
    pub fn new(provider: Arc<dyn IdentityProvider>) -> Self {
        Self { provider }
    }

    async fn resolve(&self, headers: &HeaderMap) -> Option<User> {
        let token = request::bearer_token(headers)?;
        match self.provider.verify(token).await {
            Ok(user) => user,
            Err(e) => {
                tracing::warn!(error = %e, "Bearer verification failed, treating as anonymous");
                None
            }
        }
    }
}

#[async_trait]
impl CredentialStrategy for BearerStrategy {
    fn scheme(&self) -> AuthType {
        AuthType::Bearer
    }

    async fn authenticate(
        &self,
        headers: &HeaderMap,
    ) -> Result<Option<PluginAuthResult>, AuthError> {
        Ok(self.resolve(headers).await.map(PluginAuthResult::bearer))
    }
}

pub struct ApiKeyStrategy {
    store: Arc<dyn ApiKeyStore>,
}

impl ApiKeyStrategy {
    pub fn new(store: Arc<dyn ApiKeyStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl CredentialStrategy for ApiKeyStrategy {
    fn scheme(&self) -> AuthType {
        AuthType::ApiKey
    }

    async fn authenticate(
        &self,
        headers: &HeaderMap,
    ) -> Result<Option<PluginAuthResult>, AuthError> {
        let Some(raw_key) = request::api_key_header(headers) else {
            return Ok(None);
        };
        let verified = self.store.verify(raw_key).await?;
        Ok(verified.map(PluginAuthResult::api_key))
    }
}

/// Resolves caller identity for both route families.
pub struct CredentialAuthenticator {
    bearer: Arc<BearerStrategy>,
    chain: Vec<Arc<dyn CredentialStrategy>>,
}

impl CredentialAuthenticator {
    /// Bearer first, then API key.
    pub fn new(provider: Arc<dyn IdentityProvider>, store: Arc<dyn ApiKeyStore>) -> Self {
        let bearer = Arc::new(BearerStrategy::new(provider));
        let chain: Vec<Arc<dyn CredentialStrategy>> = vec![
            bearer.clone() as Arc<dyn CredentialStrategy>,
            Arc::new(ApiKeyStrategy::new(store)) as Arc<dyn CredentialStrategy>,
        ];
        Self { bearer, chain }
    }

    /// Generic path: bearer token only. Never fails; an unverifiable token is anonymous.
    pub async fn authenticate(&self, headers: &HeaderMap) -> Option<AuthResult> {
        let user = self.bearer.resolve(headers).await;
        metrics::record_auth("bearer", user.is_some());
        user.map(|user| AuthResult {
            user,
            bearer_token: request::bearer_token(headers).map(str::to_string),
        })
    }

    /// Plugin path: try each strategy in order and stop at the first identity.
    pub async fn authenticate_plugin(
        &self,
        headers: &HeaderMap,
    ) -> Result<Option<PluginAuthResult>, AuthError> {
        for strategy in &self.chain {
            if let Some(auth) = strategy.authenticate(headers).await? {
                metrics::record_auth(strategy.scheme().as_str(), true);
                tracing::debug!(user_id = %auth.user.id, scheme = strategy.scheme().as_str(), "Plugin caller authenticated");
                return Ok(Some(auth));
            }
        }
        metrics::record_auth("none", false);
        Ok(None)
    }
}
