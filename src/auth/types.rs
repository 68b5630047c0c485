//! Identity types and collaborator contracts.

use std::collections::BTreeSet;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

/// Scope that grants every permission.
pub const WILDCARD_SCOPE: &str = "*";

/// Caller identity as reported by the identity provider or the key store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct User {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

impl User {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            email: None,
        }
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }
}

/// The caller-visible part of a verified API key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApiKeyInfo {
    pub id: String,
    pub scopes: BTreeSet<String>,
}

impl ApiKeyInfo {
    pub fn allows(&self, scope: &str) -> bool {
        self.scopes.contains(scope) || self.scopes.contains(WILDCARD_SCOPE)
    }
}

/// A key the store accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedKey {
    pub user: User,
    pub api_key: ApiKeyInfo,
}

/// Result of the generic (web) authentication path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthResult {
    pub user: User,
    pub bearer_token: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthType {
    Bearer,
    ApiKey,
}

impl AuthType {
    pub fn as_str(self) -> &'static str {
        match self {
            AuthType::Bearer => "bearer",
            AuthType::ApiKey => "api_key",
        }
    }
}

/// Result of the plugin authentication path. Exactly one scheme produced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PluginAuthResult {
    pub user: User,
    pub auth_type: AuthType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<ApiKeyInfo>,
}

impl PluginAuthResult {
    pub fn bearer(user: User) -> Self {
        Self {
            user,
            auth_type: AuthType::Bearer,
            api_key: None,
        }
    }

    pub fn api_key(verified: VerifiedKey) -> Self {
        Self {
            user: verified.user,
            auth_type: AuthType::ApiKey,
            api_key: Some(verified.api_key),
        }
    }
}

/// Bearer callers are first-party and hold every scope. API-key callers hold only the
/// scopes attached to their key.
pub fn has_scope(auth: &PluginAuthResult, scope: &str) -> bool {
    match auth.auth_type {
        AuthType::Bearer => true,
        AuthType::ApiKey => auth.api_key.as_ref().is_some_and(|k| k.allows(scope)),
    }
}

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("identity provider request failed: {0}")]
    Transport(String),

    #[error("identity provider returned status {0}")]
    Status(u16),

    #[error("identity provider returned an unreadable body: {0}")]
    Decode(String),
}

#[derive(Debug, Error)]
pub enum KeyStoreError {
    #[error("api key store unavailable: {0}")]
    Unavailable(String),
}

/// Unexpected authentication failures. Expected outcomes (no credential, bad
/// credential) are `Ok(None)`, not errors.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error(transparent)]
    KeyStore(#[from] KeyStoreError),

    #[error(transparent)]
    Provider(#[from] ProviderError),
}

/// Exchanges a bearer token for an identity.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// `Ok(None)` when the token is not valid.
    async fn verify(&self, token: &str) -> Result<Option<User>, ProviderError>;
}

/// Verifies raw API keys. Owns hashing, expiry and revocation.
#[async_trait]
pub trait ApiKeyStore: Send + Sync {
    /// `Ok(None)` when the key is unknown, revoked or expired.
    async fn verify(&self, raw_key: &str) -> Result<Option<VerifiedKey>, KeyStoreError>;
}
