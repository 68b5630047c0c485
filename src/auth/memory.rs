//! In-process credential collaborators.
//!
//! # Responsibilities
//! - `StaticIdentityProvider`: fixed bearer tokens for development and tests
//! - `MemoryApiKeyStore`: API key issue, verify, revoke and listing
//!
//! # Design Decisions
//! - Keys look like `rk_live_<32 hex>`; only the SHA-256 hex digest is kept
//! - Digests are compared in constant time against every stored key
//! - Inactive and expired keys verify as `None`, never as an error
//! - A successful verify records `last_used_at_ms`

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use rand::RngCore;
use serde::Serialize;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use uuid::Uuid;

use crate::auth::types::{
    ApiKeyInfo, ApiKeyStore, IdentityProvider, KeyStoreError, ProviderError, User, VerifiedKey,
};
use crate::clock::{Clock, SystemClock};
use crate::config::{ApiKeyConfig, StaticTokenConfig};

pub const KEY_PREFIX: &str = "rk_live_";
const DISPLAY_PREFIX_LEN: usize = 15;

/// Bearer tokens that resolve to fixed users.
#[derive(Debug, Clone, Default)]
pub struct StaticIdentityProvider {
    tokens: HashMap<String, User>,
}

impl StaticIdentityProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(tokens: &[StaticTokenConfig]) -> Self {
        tokens.iter().fold(Self::new(), |provider, t| {
            let user = User {
                id: t.user_id.clone(),
                email: t.email.clone(),
            };
            provider.with_token(t.token.clone(), user)
        })
    }

    pub fn with_token(mut self, token: impl Into<String>, user: User) -> Self {
        self.tokens.insert(token.into(), user);
        self
    }
}

#[async_trait]
impl IdentityProvider for StaticIdentityProvider {
    async fn verify(&self, token: &str) -> Result<Option<User>, ProviderError> {
        Ok(self.tokens.get(token).cloned())
    }
}

/// Generate a new raw key and its digest.
pub fn generate_api_key() -> (String, String) {
    let mut bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut bytes);
    let key = format!("{KEY_PREFIX}{}", hex::encode(bytes));
    let hash = hash_api_key(&key);
    (key, hash)
}

/// SHA-256 of the raw key, lowercase hex.
pub fn hash_api_key(key: &str) -> String {
    hex::encode(Sha256::digest(key.as_bytes()))
}

/// A stored key. The raw key is never kept.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiKeyRecord {
    pub id: String,
    pub user_id: String,
    pub name: String,
    pub key_prefix: String,
    #[serde(skip)]
    pub key_hash: String,
    pub scopes: BTreeSet<String>,
    pub expires_at_ms: Option<u64>,
    pub is_active: bool,
    pub created_at_ms: u64,
    pub last_used_at_ms: Option<u64>,
}

/// Returned once, at creation. The raw `key` is not recoverable afterwards.
#[derive(Debug, Clone)]
pub struct CreatedApiKey {
    pub key: String,
    pub record: ApiKeyRecord,
}

pub struct MemoryApiKeyStore {
    keys: DashMap<String, ApiKeyRecord>,
    clock: Arc<dyn Clock>,
}

impl MemoryApiKeyStore {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            keys: DashMap::new(),
            clock,
        }
    }

    /// Seed from configuration. Config entries carry the digest, never the raw key.
    pub fn from_config(keys: &[ApiKeyConfig]) -> Self {
        let store = Self::new();
        for k in keys {
            store.insert(ApiKeyRecord {
                id: k.id.clone(),
                user_id: k.user_id.clone(),
                name: k.name.clone(),
                key_prefix: String::new(),
                key_hash: k.key_hash.to_ascii_lowercase(),
                scopes: k.scopes.iter().cloned().collect(),
                expires_at_ms: k.expires_at_ms,
                is_active: k.is_active,
                created_at_ms: 0,
                last_used_at_ms: None,
            });
        }
        store
    }

    pub fn insert(&self, record: ApiKeyRecord) {
        self.keys.insert(record.id.clone(), record);
    }

    /// Issue a new key for `user_id`.
    pub fn create<I, S>(
        &self,
        user_id: &str,
        name: &str,
        scopes: I,
        expires_at_ms: Option<u64>,
    ) -> CreatedApiKey
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let (key, key_hash) = generate_api_key();
        let record = ApiKeyRecord {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            name: name.to_string(),
            key_prefix: key[..DISPLAY_PREFIX_LEN].to_string(),
            key_hash,
            scopes: scopes.into_iter().map(Into::into).collect(),
            expires_at_ms,
            is_active: true,
            created_at_ms: self.clock.now_ms(),
            last_used_at_ms: None,
        };
        self.insert(record.clone());
        tracing::info!(key_id = %record.id, user_id = %record.user_id, prefix = %record.key_prefix, "API key created");
        CreatedApiKey { key, record }
    }

    /// Deactivate a key owned by `user_id`. Returns whether a key was revoked.
    pub fn revoke(&self, id: &str, user_id: &str) -> bool {
        match self.keys.get_mut(id) {
            Some(mut record) if record.user_id == user_id => {
                record.is_active = false;
                tracing::info!(key_id = %id, "API key revoked");
                true
            }
            _ => false,
        }
    }

    /// Keys owned by `user_id`, newest first.
    pub fn list_by_user(&self, user_id: &str) -> Vec<ApiKeyRecord> {
        let mut keys: Vec<_> = self
            .keys
            .iter()
            .filter(|r| r.user_id == user_id)
            .map(|r| r.value().clone())
            .collect();
        keys.sort_by(|a, b| b.created_at_ms.cmp(&a.created_at_ms));
        keys
    }

    pub fn get(&self, id: &str) -> Option<ApiKeyRecord> {
        self.keys.get(id).map(|r| r.value().clone())
    }

    fn find_by_hash(&self, hash: &str) -> Option<String> {
        let mut found = None;
        for record in self.keys.iter() {
            let stored = record.key_hash.as_bytes();
            let matches = stored.len() == hash.len() && bool::from(stored.ct_eq(hash.as_bytes()));
            if matches && found.is_none() {
                found = Some(record.id.clone());
            }
        }
        found
    }
}

impl Default for MemoryApiKeyStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ApiKeyStore for MemoryApiKeyStore {
    async fn verify(&self, raw_key: &str) -> Result<Option<VerifiedKey>, KeyStoreError> {
        let hash = hash_api_key(raw_key);
        let Some(id) = self.find_by_hash(&hash) else {
            return Ok(None);
        };
        let Some(mut record) = self.keys.get_mut(&id) else {
            return Ok(None);
        };

        if !record.is_active {
            tracing::warn!(key_id = %record.id, "Inactive API key presented");
            return Ok(None);
        }
        let now = self.clock.now_ms();
        if record.expires_at_ms.is_some_and(|expires| expires < now) {
            tracing::warn!(key_id = %record.id, "Expired API key presented");
            return Ok(None);
        }

        record.last_used_at_ms = Some(now);
        Ok(Some(VerifiedKey {
            user: User::new(record.user_id.clone()),
            api_key: ApiKeyInfo {
                id: record.id.clone(),
                scopes: record.scopes.clone(),
            },
        }))
    }
}
