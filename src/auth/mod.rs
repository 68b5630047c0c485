//! Credential authentication.
//!
//! # Data Flow
//! ```text
//! Request headers
//!     → strategy.rs (bearer, then API key; first success wins)
//!         → IdentityProvider (memory.rs static tokens | remote.rs HTTP)
//!         → ApiKeyStore (memory.rs)
//!     → AuthResult (generic routes) | PluginAuthResult (plugin routes)
//! ```
//!
//! # Design Decisions
//! - "No identity" is `Ok(None)`; only collaborator outages are errors
//! - Scope checks happen in handlers via `has_scope`

pub mod memory;
pub mod remote;
pub mod strategy;
pub mod types;

pub use memory::{MemoryApiKeyStore, StaticIdentityProvider};
pub use remote::RemoteIdentityProvider;
pub use strategy::CredentialAuthenticator;
pub use types::{
    has_scope, ApiKeyInfo, ApiKeyStore, AuthError, AuthResult, AuthType, IdentityProvider,
    KeyStoreError, PluginAuthResult, ProviderError, User, VerifiedKey,
};
