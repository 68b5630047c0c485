//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (limits > 0, addresses parse)
//! - Reject CORS option combinations that would leak credentials
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GatewayConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use thiserror::Error;
use url::Url;

use crate::config::schema::GatewayConfig;
use crate::platform::Platform;
use crate::security::rate_limit::RateLimitConfig;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("invalid bind address `{0}`")]
    BindAddress(String),

    #[error("invalid metrics address `{0}`")]
    MetricsAddress(String),

    #[error("cors: skip_origin_check cannot be combined with allow_credentials")]
    WildcardWithCredentials,

    #[error("cors: allowed domain `{0}` must be a bare host name")]
    AllowedDomain(String),

    #[error("unknown platform `{0}` in rate limit overrides")]
    UnknownPlatform(String),

    #[error("rate limit `{scope}`: max_requests and window_ms must be greater than zero")]
    RateLimit { scope: String },

    #[error("identity provider url `{0}` is not a valid http(s) url")]
    IdentityProviderUrl(String),

    #[error("static token for user `{0}` is empty")]
    EmptyToken(String),

    #[error("api key `{0}`: key_hash must be 64 lowercase hex characters")]
    ApiKeyHash(String),
}

/// Validate the whole configuration, collecting every problem.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::BindAddress(
            config.listener.bind_address.clone(),
        ));
    }

    if config.observability.metrics_enabled
        && config
            .observability
            .metrics_address
            .parse::<SocketAddr>()
            .is_err()
    {
        errors.push(ValidationError::MetricsAddress(
            config.observability.metrics_address.clone(),
        ));
    }

    let cors = &config.cors.options;
    if cors.skip_origin_check && cors.allow_credentials {
        errors.push(ValidationError::WildcardWithCredentials);
    }

    for domain in &config.cors.allowed_domains {
        if !is_bare_host(domain) {
            errors.push(ValidationError::AllowedDomain(domain.clone()));
        }
    }

    check_limit("default", &config.rate_limit, &mut errors);
    for (tag, limit) in &config.platforms {
        if tag.parse::<Platform>().is_err() {
            errors.push(ValidationError::UnknownPlatform(tag.clone()));
        }
        check_limit(tag, limit, &mut errors);
    }

    if let Some(raw) = &config.auth.identity_provider_url {
        let valid = Url::parse(raw)
            .map(|u| matches!(u.scheme(), "http" | "https"))
            .unwrap_or(false);
        if !valid {
            errors.push(ValidationError::IdentityProviderUrl(raw.clone()));
        }
    }

    for token in &config.auth.static_tokens {
        if token.token.trim().is_empty() {
            errors.push(ValidationError::EmptyToken(token.user_id.clone()));
        }
    }

    for key in &config.auth.api_keys {
        let hex = key.key_hash.len() == 64
            && key
                .key_hash
                .chars()
                .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c));
        if !hex {
            errors.push(ValidationError::ApiKeyHash(key.id.clone()));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_limit(scope: &str, limit: &RateLimitConfig, errors: &mut Vec<ValidationError>) {
    if limit.max_requests == 0 || limit.window_ms == 0 {
        errors.push(ValidationError::RateLimit {
            scope: scope.to_string(),
        });
    }
}

fn is_bare_host(domain: &str) -> bool {
    !domain.is_empty()
        && domain
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::{ApiKeyConfig, StaticTokenConfig};

    #[test]
    fn test_default_config_is_valid() {
        assert_eq!(validate_config(&GatewayConfig::default()), Ok(()));
    }

    #[test]
    fn test_wildcard_with_credentials_is_rejected() {
        let mut config = GatewayConfig::default();
        config.cors.options.skip_origin_check = true;
        config.cors.options.allow_credentials = true;
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors, vec![ValidationError::WildcardWithCredentials]);

        config.cors.options.allow_credentials = false;
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_collects_all_errors() {
        let mut config = GatewayConfig::default();
        config.listener.bind_address = "nowhere".into();
        config.cors.allowed_domains.push("https://renderiq.io".into());
        config.rate_limit.window_ms = 0;
        config.platforms.insert(
            "blender".into(),
            RateLimitConfig {
                max_requests: 0,
                window_ms: 1000,
            },
        );
        config.platforms.insert("maya".into(), RateLimitConfig::default());
        config.auth.identity_provider_url = Some("ftp://auth.example".into());
        config.auth.static_tokens.push(StaticTokenConfig {
            token: " ".into(),
            user_id: "u1".into(),
            email: None,
        });
        config.auth.api_keys.push(ApiKeyConfig {
            id: "k1".into(),
            user_id: "u1".into(),
            name: String::new(),
            key_hash: "not-a-hash".into(),
            scopes: vec![],
            expires_at_ms: None,
            is_active: true,
        });

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 8);
        assert!(errors.contains(&ValidationError::RateLimit {
            scope: "blender".into()
        }));
        assert!(errors.contains(&ValidationError::ApiKeyHash("k1".into())));
        assert!(errors.contains(&ValidationError::UnknownPlatform("maya".into())));
    }
}
