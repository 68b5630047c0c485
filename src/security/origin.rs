//! Origin allow-list.

use url::Url;

use crate::config::Environment;

const LOCAL_HOSTS: [&str; 2] = ["localhost", "127.0.0.1"];

/// Decides whether an `Origin` is trusted.
///
/// An origin is trusted when its host equals an allow-listed domain or is a subdomain of
/// one. Local hosts are trusted only in development mode. Origins that do not parse as a
/// URL with a host are never trusted.
#[derive(Debug, Clone)]
pub struct OriginValidator {
    domains: Vec<String>,
    allow_local: bool,
}

impl OriginValidator {
    pub fn new<I, S>(domains: I, environment: Environment) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            domains: domains
                .into_iter()
                .map(|d| d.as_ref().trim().to_ascii_lowercase())
                .filter(|d| !d.is_empty())
                .collect(),
            allow_local: environment.is_development(),
        }
    }

    pub fn is_allowed(&self, origin: &str) -> bool {
        let Ok(url) = Url::parse(origin) else {
            return false;
        };
        let Some(host) = url.host_str() else {
            return false;
        };
        let host = host.to_ascii_lowercase();

        if self.allow_local && LOCAL_HOSTS.contains(&host.as_str()) {
            return true;
        }

        self.domains.iter().any(|domain| {
            host == *domain
                || host
                    .strip_suffix(domain.as_str())
                    .is_some_and(|prefix| prefix.ends_with('.'))
        })
    }
}
