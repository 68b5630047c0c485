//! Per-platform rate-limit policies and plugin bucket identifiers.

use std::collections::HashMap;

use crate::platform::detect::Platform;
use crate::security::rate_limit::RateLimitConfig;

const WINDOW_MS: u64 = 60_000;

/// Built-in policy for a platform. Hosts that issue few, large calls get tighter budgets
/// than those that burst; `Unknown` gets the tightest.
pub const fn default_policy(platform: Platform) -> RateLimitConfig {
    let max_requests = match platform {
        Platform::SketchUp => 60,
        Platform::Revit => 30,
        Platform::AutoCad => 30,
        Platform::Rhino => 60,
        Platform::ArchiCad => 30,
        Platform::Blender => 90,
        Platform::Max3ds => 30,
        Platform::Unknown => 20,
    };
    RateLimitConfig::new(max_requests, WINDOW_MS)
}

/// Policy table with operator overrides applied.
#[derive(Debug, Clone, Default)]
pub struct PlatformPolicies {
    overrides: HashMap<Platform, RateLimitConfig>,
}

impl PlatformPolicies {
    /// Build from configuration keyed by platform tag. Keys that do not name a platform
    /// are skipped; config validation reports them.
    pub fn from_config(overrides: &HashMap<String, RateLimitConfig>) -> Self {
        let overrides = overrides
            .iter()
            .filter_map(|(tag, limit)| Some((tag.parse::<Platform>().ok()?, *limit)))
            .collect();
        Self { overrides }
    }

    pub fn with_override(mut self, platform: Platform, limit: RateLimitConfig) -> Self {
        self.overrides.insert(platform, limit);
        self
    }

    pub fn policy_for(&self, platform: Platform) -> RateLimitConfig {
        self.overrides
            .get(&platform)
            .copied()
            .unwrap_or_else(|| default_policy(platform))
    }
}

/// Rate-limit bucket for a plugin caller: per user when authenticated, per IP otherwise,
/// always namespaced by platform.
pub fn plugin_identifier(platform: Platform, user_id: Option<&str>, ip: &str) -> String {
    match user_id {
        Some(user_id) => format!("plugin:{platform}:user:{user_id}"),
        None => format!("plugin:{platform}:ip:{ip}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let policies = PlatformPolicies::default();
        assert_eq!(policies.policy_for(Platform::Blender).max_requests, 90);
        assert_eq!(policies.policy_for(Platform::Revit).max_requests, 30);
        assert_eq!(policies.policy_for(Platform::Unknown).max_requests, 20);
        for platform in Platform::KNOWN {
            let policy = policies.policy_for(platform);
            assert_eq!(policy.window_ms, 60_000);
            assert!(policy.max_requests > policies.policy_for(Platform::Unknown).max_requests);
        }
    }

    #[test]
    fn test_config_overrides() {
        let mut raw = HashMap::new();
        raw.insert("revit".to_string(), RateLimitConfig::new(5, 1_000));
        raw.insert("maya".to_string(), RateLimitConfig::new(1, 1));
        let policies = PlatformPolicies::from_config(&raw);

        assert_eq!(policies.policy_for(Platform::Revit), RateLimitConfig::new(5, 1_000));
        assert_eq!(policies.policy_for(Platform::SketchUp).max_requests, 60);
    }

    #[test]
    fn test_plugin_identifiers_are_namespaced() {
        assert_eq!(
            plugin_identifier(Platform::Revit, Some("u1"), "10.0.0.1"),
            "plugin:revit:user:u1"
        );
        assert_eq!(
            plugin_identifier(Platform::Max3ds, None, "10.0.0.1"),
            "plugin:3dsmax:ip:10.0.0.1"
        );
    }
}
