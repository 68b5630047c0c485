//! Platform detection from request metadata.
//!
//! # Responsibilities
//! - Classify a request as one of the known plugin platforms or `unknown`
//! - Extract the plugin version when the client reveals one
//!
//! # Design Decisions
//! - The explicit platform header wins when it names a known tag; any other value is
//!   ignored, never passed through
//! - User-Agent rules are an ordered list, first match wins
//! - Rules are compiled once on first use

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use axum::http::HeaderMap;
use regex::Regex;
use serde::Serialize;
use thiserror::Error;

use crate::http::request;

/// A calling integration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    SketchUp,
    Revit,
    AutoCad,
    Rhino,
    ArchiCad,
    Blender,
    #[serde(rename = "3dsmax")]
    Max3ds,
    Unknown,
}

impl Platform {
    /// Every platform a plugin can declare. `Unknown` is deliberately absent.
    pub const KNOWN: [Platform; 7] = [
        Platform::SketchUp,
        Platform::Revit,
        Platform::AutoCad,
        Platform::Rhino,
        Platform::ArchiCad,
        Platform::Blender,
        Platform::Max3ds,
    ];

    /// Lowercase tag, as sent in headers and persisted alongside records.
    pub fn as_str(self) -> &'static str {
        match self {
            Platform::SketchUp => "sketchup",
            Platform::Revit => "revit",
            Platform::AutoCad => "autocad",
            Platform::Rhino => "rhino",
            Platform::ArchiCad => "archicad",
            Platform::Blender => "blender",
            Platform::Max3ds => "3dsmax",
            Platform::Unknown => "unknown",
        }
    }

    /// Parse a declared tag. Only known platforms are accepted.
    pub fn from_declared(tag: &str) -> Option<Platform> {
        let tag = tag.trim();
        Platform::KNOWN
            .into_iter()
            .find(|p| p.as_str().eq_ignore_ascii_case(tag))
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown platform tag `{0}`")]
pub struct UnknownPlatform(pub String);

impl FromStr for Platform {
    type Err = UnknownPlatform;

    /// Accepts every tag including `unknown`; used for configuration keys.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().eq_ignore_ascii_case(Platform::Unknown.as_str()) {
            return Ok(Platform::Unknown);
        }
        Platform::from_declared(s).ok_or_else(|| UnknownPlatform(s.to_string()))
    }
}

/// What the detector concluded about one request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlatformInfo {
    pub platform: Platform,
    pub version: Option<String>,
    pub user_agent: String,
}

impl PlatformInfo {
    pub fn is_plugin_request(&self) -> bool {
        self.platform != Platform::Unknown
    }
}

struct UaRule {
    platform: Platform,
    detect: Regex,
    version: Option<Regex>,
}

impl UaRule {
    fn new(platform: Platform, detect: &str, version: Option<&str>) -> Self {
        Self {
            platform,
            detect: Regex::new(detect).expect("valid platform pattern"),
            version: version.map(|v| Regex::new(v).expect("valid version pattern")),
        }
    }

    fn version_of(&self, user_agent: &str) -> Option<String> {
        self.version
            .as_ref()?
            .captures(user_agent)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_string())
    }
}

// Order matters: "3ds Max" must be tried before anything that could match "max".
static UA_RULES: LazyLock<Vec<UaRule>> = LazyLock::new(|| {
    vec![
        UaRule::new(
            Platform::SketchUp,
            r"(?i)sketchup",
            Some(r"(?i)sketchup[^/\s]*/v?(\d+(?:\.\d+)*)"),
        ),
        UaRule::new(
            Platform::Revit,
            r"(?i)revit",
            Some(r"(?i)revit[^/\s]*/v?(\d+(?:\.\d+)*)"),
        ),
        UaRule::new(
            Platform::AutoCad,
            r"(?i)autocad",
            Some(r"(?i)autocad[^/\s]*/v?(\d+(?:\.\d+)*)"),
        ),
        UaRule::new(
            Platform::Max3ds,
            r"(?i)3ds\s?max",
            Some(r"(?i)3ds\s?max[^/\s]*/v?(\d+(?:\.\d+)*)"),
        ),
        UaRule::new(
            Platform::ArchiCad,
            r"(?i)archicad",
            Some(r"(?i)archicad[^/\s]*/v?(\d+(?:\.\d+)*)"),
        ),
        UaRule::new(
            Platform::Rhino,
            r"(?i)rhino(ceros)?",
            Some(r"(?i)rhino[^/\s]*/v?(\d+(?:\.\d+)*)"),
        ),
        UaRule::new(
            Platform::Blender,
            r"(?i)blender",
            Some(r"(?i)blender[^/\s]*/v?(\d+(?:\.\d+)*)"),
        ),
    ]
});

/// Stateless classifier; the rule table is shared process-wide.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlatformDetector;

impl PlatformDetector {
    pub fn detect(&self, headers: &HeaderMap) -> PlatformInfo {
        let user_agent = request::user_agent(headers).to_string();

        if let Some(platform) = request::platform_header(headers).and_then(Platform::from_declared)
        {
            let version = request::plugin_version_header(headers)
                .map(str::to_string)
                .or_else(|| rule_for(platform).and_then(|r| r.version_of(&user_agent)));
            return PlatformInfo {
                platform,
                version,
                user_agent,
            };
        }

        match UA_RULES.iter().find(|r| r.detect.is_match(&user_agent)) {
            Some(rule) => PlatformInfo {
                platform: rule.platform,
                version: request::plugin_version_header(headers)
                    .map(str::to_string)
                    .or_else(|| rule.version_of(&user_agent)),
                user_agent,
            },
            None => PlatformInfo {
                platform: Platform::Unknown,
                version: None,
                user_agent,
            },
        }
    }
}

fn rule_for(platform: Platform) -> Option<&'static UaRule> {
    UA_RULES.iter().find(|r| r.platform == platform)
}
