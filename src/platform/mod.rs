//! Plugin platform detection and per-platform policy.

pub mod detect;
pub mod policy;

pub use detect::{Platform, PlatformDetector, PlatformInfo};
pub use policy::{plugin_identifier, PlatformPolicies};
