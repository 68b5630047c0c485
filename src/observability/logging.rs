//! Structured logging.
//!
//! # Responsibilities
//! - Initialize the tracing subscriber
//! - Configure log level from config, overridable with `RUST_LOG`
//!
//! # Design Decisions
//! - Uses tracing crate for structured logging
//! - JSON format for production, pretty format for development
//! - Security events share the subscriber under `target: "security"`

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Environment;

/// Default directive when `RUST_LOG` is unset: the configured level for this crate, the
/// security stream and the error-report stream, `info` for tower-http.
fn default_filter(level: &str) -> String {
    format!("render_gateway={level},security={level},error_report={level},tower_http=info")
}

/// Initialize logging once per process. Later calls are ignored.
pub fn init_tracing(level: &str, environment: Environment) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_filter(level)))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let registry = tracing_subscriber::registry().with(filter);
    let result = if environment.is_development() {
        registry.with(fmt::layer().pretty()).try_init()
    } else {
        registry
            .with(fmt::layer().json().with_target(true).flatten_event(true))
            .try_init()
    };

    if result.is_ok() {
        tracing::info!(level, ?environment, "Logging initialized");
    }
}
