//! External error tracking.
//!
//! The route wrapper hands every unexpected failure to an `ErrorReporter`, tagged with
//! the route name. Reporting is fire-and-forget: implementations must not block.

use crate::http::error::GatewayError;

pub trait ErrorReporter: Send + Sync {
    fn capture(&self, route: &str, error: &GatewayError);
}

/// Reports into the log stream under `target: "error_report"`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingReporter;

impl ErrorReporter for TracingReporter {
    fn capture(&self, route: &str, error: &GatewayError) {
        tracing::error!(target: "error_report", route, error = %error, "Captured route failure");
    }
}
