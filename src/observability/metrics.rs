//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define gateway metrics (requests, latency, limiter, auth, CORS)
//! - Expose a Prometheus-compatible scrape endpoint
//!
//! # Metrics
//! - `gateway_requests_total` (counter): requests by route, status
//! - `gateway_request_duration_seconds` (histogram): latency by route
//! - `gateway_rate_limited_total` (counter): 429s by limiter scope
//! - `gateway_auth_total` (counter): authentication attempts by scheme, outcome
//! - `gateway_cors_rejected_total` (counter): untrusted origins seen
//!
//! # Design Decisions
//! - Recording is a no-op until a recorder is installed, so tests need no setup
//! - Labels stay low-cardinality: route names, never identifiers or IPs

use std::net::SocketAddr;
use std::time::Duration;

use metrics::{counter, describe_counter, describe_histogram, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus recorder and its HTTP listener.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;

    describe_counter!("gateway_requests_total", "Requests handled, by route and status");
    describe_histogram!(
        "gateway_request_duration_seconds",
        "Time spent in the route pipeline"
    );
    describe_counter!("gateway_rate_limited_total", "Requests rejected by the rate limiter");
    describe_counter!("gateway_auth_total", "Authentication attempts by scheme and outcome");
    describe_counter!("gateway_cors_rejected_total", "Requests from untrusted origins");

    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

pub fn record_request(route: &str, status: u16, elapsed: Duration) {
    counter!(
        "gateway_requests_total",
        "route" => route.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    histogram!("gateway_request_duration_seconds", "route" => route.to_string())
        .record(elapsed.as_secs_f64());
}

/// `scope` is `"ip"` for generic routes or the platform tag for plugin routes.
pub fn record_rate_limited(scope: &str) {
    counter!("gateway_rate_limited_total", "scope" => scope.to_string()).increment(1);
}

pub fn record_auth(scheme: &'static str, success: bool) {
    let outcome = if success { "success" } else { "anonymous" };
    counter!("gateway_auth_total", "scheme" => scheme, "outcome" => outcome).increment(1);
}

pub fn record_cors_rejected() {
    counter!("gateway_cors_rejected_total").increment(1);
}
