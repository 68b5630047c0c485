//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events, security stream)
//!     → metrics.rs (counters, histograms)
//!     → reporter.rs (unexpected failures, tagged by route)
//!
//! Consumers:
//!     → Log aggregation (stdout, JSON in production)
//!     → Metrics endpoint (Prometheus scrape)
//!     → Error tracking sink
//! ```
//!
//! # Design Decisions
//! - Structured logging (JSON) for machine parsing
//! - Request ID flows through the request span
//! - Metrics are cheap (atomic increments)

pub mod logging;
pub mod metrics;
pub mod reporter;

pub use reporter::{ErrorReporter, TracingReporter};
