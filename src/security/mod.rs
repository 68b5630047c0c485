//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → cors.rs (OPTIONS short-circuit, origin verdict)
//!     → limits.rs (declared body size)
//!     → rate_limit.rs (fixed window per identifier)
//!     → Pass to authentication
//! Outgoing response:
//!     → cors.rs (attach headers, error responses included)
//! ```
//!
//! # Design Decisions
//! - Fail closed: an origin that cannot be parsed is untrusted
//! - Security events are enqueued, never awaited (audit.rs)
//! - No trust in client input

pub mod audit;
pub mod cors;
pub mod limits;
pub mod origin;
pub mod rate_limit;

pub use audit::{SecurityLevel, SecurityLog};
pub use cors::{CorsNegotiator, CorsOptions};
pub use origin::OriginValidator;
pub use rate_limit::{FixedWindowLimiter, RateLimitConfig, RateLimitDecision, RateLimiter};
