//! HTTP surface and the route-wrapper orchestrator.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum router, request ID, tracing)
//!     → route.rs   (generic pipeline)  ┐
//!       plugin.rs  (plugin pipeline)   ├─ built from gateway.rs
//!       AdaptiveRoute (picks one)      ┘
//!     → handler
//!     → error.rs / response.rs (uniform envelope)
//! ```

pub mod error;
pub mod gateway;
pub mod plugin;
pub mod request;
pub mod response;
pub mod route;
pub mod server;

pub use error::{ApiError, ErrorCategory, ErrorCode, GatewayError, HandlerFailure};
pub use gateway::{Gateway, GatewayBuilder};
pub use plugin::{PluginRoute, PluginRouteConfig};
pub use request::X_REQUEST_ID;
pub use response::ApiResponse;
pub use route::{AdaptiveRoute, ApiRoute, ApiRouteConfig, ErrorHook};
pub use server::HttpServer;
