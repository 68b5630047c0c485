//! Request-interceptor pipeline for the Renderiq render API.

pub mod auth;
pub mod clock;
pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod platform;
pub mod security;

pub use config::schema::GatewayConfig;
pub use http::{Gateway, HttpServer};
pub use lifecycle::Shutdown;
