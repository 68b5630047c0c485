//! Client for calling the Renderiq render API from a CAD/DCC plugin.
//!
//! ```no_run
//! # async fn run() -> Result<(), plugin_sdk::SdkError> {
//! use plugin_sdk::{Credentials, PluginClient};
//!
//! let client = PluginClient::new("https://api.renderiq.io", "revit", "2.1.0")
//!     .with_credentials(Credentials::ApiKey("rk_live_...".into()));
//! let projects = client.get_json("/api/plugins/projects").await?;
//! println!("{}", projects.data);
//! # Ok(())
//! # }
//! ```

pub mod client;

pub use client::{ApiReply, Credentials, PluginClient, RateLimitStatus, SdkError};
