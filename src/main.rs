//! Renderiq render gateway.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client / CAD plugin
//!            │
//!            ▼
//!     ┌──────────────┐   request ID, tracing
//!     │ http::server │
//!     └──────┬───────┘
//!            ▼
//!     ┌──────────────────────────────────────────────┐
//!     │ route wrapper (generic | plugin | adaptive)  │
//!     │   CORS · body guard · rate limit · auth      │
//!     │   platform detection · failure handling      │
//!     └──────┬───────────────────────────────────────┘
//!            ▼
//!        handler
//! ```

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use render_gateway::config::resolve_config;
use render_gateway::lifecycle::{shutdown_on_signal, Shutdown};
use render_gateway::observability::{logging, metrics};
use render_gateway::HttpServer;

#[derive(Parser, Debug)]
#[command(name = "render-gateway", version, about = "Renderiq render API gateway")]
struct Args {
    /// Path to a TOML configuration file. Defaults apply when omitted.
    #[arg(short, long, env = "RENDER_GATEWAY_CONFIG")]
    config: Option<PathBuf>,

    /// Override the listener bind address.
    #[arg(long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = resolve_config(args.config.as_deref(), args.bind)?;

    logging::init_tracing(&config.observability.log_level, config.environment);
    tracing::info!("render-gateway v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.listener.bind_address,
        environment = ?config.environment,
        allowed_domains = config.cors.allowed_domains.len(),
        api_keys = config.auth.api_keys.len(),
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr)?,
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    let shutdown = Shutdown::new();
    tokio::spawn(shutdown_on_signal(shutdown.clone()));

    HttpServer::new(config).run(listener, shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
