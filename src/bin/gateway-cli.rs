use std::path::PathBuf;

use axum::http::{HeaderMap, HeaderValue};
use clap::{Parser, Subcommand};
use serde::Serialize;
use serde_json::Value;

use render_gateway::auth::memory::generate_api_key;
use render_gateway::config::{load_config, ApiKeyConfig, GatewayConfig};
use render_gateway::http::request::{X_API_KEY, X_PLATFORM, X_PLUGIN_VERSION};
use render_gateway::platform::{PlatformDetector, PlatformPolicies};
use render_gateway::security::rate_limit::{X_RATELIMIT_LIMIT, X_RATELIMIT_REMAINING, X_RATELIMIT_RESET};
use render_gateway::security::OriginValidator;

#[derive(Parser)]
#[command(name = "gateway-cli")]
#[command(about = "Operator tooling for the render gateway", long_about = None)]
struct Cli {
    /// Gateway configuration used by checks that depend on it.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Issue an API key and print the config entry that provisions it
    Keygen {
        #[arg(long)]
        user_id: String,
        #[arg(long, default_value = "cli")]
        name: String,
        /// Scope granted to the key; repeatable
        #[arg(long = "scope")]
        scopes: Vec<String>,
    },
    /// Check an Origin against the configured allow-list
    CheckOrigin { origin: String },
    /// Show how a request would be classified and limited
    Detect {
        #[arg(long)]
        user_agent: Option<String>,
        #[arg(long)]
        platform: Option<String>,
        #[arg(long)]
        plugin_version: Option<String>,
    },
    /// Call a running gateway and print its rate-limit headers
    Probe {
        url: String,
        #[arg(long)]
        token: Option<String>,
        #[arg(long)]
        api_key: Option<String>,
        #[arg(long)]
        platform: Option<String>,
    },
}

#[derive(Serialize)]
struct KeySnippet<'a> {
    auth: KeySnippetAuth<'a>,
}

#[derive(Serialize)]
struct KeySnippetAuth<'a> {
    api_keys: [&'a ApiKeyConfig; 1],
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => GatewayConfig::default(),
    };

    match cli.command {
        Commands::Keygen {
            user_id,
            name,
            scopes,
        } => {
            let (key, key_hash) = generate_api_key();
            let entry = ApiKeyConfig {
                id: uuid::Uuid::new_v4().to_string(),
                user_id,
                name,
                key_hash,
                scopes,
                expires_at_ms: None,
                is_active: true,
            };
            println!("API key (shown once): {key}");
            println!();
            print!(
                "{}",
                toml::to_string(&KeySnippet {
                    auth: KeySnippetAuth { api_keys: [&entry] },
                })?
            );
        }
        Commands::CheckOrigin { origin } => {
            let validator =
                OriginValidator::new(&config.cors.allowed_domains, config.environment);
            if validator.is_allowed(&origin) {
                println!("allowed: {origin}");
            } else {
                println!("rejected: {origin}");
                std::process::exit(1);
            }
        }
        Commands::Detect {
            user_agent,
            platform,
            plugin_version,
        } => {
            let mut headers = HeaderMap::new();
            if let Some(ua) = user_agent {
                headers.insert(axum::http::header::USER_AGENT, HeaderValue::from_str(&ua)?);
            }
            if let Some(p) = platform {
                headers.insert(X_PLATFORM, HeaderValue::from_str(&p)?);
            }
            if let Some(v) = plugin_version {
                headers.insert(X_PLUGIN_VERSION, HeaderValue::from_str(&v)?);
            }

            let info = PlatformDetector.detect(&headers);
            let policy = PlatformPolicies::from_config(&config.platforms).policy_for(info.platform);
            let output = serde_json::json!({
                "platform": info,
                "isPlugin": info.is_plugin_request(),
                "rateLimit": policy,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        Commands::Probe {
            url,
            token,
            api_key,
            platform,
        } => {
            let client = reqwest::Client::new();
            let mut request = client.get(&url);
            if let Some(token) = token {
                request = request.bearer_auth(token);
            }
            if let Some(key) = api_key {
                request = request.header(X_API_KEY.as_str(), key);
            }
            if let Some(p) = platform {
                request = request.header(X_PLATFORM.as_str(), p);
            }
            print_response(request.send().await?).await?;
        }
    }

    Ok(())
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    println!("status: {}", res.status());
    for name in [X_RATELIMIT_LIMIT, X_RATELIMIT_REMAINING, X_RATELIMIT_RESET] {
        if let Some(value) = res.headers().get(name.as_str()) {
            println!("{}: {}", name, value.to_str().unwrap_or("<binary>"));
        }
    }
    if let Some(retry) = res.headers().get("retry-after") {
        println!("retry-after: {}", retry.to_str().unwrap_or("<binary>"));
    }

    let text = res.text().await?;
    match serde_json::from_str::<Value>(&text) {
        Ok(json) => println!("{}", serde_json::to_string_pretty(&json)?),
        Err(_) => println!("{text}"),
    }
    Ok(())
}
