//! bimgate server binary.

use anyhow::{Context, Result};
use bimgate_core::config::AppConfig;
use bimgate_server::{AppState, create_router};
use clap::Parser;
use figment::Figment;
use figment::providers::{Env, Format, Toml};
use std::net::SocketAddr;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// bimgate - DeepDeepBim add-in update gateway
#[derive(Parser, Debug)]
#[command(name = "bimgated")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(
        short,
        long,
        env = "BIMGATE_CONFIG",
        default_value = "config/server.toml"
    )]
    config: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments
    let args = Args::parse();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("bimgate v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration (file is optional, env vars can provide/override everything)
    let config_path = std::path::Path::new(&args.config);
    let mut figment = Figment::new();
    let has_config_file = config_path.exists();

    if has_config_file {
        tracing::info!(config_path = %args.config, "Loading configuration from file");
        figment = figment.merge(Toml::file(&args.config));
    } else {
        tracing::debug!("No config file found at {}", args.config);
    }

    // Check for BIMGATE_ environment variables (excluding BIMGATE_CONFIG which is just the path)
    let has_env_config =
        std::env::vars().any(|(key, _)| key.starts_with("BIMGATE_") && key != "BIMGATE_CONFIG");

    if !has_config_file && !has_env_config {
        anyhow::bail!(
            "No configuration provided.\n\n\
             Provide configuration via one of:\n  \
             1. Config file: bimgated --config /path/to/config.toml\n  \
             2. Environment variables: BIMGATE_STORAGE__BUCKET=addin-updates \
             BIMGATE_AUTH__UPDATE_KEY=YOUR_KEY bimgated\n\n\
             See config/server.example.toml for example configuration.\n\
             Set BIMGATE_CONFIG env var to specify a default config file path."
        );
    }

    if !has_config_file {
        tracing::info!("Using environment variables for configuration");
    }

    let config: AppConfig = figment
        .merge(Env::prefixed("BIMGATE_").split("__"))
        .extract()
        .context("failed to load configuration")?;

    // Register Prometheus metrics
    bimgate_server::metrics::register_metrics();

    // Initialize storage backend. Missing S3 credentials abort here.
    let storage = bimgate_storage::from_config(&config.storage)
        .await
        .context("failed to initialize storage")?;
    tracing::info!(backend = storage.backend_name(), "Storage backend initialized");

    // Probe the configured bucket so connectivity problems surface in the
    // startup log instead of the first caller's 500. Non-fatal: the
    // bucket is a request-time concern.
    if let Some(bucket) = config.storage.bucket().filter(|b| !b.is_empty()) {
        match storage.list_objects(bucket).await {
            Ok(objects) => {
                tracing::info!(bucket = %bucket, objects = objects.len(), "Storage bucket reachable");
            }
            Err(e) => {
                tracing::warn!(
                    bucket = %bucket,
                    error = %e,
                    "Storage bucket probe failed; update requests may answer 500"
                );
            }
        }
    }

    // Create application state and router
    let state = AppState::new(config.clone(), storage);
    let app = create_router(state);

    // Parse bind address
    let addr: SocketAddr = config.server.bind.parse().context("invalid bind address")?;

    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind to {}", addr))?;
    axum::serve(listener, app).await?;

    Ok(())
}
