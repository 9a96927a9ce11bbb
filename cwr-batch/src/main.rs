//! cwr-batch - Batch Plugin Solver service
//!
//! Runs a decoding plugin over a batch of geocache records and streams the
//! coordinates it finds to every connected context.

use anyhow::{Context, Result};
use clap::Parser;
use cwr_common::config::{default_config_path, load_toml_config};
use std::net::SocketAddr;
use std::path::PathBuf;
use tokio::signal;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, reload, util::SubscriberInitExt, EnvFilter};

use cwr_batch::config::{log_directives, CliOverrides, ServiceConfig, MODULE_NAME};
use cwr_batch::AppState;

/// Command-line arguments for cwr-batch
#[derive(Parser, Debug)]
#[command(name = "cwr-batch")]
#[command(about = "Batch plugin solver for Cachewright")]
#[command(version)]
struct Args {
    /// Port to listen on
    #[arg(short, long)]
    port: Option<u16>,

    /// Backend base URL hosting plugins and geocaches
    #[arg(short, long)]
    backend_url: Option<String>,

    /// TOML config file (defaults to ~/.config/cachewright/cwr-batch.toml)
    #[arg(short, long, env = "CWR_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Log at info until the config file is read; RUST_LOG always wins
    let env_filter = EnvFilter::try_from_default_env().ok();
    let explicit_filter = env_filter.is_some();
    let (filter, filter_handle) = reload::Layer::new(
        env_filter.unwrap_or_else(|| EnvFilter::new(log_directives("info"))),
    );
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    let toml_config = match args.config.clone().or_else(|| default_config_path(MODULE_NAME)) {
        Some(path) => load_toml_config(&path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => Default::default(),
    };

    if !explicit_filter {
        let level = &toml_config.logging.level;
        let configured = EnvFilter::try_new(log_directives(level))
            .with_context(|| format!("Invalid log level '{}'", level))?;
        filter_handle
            .reload(configured)
            .context("Failed to apply configured log level")?;
    }

    info!("Starting {} (Batch Plugin Solver)", MODULE_NAME);
    info!("Version: {} ({})", env!("CARGO_PKG_VERSION"), env!("GIT_HASH"));

    let cli = CliOverrides {
        port: args.port,
        backend_url: args.backend_url,
    };
    let config = ServiceConfig::resolve(&cli, &toml_config);
    info!("Backend: {}", config.backend_url);
    for (plugin, kind) in &config.transports {
        info!("Transport override: {} -> {:?}", plugin, kind);
    }
    if let Some(parent) = &config.parent_context_url {
        info!("Embedded; enclosing context at {}", parent);
    }

    let state = AppState::from_config(&config).context("Failed to initialize services")?;
    let app = cwr_batch::build_router(state);

    let addr = SocketAddr::from(([127, 0, 0, 1], config.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;
    info!("Listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
