//! osint-engine - identity lookup aggregator service
//!
//! Serves the lookup API over HTTP. Startup order: logging, configuration,
//! storage (degrades to storage-less mode when unreachable), artifact
//! lifecycle, background housekeeping, then the server. On shutdown every
//! artifact still awaiting expiry is deleted.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use osint_common::config::{self, AppConfig};
use osint_common::StorageGateway;
use osint_engine::artifacts::{ArtifactLifecycle, SystemClock};
use osint_engine::maintenance;
use osint_engine::orchestrator::Aggregator;
use osint_engine::AppState;

/// Command-line arguments for osint-engine
#[derive(Parser, Debug)]
#[command(name = "osint-engine")]
#[command(about = "Identity lookup aggregator")]
#[command(version)]
struct Args {
    /// Configuration file (TOML)
    #[arg(short, long, env = "OSINT_CONFIG")]
    config: Option<PathBuf>,

    /// Data directory for the database, tools and temporary files
    #[arg(short, long, env = "OSINT_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Listen address, overriding the configured one
    #[arg(short, long, env = "OSINT_BIND")]
    bind: Option<SocketAddr>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let data_dir = config::resolve_data_dir(args.data_dir.as_deref());
    let config_path = config::resolve_config_path(args.config.as_deref());
    let (app_config, config_source) =
        AppConfig::load_with_source(config_path.as_deref(), data_dir.clone())
            .context("Failed to load configuration")?;

    // RUST_LOG wins over the configured level
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&app_config.logging.level)),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting osint-engine v{}", env!("CARGO_PKG_VERSION"));
    info!("Data directory: {}", data_dir.display());
    config_source.log();

    let work_dir = app_config.work_dir();
    tokio::fs::create_dir_all(&work_dir)
        .await
        .with_context(|| format!("Failed to create work directory {}", work_dir.display()))?;

    let storage = StorageGateway::connect(&app_config).await;
    match storage.backend_name() {
        Some(name) => info!("Storage backend: {}", name),
        None => warn!("Running without storage; stats and history will be empty"),
    }

    let artifacts =
        ArtifactLifecycle::with_work_dir(Arc::new(SystemClock), storage.clone(), &work_dir);
    let aggregator = Aggregator::new(&app_config, storage.clone(), artifacts.clone());

    let sweeper =
        maintenance::spawn_artifact_sweeper(artifacts.clone(), app_config.artifacts.sweep_interval());
    let pruner = app_config
        .storage
        .retention()
        .filter(|_| storage.is_connected())
        .map(|retention| maintenance::spawn_history_pruner(storage.clone(), retention));

    let app = osint_engine::build_router(AppState::new(aggregator, storage.clone()));

    let addr = match args.bind {
        Some(addr) => addr,
        None => app_config
            .server
            .bind
            .parse()
            .with_context(|| format!("Invalid bind address '{}'", app_config.server.bind))?,
    };

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;
    info!("Listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("Server error")?;

    sweeper.abort();
    if let Some(pruner) = pruner {
        pruner.abort();
    }
    artifacts.purge_all().await;
    storage.close().await;

    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
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
