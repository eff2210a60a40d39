//! Nexus Radio Audio Player (nexus-ap) - Main entry point
//!
//! Starts the playback supervisor and serves the HTTP/SSE control API.

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use nexus_ap::api;
use nexus_ap::config::{EngineConfig, EngineLocator, SupervisorTiming};
use nexus_ap::engine::MpvLauncher;
use nexus_ap::playback::Supervisor;
use nexus_ap::SharedState;
use nexus_common::config::resolve_settings_path;
use nexus_common::SettingsStore;

/// Command-line arguments for nexus-ap
#[derive(Parser, Debug)]
#[command(name = "nexus-ap")]
#[command(about = "Nexus Radio audio player")]
#[command(version)]
struct Args {
    /// Port to listen on
    #[arg(short, long, default_value = "5740", env = "NEXUS_AP_PORT")]
    port: u16,

    /// Address to bind
    #[arg(long, default_value = "127.0.0.1")]
    bind: IpAddr,

    /// Engine binary (absolute path or command name)
    #[arg(short, long, env = "NEXUS_ENGINE")]
    engine: Option<PathBuf>,

    /// Settings file (overrides NEXUS_SETTINGS and the platform default)
    #[arg(short, long, env = "NEXUS_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse();

    let settings_path = resolve_settings_path(args.config.as_deref());
    let store = SettingsStore::new(&settings_path);
    let settings = store.load();

    // Initialize tracing (RUST_LOG wins over the settings file)
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!(
                    "nexus_ap={level},nexus_common={level},tower_http=info",
                    level = settings.logging.level
                )
                .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Nexus Radio audio player on port {}", args.port);
    info!("Settings file: {}", settings_path.display());

    let catalog = settings
        .catalog()
        .context("Invalid source catalog in settings file")?;
    info!("Catalog: {} sources", catalog.len());

    let explicit_engine = args
        .engine
        .clone()
        .or_else(|| settings.engine.as_ref().map(PathBuf::from));
    let engine_command = EngineLocator::new(explicit_engine).resolve();
    info!("Engine: {}", engine_command.display());

    let launcher = Arc::new(MpvLauncher::new(EngineConfig::new(engine_command)));
    let shared = Arc::new(SharedState::new());
    let (supervisor, supervisor_task) = Supervisor::spawn(
        launcher,
        catalog,
        store,
        SupervisorTiming::from_settings(&settings),
        shared,
    );

    // Build the application router
    let app = api::create_router(api::AppState {
        supervisor: supervisor.clone(),
        port: args.port,
    });

    let addr = SocketAddr::new(args.bind, args.port);
    info!("Starting HTTP server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    // Terminate every engine process before exiting
    supervisor.shutdown().await;
    if let Err(e) = supervisor_task.await {
        warn!("Supervisor task ended abnormally: {}", e);
    }

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
            Ok(mut sig) => {
                sig.recv().await;
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
