//! Statecache server binary
//!
//! Serves the record cache over HTTP with a background sweeper.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use statecache::{
    create_router, spawn_sweeper_task, AppState, Config, FileStore, LivenessSource, MemoryStore,
    RecordStore,
};

/// Main entry point for the statecache server.
///
/// # Startup Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Load and validate configuration from environment variables
/// 3. Open the record store (JSON file or in-memory)
/// 4. Start the background cache sweeper
/// 5. Start HTTP server on configured port
/// 6. Handle graceful shutdown on SIGINT/SIGTERM
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "statecache=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting statecache server");

    let config = Config::from_env().context("invalid configuration")?;
    info!(
        "Configuration loaded: port={}, sweep_interval={}ms, window={}ms/{}, store_timeout={}ms",
        config.server_port,
        config.sweep_interval_ms,
        config.default_window_duration_ms,
        config.default_window_limit,
        config.store_timeout_ms
    );

    let store: Arc<dyn RecordStore> = match &config.data_file {
        Some(path) => {
            let store = FileStore::open(path)
                .await
                .with_context(|| format!("failed to open data file {}", path.display()))?;
            info!("Using file store at {}", path.display());
            Arc::new(store)
        }
        None => {
            warn!("DATA_FILE not set, records will not survive a restart");
            Arc::new(MemoryStore::new())
        }
    };

    let state = AppState::from_config(store, &config);

    let liveness: Arc<dyn LivenessSource> = state.sessions.clone();
    let sweeper_handle = spawn_sweeper_task(state.cache.clone(), liveness, config.sweep_interval());
    info!("Background sweeper started");

    let app = create_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!("Server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(sweeper_handle))
        .await
        .context("server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Waits for shutdown signal (Ctrl+C or SIGTERM), then aborts the sweeper.
async fn shutdown_signal(sweeper_handle: tokio::task::JoinHandle<()>) {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", err);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                warn!("Failed to install SIGTERM handler: {}", err);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating shutdown...");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating shutdown...");
        }
    }

    sweeper_handle.abort();
    warn!("Sweeper task aborted");
}
