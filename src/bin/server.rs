use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use community_solar_rs::{AppState, BreakdownBasis, DataStore, StateTable, build_app};

/// Server configuration
struct ServerConfig {
    port: u16,
    data_dir: PathBuf,
    states_path: Option<PathBuf>,
    breakdown: BreakdownBasis,
}

impl ServerConfig {
    fn from_env() -> Result<Self> {
        let breakdown = match env::var("SAVINGS_BREAKDOWN_BASIS") {
            Ok(raw) => raw.parse::<BreakdownBasis>().map_err(anyhow::Error::msg)?,
            Err(_) => BreakdownBasis::default(),
        };

        Ok(Self {
            port: env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(3000),
            data_dir: env::var("DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("data")),
            states_path: env::var("STATES_CONFIG").ok().map(PathBuf::from),
            breakdown,
        })
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing/logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "server=info,community_solar_rs=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Read configuration from environment
    let config = ServerConfig::from_env().context("Invalid server configuration")?;

    let states = match &config.states_path {
        Some(path) => StateTable::load(path)
            .with_context(|| format!("Failed to load state table from {}", path.display()))?,
        None => StateTable::default(),
    };

    tracing::info!(
        "Serving data from {} ({} states)",
        config.data_dir.display(),
        states.codes().count()
    );
    let store = Arc::new(DataStore::with_states(&config.data_dir, states));

    // Load the zip mapping up front so a missing file shows at start-up
    if store.zip_mappings().await.is_none() {
        tracing::warn!("No zip mappings loaded; every lookup will report no coverage");
    }

    let app = build_app(AppState::new(store, config.breakdown));

    // Bind server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("Server listening on {}", addr);

    // Run server with graceful shutdown
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    tracing::info!("Server shut down gracefully");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, shutting down gracefully...");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, shutting down gracefully...");
        }
    }
}
