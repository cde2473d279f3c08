//! Analytics Rollup Engine
//!
//! Event ingestion and aggregation pipeline handling:
//! - Envelope validation and idempotent raw-event capture
//! - Incremental daily rollups via atomic upsert-with-increment
//! - Session-scoped funnel tracking
//! - Background workers for session expiry, outbox flush, and retention

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::signal;
use tracing::{error, info};

use aggregator::{WorkerConfig, WorkerScheduler};
use api::{router, AppState};
use event_store::{EventStore, StoreConfig};
use telemetry::{health, init_tracing_from_env};

/// Application configuration.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
struct Config {
    #[serde(default = "default_host")]
    host: String,
    #[serde(default = "default_port")]
    port: u16,

    #[serde(default)]
    store: StoreConfig,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            store: StoreConfig::default(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    // Initialize tracing
    init_tracing_from_env();

    info!(
        "Starting Analytics Rollup Engine v{}",
        env!("CARGO_PKG_VERSION")
    );

    // Load configuration
    let config = load_config()?;

    // Open the event store (creates schema on first run)
    let store = EventStore::connect(&config.store)
        .await
        .context("Failed to open event store")?;

    check_health(&store).await;

    // Create application state (aggregator, funnel tracker, registry)
    let state = AppState::new(store.clone());

    // Start background workers
    let scheduler = Arc::new(WorkerScheduler::new(
        WorkerConfig::default(),
        store.clone(),
        state.sessions.clone(),
        state.aggregator.outbox(),
    ));
    let _worker_handles = scheduler.start();

    // Create router
    let app = router(state);

    // Start HTTP server
    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .context("Invalid server address")?;

    info!("Listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    // Run server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Shutdown complete");
    Ok(())
}

/// Load configuration from files and environment.
fn load_config() -> Result<Config> {
    let config = config::Config::builder()
        // Start with defaults
        .add_source(config::Config::try_from(&Config::default())?)
        // Load from config file if exists
        .add_source(
            config::File::with_name("config/default")
                .required(false)
                .format(config::FileFormat::Toml),
        )
        // Override with environment variables
        .add_source(
            config::Environment::default()
                .separator("__")
                .prefix("ANALYTICS")
                .try_parsing(true),
        )
        .build()
        .context("Failed to build configuration")?;

    let mut config: Config = config
        .try_deserialize()
        .context("Failed to deserialize configuration")?;

    // Manual overrides for nested store config from environment
    // The config crate's nested parsing doesn't work reliably with underscored field names
    if let Ok(url) = std::env::var("ANALYTICS_STORE_URL") {
        config.store.url = url;
    }
    if let Ok(max) = std::env::var("ANALYTICS_STORE_MAX_CONNECTIONS") {
        if let Ok(max) = max.parse() {
            config.store.max_connections = max;
        }
    }

    Ok(config)
}

/// Check component health on startup.
async fn check_health(store: &EventStore) {
    match store.ping().await {
        Ok(()) => {
            health().store.set_healthy();
            info!("Event store: healthy");
        }
        Err(e) => {
            health().store.set_unhealthy(e.to_string());
            error!("Event store: unhealthy ({e})");
        }
    }
}

/// Graceful shutdown signal handler.
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        }
        _ = terminate => {
            info!("Received terminate signal");
        }
    }
}
