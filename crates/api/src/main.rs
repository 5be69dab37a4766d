use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use genhub_api::background::store_janitor;
use genhub_api::config::{ConfigError, ServerConfig};
use genhub_api::router::build_app_router;
use genhub_api::state::AppState;
use genhub_api::ws;
use genhub_pipeline::{MemoryStore, PgJobRecords, Store, WorkerPool, WorkerPoolConfig};
use genhub_provider::runware::{RunwareConfig, RunwareProvider};

/// How long auxiliary tasks get to notice cancellation.
const AUX_STOP_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, thiserror::Error)]
enum StartupError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Invalid HOST address {0:?}")]
    Host(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Server error: {0}")]
    Io(#[from] std::io::Error),
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "genhub_api=debug,genhub_pipeline=debug,genhub_events=debug,tower_http=debug"
                    .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if let Err(e) = run().await {
        tracing::error!(error = %e, "Server failed");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), StartupError> {
    // --- Configuration ---
    let config = ServerConfig::from_env()?;
    tracing::info!(host = %config.host, port = config.port, "Loaded server configuration");

    // --- Database ---
    let pool = genhub_db::create_pool(&config.database_url).await?;
    genhub_db::health_check(&pool).await?;
    genhub_db::run_migrations(&pool).await?;
    tracing::info!("Database ready");

    // --- Pipeline services ---
    let store = Arc::new(MemoryStore::new());
    let provider = Arc::new(RunwareProvider::new(RunwareConfig {
        api_url: config.runware_api_url.clone(),
        api_key: config.runware_api_key.clone(),
        storage_path: config.storage_path.clone(),
    }));
    if config.runware_api_key.is_none() {
        tracing::warn!("RUNWARE_API_KEY not set, jobs will fail until a key is configured");
    }

    let state = AppState::new(
        Arc::new(config.clone()),
        Arc::new(PgJobRecords::new(pool)),
        store.clone(),
        provider,
    );

    // --- Background work ---
    let shutdown = CancellationToken::new();
    let workers = WorkerPool::start(
        Arc::clone(&state.orchestrator),
        Arc::clone(&state.queue),
        WorkerPoolConfig {
            workers: config.max_concurrent_generations,
            poll_timeout: config.queue_poll_timeout(),
        },
        &shutdown,
    );
    let heartbeat_handle = ws::start_heartbeat(Arc::clone(&state.ws_manager), shutdown.child_token());
    let janitor_store: Arc<dyn Store> = store;
    let janitor_handle = tokio::spawn(store_janitor::run(
        janitor_store,
        store_janitor::PURGE_INTERVAL,
        shutdown.child_token(),
    ));

    // --- Start server ---
    let ip: IpAddr = config
        .host
        .parse()
        .map_err(|_| StartupError::Host(config.host.clone()))?;
    let addr = SocketAddr::new(ip, config.port);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "Starting server");

    let app = build_app_router(state.clone());
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    // --- Post-shutdown cleanup ---
    tracing::info!("Server stopped accepting connections, cleaning up");

    // Running jobs first: they still emit into the hub and the sockets.
    workers.shutdown(config.shutdown_timeout()).await;

    state.hub.shutdown().await;
    tracing::info!("Progress hub listeners cancelled");

    let ws_count = state.ws_manager.connection_count().await;
    tracing::info!(ws_count, "Closing remaining WebSocket connections");
    state.ws_manager.shutdown_all().await;

    shutdown.cancel();
    let _ = tokio::time::timeout(AUX_STOP_TIMEOUT, heartbeat_handle).await;
    let _ = tokio::time::timeout(AUX_STOP_TIMEOUT, janitor_handle).await;
    tracing::info!("Background tasks stopped");

    tracing::info!("Graceful shutdown complete");
    Ok(())
}

/// Wait for SIGINT or (on Unix) SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
