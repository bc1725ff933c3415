//! `oneadif-control`: the upload control plane daemon.

use std::sync::Arc;

use oneadif_control::listener::{self, ListenerSettings};
use oneadif_control::{ControlConfig, ProcessLauncher, UploadService};
use oneadif_core::StatusStore;
use oneadif_db::{MemoryRecordStore, PgRecordStore, RecordStore};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "oneadif_control=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = ControlConfig::from_env();
    tracing::info!(
        socket = %config.socket_path.display(),
        status_dir = %config.status_dir.display(),
        worker = %config.worker_bin.display(),
        "Loaded control configuration",
    );

    // --- Record store ---
    let store: Arc<dyn RecordStore> = match &config.database_url {
        Some(url) => {
            let pool = oneadif_db::create_pool(url)
                .await
                .expect("Failed to connect to database");
            oneadif_db::health_check(&pool)
                .await
                .expect("Database health check failed");
            oneadif_db::run_migrations(&pool)
                .await
                .expect("Failed to run database migrations");
            tracing::info!("Database ready");
            Arc::new(PgRecordStore::new(pool))
        }
        None => {
            tracing::warn!("DATABASE_URL not set, using an in-memory record store");
            Arc::new(MemoryRecordStore::new())
        }
    };

    // --- Status artifacts ---
    let status = StatusStore::new(&config.status_dir);
    status
        .ensure_dir()
        .await
        .expect("Failed to create status directory");

    // --- Service + listener ---
    let launcher = Arc::new(ProcessLauncher::new(config.worker_bin.clone()));
    let service = Arc::new(UploadService::new(store, launcher, status));

    let socket = listener::bind(&config.socket_path).expect("Failed to bind control socket");
    let shutdown = CancellationToken::new();
    let accept_handle = tokio::spawn(listener::run(
        socket,
        Arc::clone(&service),
        ListenerSettings::from(&config),
        shutdown.clone(),
    ));

    let signal = shutdown_signal().await;

    // --- Shutdown ---
    tracing::info!(
        signal,
        active_uploads = service.registry().len().await,
        "Stopping control socket and cancelling active uploads",
    );
    shutdown.cancel();
    let _ = accept_handle.await;
    service.shutdown(config.shutdown_timeout()).await;

    tracing::info!("Upload control plane stopped");
}

/// Wait for SIGINT or SIGTERM; returns the name of the signal received.
async fn shutdown_signal() -> &'static str {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => "SIGINT",
        () = terminate => "SIGTERM",
    }
}
