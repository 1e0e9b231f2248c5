use std::future::Future;
use anyhow::{Context, Result};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use crate::api::routes::{self, AppState};
use crate::config::Config;
use crate::store::db::PortDb;
use crate::store_manager::StoreHandle;

/// Serve the lookup API until Ctrl-C or until the server fails
pub async fn run(config: Config) -> Result<()> {
    let db_path = &config.store.db_path;
    let db = PortDb::open_existing(db_path)
        .with_context(|| format!("Failed to open port database {}", db_path.display()))?;

    let status = db.status().context("Failed to read store status")?;
    tracing::info!("Opened database at {:?} with {} records", db_path, status.records);
    if status.records == 0 {
        tracing::warn!("Port database is empty, every lookup will return no results");
    }

    // The store thread owns the connection from here on
    let store = StoreHandle::spawn(db);

    // Create cancellation token for graceful shutdown
    let cancel = CancellationToken::new();

    let app = routes::router(AppState {
        store: store.clone(),
    });

    let listener = tokio::net::TcpListener::bind(&config.api.listen)
        .await
        .with_context(|| format!("Failed to bind to {}", config.api.listen))?;

    tracing::info!("API listening on {}", config.api.listen);

    let server_cancel = cancel.clone();
    let server_handle = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async move { server_cancel.cancelled().await })
            .await
    });

    let result = supervise(server_handle, tokio::signal::ctrl_c(), &cancel).await;
    cancel.cancel();

    if let Err(e) = store.shutdown().await {
        tracing::error!("Failed to shutdown store: {}", e);
    }

    tracing::info!("Shutdown complete");
    result
}

/// Wait for the shutdown signal, then drain the server. A server that stops
/// on its own before the signal is an error even if it returned cleanly.
async fn supervise<F>(
    mut server: JoinHandle<std::io::Result<()>>,
    shutdown: F,
    cancel: &CancellationToken,
) -> Result<()>
where
    F: Future<Output = std::io::Result<()>>,
{
    let stopped_early = tokio::select! {
        signal = shutdown => {
            signal.context("Failed to listen for ctrl-c")?;
            None
        }
        joined = &mut server => Some(joined),
    };

    if let Some(joined) = stopped_early {
        joined.context("Server task panicked")?.context("Server failed")?;
        anyhow::bail!("Server stopped before a shutdown signal");
    }

    tracing::info!("Shutdown signal received");
    cancel.cancel();

    server
        .await
        .context("Server task panicked")?
        .context("Server failed during shutdown")
}
