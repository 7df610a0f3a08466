//! Mizan HTTP server.
//!
//! Recovers the books from `PostgreSQL` (or starts empty with
//! `--ephemeral`), starts the write-behind storage task and serves the
//! `/api/v1` routes until Ctrl+C.

use anyhow::{Context, Result};
use mizan_config::ServerConfig;
use mizan_engine::{STORAGE_CHANNEL_CAPACITY, bootstrap_books, handle::BooksHandle};
use mizan_server::{AppState, app, auth::AuthConfig};
use mizan_storage::{config::StorageConfig, service::StorageService, task::run_storage_task};
use tokio::{net::TcpListener, sync::mpsc, task::JoinHandle};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let config = ServerConfig::load();

    let (filter, env_err) = match EnvFilter::try_from_default_env() {
        Ok(f) => (f, None),
        Err(e) => {
            let level = if config.verbose { "debug" } else { "info" };
            let default = EnvFilter::new(format!(
                "mizan_server={level},mizan_engine={level},mizan_storage={level},\
                 mizan_core=info,tower_http=info,sqlx=warn"
            ));
            (default, Some(e))
        }
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();
    if let Some(e) = env_err {
        warn!(error = %e, "invalid RUST_LOG filter, using default");
    }

    info!(
        currency = %config.currency,
        ephemeral = config.ephemeral,
        "Starting mizan-server"
    );

    let (books, storage_task) = if config.ephemeral {
        let books = bootstrap_books(config.currency, None).await?;
        (BooksHandle::new(books), None)
    } else {
        let storage_config = StorageConfig::from_env().context("invalid storage configuration")?;
        let storage = StorageService::connect(&storage_config)
            .await
            .context("failed to connect to PostgreSQL")?;
        let books = bootstrap_books(config.currency, Some(&storage)).await?;

        let (storage_tx, storage_rx) = mpsc::channel(STORAGE_CHANNEL_CAPACITY);
        let task: JoinHandle<Result<()>> = tokio::spawn(run_storage_task(
            storage,
            storage_rx,
            storage_config.pg_batch_size,
            storage_config.flush_interval_ms,
        ));
        (BooksHandle::with_storage(books, storage_tx), Some(task))
    };

    let mut auth = AuthConfig::new(config.api_key.clone());
    if let Some(secret) = config.hmac_secret.clone() {
        auth = auth.with_hmac_secret(secret, config.require_signature);
    }
    let state = AppState::new(books.clone(), auth);

    // Log raised notifications as they happen.
    let mut notifications = books.subscribe();
    tokio::spawn(async move {
        while let Ok(n) = notifications.recv().await {
            info!(kind = ?n.kind, subject = %n.subject, "notification raised");
        }
    });

    let addr = config.socket_addr()?;
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(%addr, "mizan-server listening. Press Ctrl+C to stop.");

    let shutdown_state = state.clone();
    axum::serve(listener, app(state))
        .with_graceful_shutdown(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!(error = %e, "failed to listen for ctrl-c");
            }
            warn!("Ctrl+C received, shutting down...");
            shutdown_state.begin_shutdown();
        })
        .await
        .context("HTTP server failed")?;

    if let Err(e) = books.flush().await {
        error!(error = %e, "final storage flush failed");
    }
    // Dropping the last sender closes the channel and ends the storage task.
    drop(books);
    if let Some(task) = storage_task {
        match task.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => error!(error = %e, "storage task failed"),
            Err(e) => error!(error = %e, "storage task panicked"),
        }
    }

    info!("mizan-server stopped");
    Ok(())
}
