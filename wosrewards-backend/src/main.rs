//! wosrewards backend server
//!
//! Entry point: loads configuration, prepares the database and queue, starts
//! the job worker and serves the HTTP API until a shutdown signal arrives.

use std::sync::Arc;

use tokio::net::TcpListener;

use wosrewards_backend::state::AppState;
use wosrewards_job_queue::{connect_queue, Dispatcher, QueueSettings, Worker, WorkerSettings};

mod cli;
mod config_helpers;
mod tracing_setup;

use cli::CliArgs;
use config_helpers::{database_config_from_config, parse_bind_address};
use tracing_setup::install_tracing_from_config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    eprintln!("[STARTUP] wosrewards backend starting...");
    let args = CliArgs::parse();

    if args.help_requested {
        CliArgs::print_help();
        return Ok(());
    }

    // Resolve config path: CLI > environment variable
    let config_path = args
        .config_path
        .or_else(|| std::env::var("WOSREWARDS_CONFIG_PATH").ok());

    eprintln!("[STARTUP] Loading config from: {:?}", config_path);
    let config = load_config(&config_path)?;
    eprintln!("[STARTUP] Config loaded successfully");

    eprintln!("[STARTUP] Initializing tracing...");
    install_tracing_from_config(&config.logging);

    eprintln!("[STARTUP] Setting up database...");
    let db_cfg = database_config_from_config(&config);
    let db_pool = wosrewards_db::create_pool(&db_cfg).await?;
    run_migrations(&db_pool).await?;
    eprintln!("[STARTUP] Database migrations completed");

    eprintln!("[STARTUP] Connecting job queue...");
    let queue_settings = QueueSettings::from_config(&config.queue);
    let queue = connect_queue(&queue_settings).await?;
    let store = Arc::new(wosrewards_db::SqlJobStore::new(db_pool.clone()));
    let dispatcher = Dispatcher::new(store.clone(), queue.clone());

    let worker_settings = WorkerSettings::from_config(&config);
    tokio::fs::create_dir_all(&worker_settings.output_root)
        .await
        .map_err(|e| {
            anyhow::anyhow!(
                "failed to create output directory {}: {e}",
                worker_settings.output_root.display()
            )
        })?;

    tracing::info!(
        database = %wosrewards_db_connection::utils::config_metadata(&db_cfg),
        queue = queue.name(),
        queue_name = %queue_settings.name,
        output_dir = %worker_settings.output_root.display(),
        "storage and queue configuration"
    );

    let output_root = worker_settings.output_root.clone();
    let worker = if config.worker.enabled {
        let executor = wosrewards_jobs::executor_from_config(&config.executor);
        tracing::info!(executor = executor.name(), "starting job worker");
        let handle = Worker::new(store, queue, executor, worker_settings).start();
        eprintln!("[STARTUP] Worker started");
        Some(handle)
    } else {
        tracing::warn!("worker disabled; submitted jobs will wait in the queue");
        None
    };

    let state = AppState::new(db_pool, dispatcher, output_root);
    let app = wosrewards_backend::build_router(Arc::new(state));

    let addr = parse_bind_address(&config.server.host, config.server.port);
    let listener = TcpListener::bind(addr).await?;
    eprintln!("[STARTUP] Server listening on {addr}");
    tracing::info!(%addr, "server listening");

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(handle) = worker {
        tracing::info!("stopping job worker");
        if let Err(error) = handle.stop().await {
            tracing::error!(%error, "worker task ended abnormally");
        }
    }
    tracing::info!("shutdown complete");
    Ok(())
}

/// Load configuration from file or defaults, then validate it.
fn load_config(path: &Option<String>) -> anyhow::Result<wosrewards_config::Config> {
    let config = wosrewards_config::load_config(path.as_deref()).map_err(|e| {
        eprintln!("failed to load configuration: {e}");
        anyhow::anyhow!(e.to_string())
    })?;
    wosrewards_config::validate_config(&config).map_err(|e| {
        eprintln!("invalid configuration: {e}");
        anyhow::anyhow!(e.to_string())
    })?;
    Ok(config)
}

async fn run_migrations(db_pool: &wosrewards_db::DbPool) -> anyhow::Result<()> {
    tracing::info!("applying SQLite migrations");
    match wosrewards_migrations::sqlite_migrator().run(db_pool).await {
        Ok(_) => {
            tracing::info!("database migrations applied successfully");
            Ok(())
        }
        Err(e) => {
            tracing::error!(%e, "failed to apply database migrations");
            Err(anyhow::anyhow!("failed to apply database migrations: {e}"))
        }
    }
}

/// Resolves on Ctrl+C or, on Unix, SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(error) = tokio::signal::ctrl_c().await {
            tracing::error!(%error, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(error) => {
                tracing::error!(%error, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("received Ctrl+C, shutting down"),
        _ = terminate => tracing::info!("received SIGTERM, shutting down"),
    }
}
