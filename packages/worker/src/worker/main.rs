//! Crawl Worker
//!
//! Runs the scheduler loops (materialize, dispatch, reap, compact) against
//! the SQLite store until Ctrl-C.

use std::sync::Arc;

use anyhow::{Context, Result};
use extraction::HttpFetcher;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use worker_core::domains::build_handler_registry;
use worker_core::kernel::{Scheduler, WorkerDeps};
use worker_core::store::SqliteStore;
use worker_core::Config;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,worker_core=debug,sqlx=warn".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_line_number(true),
        )
        .init();

    tracing::info!("Starting crawl worker");

    let config = Config::from_env().context("Failed to load configuration")?;

    let store = Arc::new(
        SqliteStore::new(&config.database_url)
            .await
            .with_context(|| format!("Failed to open database {}", config.database_url))?,
    );
    tracing::info!(database_url = %config.database_url, "Database ready");

    let fetcher = HttpFetcher::new(config.fetch_config()).context("Failed to build HTTP client")?;
    let deps = Arc::new(
        WorkerDeps::new(store, Arc::new(fetcher)).with_executor_config(config.executor_config()),
    );

    let registry = Arc::new(build_handler_registry());
    tracing::info!(handlers = ?registry.registered_handlers(), "Registered job handlers");

    let mut scheduler = Scheduler::new(deps, registry, config.scheduler_config());
    scheduler.start().await.context("Failed to start scheduler")?;

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;
    tracing::info!("Shutdown signal received");

    scheduler.shutdown().await?;
    Ok(())
}
