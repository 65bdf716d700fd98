//! # taskflowd — taskflow daemon
//!
//! Composition root that wires all adapters together and starts the engine.
//!
//! ## Responsibilities
//! - Load configuration (`taskflow.toml`, env vars) and install logging
//! - Initialize the `SQLite` connection pool and run migrations
//! - Construct the registry, ledger and lease store (adapters)
//! - Construct the coordinator, planner, dispatcher and metrics services
//! - Arm schedules, run the planner tick loop and serve the HTTP API
//! - Handle graceful shutdown (SIGTERM/SIGINT): stop the planner, drain the
//!   HTTP server, then cancel and finalize in-flight executions
//!
//! ## Dependency rule
//! This is the **only** crate that depends on all other crates.
//! It is the wiring layer — no domain logic belongs here.

mod config;

use std::sync::Arc;

use anyhow::Context;
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;

use taskflow_adapter_http_axum::{AppState, HmacSha256Verifier};
use taskflow_adapter_storage_sqlite_sqlx::{
    Config as StorageConfig, SqliteAutomationRepository, SqliteExecutionLedger, SqliteLeaseStore,
};
use taskflow_app::services::execution_coordinator::ExecutionCoordinator;
use taskflow_app::services::metrics_aggregator::MetricsAggregator;
use taskflow_app::services::schedule_planner::SchedulePlanner;
use taskflow_app::services::trigger_dispatcher::TriggerDispatcher;

use crate::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::load().context("failed to load configuration")?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_new(&config.logging.filter).unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Database
    let db = StorageConfig {
        database_url: config.database_url().to_string(),
    }
    .build()
    .await
    .context("failed to open database")?;
    let pool = db.pool().clone();

    // Ports
    let registry = Arc::new(SqliteAutomationRepository::new(pool.clone()));
    let ledger = Arc::new(SqliteExecutionLedger::new(pool.clone()));
    let leases = SqliteLeaseStore::new(pool);

    // Services
    let runner = taskflow_adapter_simulated::executor(
        config.integrations.latency(),
        config.engine.executor_config()?,
    );
    let coordinator = ExecutionCoordinator::new(
        Arc::clone(&registry),
        Arc::clone(&ledger),
        leases,
        runner,
        config.engine.coordinator_config(),
    );
    let planner = SchedulePlanner::new(Arc::clone(&registry), coordinator.clone());
    let verifier = config.webhooks.secret().map(HmacSha256Verifier::new);
    if verifier.is_none() {
        tracing::warn!("webhooks.allow_unsigned is set, signatures are not checked");
    }
    let dispatcher = TriggerDispatcher::new(
        Arc::clone(&registry),
        verifier,
        coordinator.clone(),
        config.engine.dedupe_window(),
    );
    let metrics = MetricsAggregator::new(registry, ledger, config.metrics.options());

    // Schedules
    planner
        .arm_all(taskflow_domain::time::now())
        .await
        .context("failed to arm schedules")?;
    let (stop_planner, planner_shutdown) = watch::channel(false);
    let tick_interval = config.engine.tick_interval();
    let planner_task = tokio::spawn(async move { planner.run(tick_interval, planner_shutdown).await });

    // HTTP
    let app = taskflow_adapter_http_axum::router::build(AppState::new(dispatcher, metrics));
    let bind_addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {bind_addr}"))?;
    tracing::info!(bind_addr = bind_addr.as_str(), "taskflowd listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("http server failed")?;

    stop_planner.send_replace(true);
    if let Err(err) = planner_task.await {
        tracing::error!(error = %err, "schedule planner task failed");
    }
    coordinator.shutdown().await;
    tracing::info!("taskflowd stopped");

    Ok(())
}

/// Wait for SIGINT (Ctrl+C) or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %err, "failed to listen for Ctrl+C");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => tracing::info!("received SIGINT"),
        () = terminate => tracing::info!("received SIGTERM"),
    }
}
