//! Conclave worker binary entrypoint wiring the relational store, hot store, oracle, and broadcaster.

use std::sync::Arc;

use anyhow::Context;
use tokio::sync::watch;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use conclave_worker::{
    broadcast::RedisBroadcaster,
    config::AppConfig,
    dao::{hot_store::redis::RedisHotStore, session_store::postgres::PgSessionStore},
    oracle::http::HttpDecisionOracle,
    services::worker,
    state::WorkerState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = AppConfig::from_env().context("loading configuration")?;

    // Startup connectivity is fatal; everything after this point degrades per phase.
    let sessions = PgSessionStore::connect(config.pg.clone())
        .await
        .context("connecting to relational store")?;
    let hot = RedisHotStore::connect(&config.redis_url)
        .await
        .context("connecting to hot store")?;
    let broadcaster = RedisBroadcaster::connect(&config.redis_url)
        .await
        .context("connecting broadcast transport")?;
    let oracle =
        HttpDecisionOracle::new(config.oracle.clone()).context("building decision oracle client")?;

    let state = WorkerState::new(
        Arc::new(sessions),
        Arc::new(hot),
        Arc::new(oracle),
        Arc::new(broadcaster),
        config.worker.clone(),
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let driver = tokio::spawn(worker::run(state, shutdown_rx));

    shutdown_signal().await;
    info!("shutdown signal received; stopping worker");
    let _ = shutdown_tx.send(true);

    driver.await.context("joining worker task")?;

    Ok(())
}

/// Configure tracing subscribers so logs include spans by default.
fn init_tracing() {
    let env_filter =
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Wait for Ctrl+C or SIGTERM and shut the worker down gracefully.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let mut term = signal(SignalKind::terminate()).expect("install SIGTERM handler");
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {},
            _ = term.recv() => {},
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
