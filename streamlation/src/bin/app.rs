//! streamlation-app - Session control surface.
//!
//! Serves the session API and live event subscriptions, backed by the
//! durable session store and the Redis queue/broker.

use std::sync::Arc;

use streamlation::api::{AppState, serve};
use streamlation::broker::RedisStatusBroker;
use streamlation::config::{AppConfig, redis_url};
use streamlation::database::{SqlxSessionRepository, create_pool};
use streamlation::logging::init_logging;
use streamlation::queue::RedisJobQueue;
use tokio_util::sync::CancellationToken;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = AppConfig::from_env_or_default();
    init_logging(&config.log_level);

    info!("Starting streamlation-app v{}", env!("CARGO_PKG_VERSION"));

    info!("Connecting to database");
    let pool = create_pool(&config.database_url).await?;
    let store = Arc::new(SqlxSessionRepository::new(pool));

    let redis = redis_url(&config.redis_addr);
    info!("Connecting to redis");
    let queue = Arc::new(RedisJobQueue::connect(&redis).await?);
    let broker = Arc::new(RedisStatusBroker::connect(&redis).await?);

    let shutdown = CancellationToken::new();
    let state = AppState::new(store, queue, broker, shutdown.clone());

    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            wait_for_shutdown_signal().await;
            info!("Shutdown signal received");
            shutdown.cancel();
        }
    });

    serve(&config.bind_addr(), state).await?;

    info!("streamlation-app shutdown complete");
    Ok(())
}

async fn wait_for_shutdown_signal() {
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {}
        _ = wait_for_sigterm() => {}
    }
}

/// Wait for SIGTERM (Unix only).
#[cfg(unix)]
async fn wait_for_sigterm() {
    use tokio::signal::unix::{SignalKind, signal};
    let mut sigterm = signal(SignalKind::terminate()).expect("Failed to register SIGTERM handler");
    sigterm.recv().await;
}

#[cfg(not(unix))]
async fn wait_for_sigterm() {
    std::future::pending::<()>().await;
}
