//! streamlation-worker - Ingestion queue consumer.
//!
//! Dequeues ingestion jobs and drives sessions through the processing
//! pipeline under bounded concurrency.

use std::sync::Arc;

use streamlation::broker::RedisStatusBroker;
use streamlation::config::{WorkerConfig, redis_url};
use streamlation::database::{SqlxSessionRepository, create_pool, ensure_schema};
use streamlation::logging::init_logging;
use streamlation::pipeline::{ScriptedRunner, WorkerPool, WorkerPoolConfig};
use streamlation::queue::RedisJobQueue;
use tokio_util::sync::CancellationToken;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = WorkerConfig::from_env_or_default();
    init_logging(&config.log_level);

    info!(
        "Starting streamlation-worker v{}",
        env!("CARGO_PKG_VERSION")
    );

    info!("Connecting to database");
    let pool = create_pool(&config.database_url).await?;
    info!("Ensuring schema");
    ensure_schema(&pool).await?;
    let store = Arc::new(SqlxSessionRepository::new(pool));

    let redis = redis_url(&config.redis_addr);
    info!("Connecting to redis");
    let queue = Arc::new(RedisJobQueue::connect(&redis).await?);
    let broker = Arc::new(RedisStatusBroker::connect(&redis).await?);

    // Real stage engines are injected here once they exist; until then the
    // scripted runner drives the canonical event sequence.
    let runner = Arc::new(ScriptedRunner::new());

    let pool_config = WorkerPoolConfig {
        max_concurrency: config.max_concurrency,
        poll_interval: config.poll_interval,
        ..WorkerPoolConfig::default()
    };
    let worker_pool = WorkerPool::new(pool_config, store, queue, broker, runner);

    let token = CancellationToken::new();
    tokio::spawn({
        let token = token.clone();
        async move {
            wait_for_shutdown_signal().await;
            info!("Shutdown signal received");
            token.cancel();
        }
    });

    worker_pool.run(token).await;

    info!("streamlation-worker shutdown complete");
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
