//! API server setup and configuration.

use std::sync::Arc;
use std::time::Instant;

use axum::Router;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::api::routes;
use crate::broker::StatusBroker;
use crate::database::SessionRepository;
use crate::queue::JobQueue;
use crate::{Error, Result};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Server start time for uptime calculation
    pub start_time: Instant,
    /// Durable session store
    pub store: Arc<dyn SessionRepository>,
    /// Ingestion job queue
    pub queue: Arc<dyn JobQueue>,
    /// Status event broker
    pub broker: Arc<dyn StatusBroker>,
    /// Server-side shutdown signal, observed by long-lived connections
    pub shutdown: CancellationToken,
}

impl AppState {
    pub fn new(
        store: Arc<dyn SessionRepository>,
        queue: Arc<dyn JobQueue>,
        broker: Arc<dyn StatusBroker>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            start_time: Instant::now(),
            store,
            queue,
            broker,
            shutdown,
        }
    }
}

/// Assemble the application router with its middleware stack.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    routes::router()
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Bind and serve until the token is cancelled.
pub async fn serve(addr: &str, state: AppState) -> Result<()> {
    let shutdown = state.shutdown.clone();
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| Error::fatal(format!("cannot bind {addr}: {e}")))?;
    info!(addr, "API server listening");

    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
        .map_err(|e| Error::transient("server", e.to_string()))
}
