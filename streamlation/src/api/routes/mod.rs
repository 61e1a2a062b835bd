//! Route assembly.

use axum::{Router, routing::get};

use crate::api::server::AppState;

mod events;
mod health;
mod sessions;

/// Create the application router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/healthz", get(health::healthz))
        .nest("/sessions", sessions::router())
}
