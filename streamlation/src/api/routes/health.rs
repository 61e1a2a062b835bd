//! Health probe.

use axum::{Json, extract::State};

use crate::api::models::HealthResponse;
use crate::api::server::AppState;

pub async fn healthz(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        uptime_secs: state.start_time.elapsed().as_secs(),
    })
}
