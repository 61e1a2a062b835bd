//! Request and response payloads not covered by the domain model.

use serde::{Deserialize, Serialize};

/// Query parameters for listing sessions.
#[derive(Debug, Default, Deserialize)]
pub struct ListSessionsQuery {
    pub limit: Option<u32>,
}

/// Health probe response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub uptime_secs: u64,
}
