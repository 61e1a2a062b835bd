//! Connection pool creation and schema bootstrap.

use sqlx::postgres::{PgPool, PgPoolOptions};

use crate::{Error, Result};

/// Idempotent DDL for the sessions table, issued at worker startup.
const SESSIONS_DDL: &str = r#"
CREATE TABLE IF NOT EXISTS sessions (
    id                   TEXT PRIMARY KEY,
    source_type          TEXT NOT NULL,
    source_uri           TEXT NOT NULL,
    target_language      TEXT NOT NULL,
    enable_dubbing       BOOLEAN NOT NULL DEFAULT FALSE,
    latency_tolerance_ms INTEGER NOT NULL DEFAULT 5000,
    model_profile        TEXT NOT NULL DEFAULT 'cpu-basic',
    created_at           TIMESTAMPTZ NOT NULL DEFAULT now()
)
"#;

/// Create a connection pool to the Postgres database.
pub async fn create_pool(database_url: &str) -> Result<PgPool> {
    PgPoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await
        .map_err(|e| Error::fatal(format!("cannot connect to database: {e}")))
}

/// Ensure the sessions schema exists. Safe to run on every startup.
pub async fn ensure_schema(pool: &PgPool) -> Result<()> {
    sqlx::query(SESSIONS_DDL)
        .execute(pool)
        .await
        .map_err(|e| Error::fatal(format!("cannot ensure schema: {e}")))?;
    Ok(())
}
