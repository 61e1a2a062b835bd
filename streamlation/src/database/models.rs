//! Row model for the sessions table.

use chrono::{DateTime, Utc};
use sqlx::FromRow;

use crate::domain::{SessionOptions, SourceSpec, TranslationSession};
use crate::{Error, Result};

/// One row of the `sessions` table.
#[derive(Debug, Clone, FromRow)]
pub struct SessionRow {
    pub id: String,
    pub source_type: String,
    pub source_uri: String,
    pub target_language: String,
    pub enable_dubbing: bool,
    pub latency_tolerance_ms: i32,
    pub model_profile: String,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<SessionRow> for TranslationSession {
    type Error = Error;

    fn try_from(row: SessionRow) -> Result<Self> {
        Ok(TranslationSession {
            id: row.id,
            source: SourceSpec {
                kind: row.source_type.parse()?,
                uri: row.source_uri,
            },
            target_language: row.target_language,
            options: SessionOptions {
                enable_dubbing: row.enable_dubbing,
                latency_tolerance_ms: u32::try_from(row.latency_tolerance_ms)
                    .map_err(|_| Error::decode("negative latency_tolerance_ms in store"))?,
                model_profile: row.model_profile.parse()?,
            },
        })
    }
}
