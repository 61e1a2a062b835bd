//! The ingestion job: the queue element referring to a session.

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// A queued request to start ingesting one session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestionJob {
    pub session_id: String,
}

impl IngestionJob {
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
        }
    }

    /// Producer-side check: a job without a session id must never be
    /// enqueued.
    pub fn validate(&self) -> Result<()> {
        if self.session_id.is_empty() {
            return Err(Error::validation("job is missing session_id"));
        }
        Ok(())
    }
}
