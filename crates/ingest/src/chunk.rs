//! The unit of media handed from an ingestion adapter to the pipeline.

use std::collections::HashMap;
use std::time::Duration;

use bytes::Bytes;
use chrono::{DateTime, Utc};

/// A discrete piece of media emitted by an ingestion adapter.
#[derive(Debug, Clone)]
pub struct MediaChunk {
    /// Per-source sequence number, monotonically increasing from 1.
    pub sequence: u64,
    /// Time of emission.
    pub timestamp: DateTime<Utc>,
    /// Media duration of the chunk, when the source declares one.
    pub duration: Option<Duration>,
    /// Raw payload bytes.
    pub payload: Bytes,
    /// Source-specific annotations (segment URI, frame origin, ...).
    pub metadata: HashMap<String, String>,
}

impl MediaChunk {
    /// Create a chunk stamped with the current time and empty metadata.
    pub fn new(sequence: u64, payload: Bytes) -> Self {
        Self {
            sequence,
            timestamp: Utc::now(),
            duration: None,
            payload,
            metadata: HashMap::new(),
        }
    }

    /// Attach a declared media duration.
    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = Some(duration);
        self
    }

    /// Attach a metadata entry.
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}
