//! Session status telemetry events.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Pipeline stage (or meta-scope) an event refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Session,
    Ingestion,
    Normalization,
    Asr,
    Translation,
    Output,
    Pipeline,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Session => "session",
            Stage::Ingestion => "ingestion",
            Stage::Normalization => "normalization",
            Stage::Asr => "asr",
            Stage::Translation => "translation",
            Stage::Output => "output",
            Stage::Pipeline => "pipeline",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Well-known state tokens. The field itself is free-form.
pub mod state {
    pub const REGISTERED: &str = "registered";
    pub const QUEUED: &str = "queued";
    pub const DEQUEUED: &str = "dequeued";
    pub const READY: &str = "ready";
    pub const RUNNING: &str = "running";
    pub const COMPLETED: &str = "completed";
    pub const ERROR: &str = "error";
    pub const NOT_FOUND: &str = "not_found";
}

/// One telemetry record published to the status broker.
///
/// The timestamp is set at construction, before broker acceptance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStatusEvent {
    pub session_id: String,
    pub stage: Stage,
    pub state: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl SessionStatusEvent {
    pub fn new(session_id: impl Into<String>, stage: Stage, state: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            stage,
            state: state.into(),
            detail: None,
            timestamp: Utc::now(),
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_camel_case_without_empty_detail() {
        let event = SessionStatusEvent::new("session123", Stage::Ingestion, state::QUEUED);
        let json = serde_json::to_value(&event).unwrap();

        assert_eq!(json["sessionId"], "session123");
        assert_eq!(json["stage"], "ingestion");
        assert_eq!(json["state"], "queued");
        assert!(json.get("detail").is_none());
        assert!(json.get("timestamp").is_some());
    }

    #[test]
    fn round_trips_with_detail() {
        let event = SessionStatusEvent::new("session123", Stage::Pipeline, state::ERROR)
            .with_detail("stage asr failed");
        let json = serde_json::to_string(&event).unwrap();
        let back: SessionStatusEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back, event);
    }
}
