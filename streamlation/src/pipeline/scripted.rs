//! Sequential scripted runner.
//!
//! Emits the canonical stage event sequence with configurable delays. Used
//! as the worker's default wiring until real engines are injected, and as
//! the end-to-end orchestration fixture.

use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::domain::{SessionStatusEvent, Stage, TranslationSession, state};
use crate::pipeline::runner::{EventSink, PIPELINE_STAGES, PipelineRunner, emit_to};
use crate::{Error, Result};

/// Pre-scripted pipeline runner.
#[derive(Debug, Clone, Default)]
pub struct ScriptedRunner {
    stage_delay: Duration,
    fail_at: Option<Stage>,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sleep this long inside every stage.
    pub fn with_stage_delay(mut self, delay: Duration) -> Self {
        self.stage_delay = delay;
        self
    }

    /// Fail when the given stage runs, for failure-path tests.
    pub fn failing_at(mut self, stage: Stage) -> Self {
        self.fail_at = Some(stage);
        self
    }
}

#[async_trait]
impl PipelineRunner for ScriptedRunner {
    async fn run(
        &self,
        session: &TranslationSession,
        emit: Option<&dyn EventSink>,
        token: &CancellationToken,
    ) -> Result<()> {
        for stage in PIPELINE_STAGES {
            if token.is_cancelled() {
                return Err(Error::Canceled);
            }

            emit_to(
                emit,
                SessionStatusEvent::new(&session.id, stage, state::RUNNING),
            )
            .await?;

            if !self.stage_delay.is_zero() {
                tokio::select! {
                    _ = token.cancelled() => return Err(Error::Canceled),
                    _ = tokio::time::sleep(self.stage_delay) => {}
                }
            }

            if self.fail_at == Some(stage) {
                let cause = format!("scripted failure at stage {stage}");
                emit_to(
                    emit,
                    SessionStatusEvent::new(&session.id, stage, state::ERROR)
                        .with_detail(cause.clone()),
                )
                .await?;
                return Err(Error::transient("pipeline", cause));
            }

            emit_to(
                emit,
                SessionStatusEvent::new(&session.id, stage, state::COMPLETED),
            )
            .await?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{SessionOptions, SourceKind, SourceSpec};
    use parking_lot::Mutex;
    use std::sync::Arc;

    fn session() -> TranslationSession {
        TranslationSession {
            id: "session123".into(),
            source: SourceSpec {
                kind: SourceKind::Playlist,
                uri: "https://example.com/x.m3u8".into(),
            },
            target_language: "es".into(),
            options: SessionOptions::default(),
        }
    }

    #[derive(Default)]
    struct RecordingSink {
        events: Mutex<Vec<(Stage, String)>>,
    }

    #[async_trait]
    impl EventSink for RecordingSink {
        async fn emit(&self, event: SessionStatusEvent) -> Result<()> {
            self.events.lock().push((event.stage, event.state));
            Ok(())
        }
    }

    #[tokio::test]
    async fn emits_running_then_completed_per_stage_in_order() {
        let sink = Arc::new(RecordingSink::default());
        let runner = ScriptedRunner::new();

        runner
            .run(&session(), Some(sink.as_ref()), &CancellationToken::new())
            .await
            .unwrap();

        let events = sink.events.lock();
        let expected: Vec<(Stage, String)> = PIPELINE_STAGES
            .iter()
            .flat_map(|&stage| {
                [
                    (stage, state::RUNNING.to_string()),
                    (stage, state::COMPLETED.to_string()),
                ]
            })
            .collect();
        assert_eq!(*events, expected);
    }

    #[tokio::test]
    async fn failure_emits_error_and_skips_downstream() {
        let sink = Arc::new(RecordingSink::default());
        let runner = ScriptedRunner::new().failing_at(Stage::Asr);

        let err = runner
            .run(&session(), Some(sink.as_ref()), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Transient { .. }));

        let events = sink.events.lock();
        assert_eq!(
            *events,
            vec![
                (Stage::Ingestion, state::RUNNING.to_string()),
                (Stage::Ingestion, state::COMPLETED.to_string()),
                (Stage::Normalization, state::RUNNING.to_string()),
                (Stage::Normalization, state::COMPLETED.to_string()),
                (Stage::Asr, state::RUNNING.to_string()),
                (Stage::Asr, state::ERROR.to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn cancellation_stops_without_further_events() {
        let sink = Arc::new(RecordingSink::default());
        let runner = ScriptedRunner::new().with_stage_delay(Duration::from_secs(30));
        let token = CancellationToken::new();
        token.cancel();

        let err = runner
            .run(&session(), Some(sink.as_ref()), &token)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Canceled));
        assert!(sink.events.lock().is_empty());
    }

    #[tokio::test]
    async fn nil_emit_is_tolerated() {
        let runner = ScriptedRunner::new();
        runner
            .run(&session(), None, &CancellationToken::new())
            .await
            .unwrap();
    }
}
