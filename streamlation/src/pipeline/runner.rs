//! Pipeline runner contract.

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::Result;
use crate::broker::StatusBroker;
use crate::domain::{SessionStatusEvent, Stage, TranslationSession};

/// The five processing stages, in execution order.
pub const PIPELINE_STAGES: [Stage; 5] = [
    Stage::Ingestion,
    Stage::Normalization,
    Stage::Asr,
    Stage::Translation,
    Stage::Output,
];

/// Receiver of stage events emitted while a pipeline runs.
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn emit(&self, event: SessionStatusEvent) -> Result<()>;
}

/// Emit through an optional sink; an absent sink is a no-op so the runner
/// still drives side-effectful stages.
pub async fn emit_to(sink: Option<&dyn EventSink>, event: SessionStatusEvent) -> Result<()> {
    match sink {
        Some(sink) => sink.emit(event).await,
        None => Ok(()),
    }
}

/// Sink that publishes stage events to the status broker.
///
/// Publishing is best-effort: a broker failure is logged and never fails
/// the pipeline that produced the event.
pub struct BrokerEventSink {
    broker: Arc<dyn StatusBroker>,
}

impl BrokerEventSink {
    pub fn new(broker: Arc<dyn StatusBroker>) -> Self {
        Self { broker }
    }
}

#[async_trait]
impl EventSink for BrokerEventSink {
    async fn emit(&self, event: SessionStatusEvent) -> Result<()> {
        if let Err(e) = self.broker.publish(event).await {
            warn!(error = %e, "Failed to publish stage event");
        }
        Ok(())
    }
}

/// Drives one session through all pipeline stages.
///
/// Per stage the runner emits `running` before the stage begins and
/// `completed` after it succeeds; a failing stage emits `error` with the
/// cause, skips everything downstream, and the failure propagates up.
/// Cancellation returns [`crate::Error::Canceled`] without emitting
/// further events.
#[async_trait]
pub trait PipelineRunner: Send + Sync {
    async fn run(
        &self,
        session: &TranslationSession,
        emit: Option<&dyn EventSink>,
        token: &CancellationToken,
    ) -> Result<()>;
}
