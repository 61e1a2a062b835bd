//! Pipeline execution: runners, stage processors, and the worker pool.

mod chain;
mod runner;
mod scripted;
mod stages;
mod worker_pool;

pub use chain::{AdapterChunkSource, ChunkSource, StageChainRunner, StaticChunkSource};
pub use runner::{BrokerEventSink, EventSink, PIPELINE_STAGES, PipelineRunner, emit_to};
pub use scripted::ScriptedRunner;
pub use stages::{
    AudioFrame, MediaNormalizer, OutputArtifact, SpeechRecognizer, SpeechSynthesizer,
    StageProcessors, SubtitleCue, SubtitleGenerator, TranscriptSegment, TranslatedSegment,
    TranslationEngine,
};
pub use worker_pool::{WorkerPool, WorkerPoolConfig};
