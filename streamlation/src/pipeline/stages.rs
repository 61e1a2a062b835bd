//! Stage processor contracts and deterministic stub implementations.
//!
//! Concrete ASR, machine-translation, TTS, and subtitle engines are
//! injected by production wiring; the stubs here are the deterministic
//! doubles used by the composition tests.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use ingest::MediaChunk;

use crate::Result;

/// Normalized audio handed from ingestion to recognition.
#[derive(Debug, Clone)]
pub struct AudioFrame {
    pub sequence: u64,
    pub timestamp: DateTime<Utc>,
    pub duration: Option<Duration>,
    pub samples: Bytes,
}

/// One recognized utterance.
#[derive(Debug, Clone, PartialEq)]
pub struct TranscriptSegment {
    pub sequence: u64,
    pub timestamp: DateTime<Utc>,
    pub text: String,
}

/// One translated utterance.
#[derive(Debug, Clone, PartialEq)]
pub struct TranslatedSegment {
    pub sequence: u64,
    pub timestamp: DateTime<Utc>,
    pub language: String,
    pub text: String,
}

/// A rendered subtitle cue.
#[derive(Debug, Clone, PartialEq)]
pub struct SubtitleCue {
    pub index: u64,
    pub text: String,
}

/// Final product of the output stage for one segment.
#[derive(Debug, Clone)]
pub struct OutputArtifact {
    pub sequence: u64,
    pub subtitle: SubtitleCue,
    pub dubbed_audio: Option<Bytes>,
}

/// Converts raw media chunks into normalized audio frames.
#[async_trait]
pub trait MediaNormalizer: Send + Sync {
    async fn normalize(&self, chunk: MediaChunk) -> Result<Vec<AudioFrame>>;
}

/// Converts audio frames into transcript segments.
#[async_trait]
pub trait SpeechRecognizer: Send + Sync {
    async fn transcribe(&self, frame: AudioFrame) -> Result<Vec<TranscriptSegment>>;
}

/// Translates transcript segments into the target language.
#[async_trait]
pub trait TranslationEngine: Send + Sync {
    async fn translate(
        &self,
        segment: TranscriptSegment,
        target_language: &str,
    ) -> Result<TranslatedSegment>;
}

/// Synthesizes dubbed audio for a translated segment.
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    async fn synthesize(&self, segment: &TranslatedSegment) -> Result<Bytes>;
}

/// Renders a subtitle cue for a translated segment.
#[async_trait]
pub trait SubtitleGenerator: Send + Sync {
    async fn render(&self, segment: &TranslatedSegment) -> Result<SubtitleCue>;
}

/// The five processors a stage chain is wired from.
#[derive(Clone)]
pub struct StageProcessors {
    pub normalizer: Arc<dyn MediaNormalizer>,
    pub recognizer: Arc<dyn SpeechRecognizer>,
    pub translator: Arc<dyn TranslationEngine>,
    pub synthesizer: Arc<dyn SpeechSynthesizer>,
    pub subtitles: Arc<dyn SubtitleGenerator>,
}

impl StageProcessors {
    /// Deterministic stub processors.
    pub fn stubs() -> Self {
        Self {
            normalizer: Arc::new(PassthroughNormalizer),
            recognizer: Arc::new(StubRecognizer),
            translator: Arc::new(TaggingTranslator),
            synthesizer: Arc::new(SilenceSynthesizer),
            subtitles: Arc::new(PlainSubtitleGenerator),
        }
    }
}

/// Passes each chunk through as a single audio frame.
pub struct PassthroughNormalizer;

#[async_trait]
impl MediaNormalizer for PassthroughNormalizer {
    async fn normalize(&self, chunk: MediaChunk) -> Result<Vec<AudioFrame>> {
        Ok(vec![AudioFrame {
            sequence: chunk.sequence,
            timestamp: chunk.timestamp,
            duration: chunk.duration,
            samples: chunk.payload,
        }])
    }
}

/// Produces one deterministic transcript segment per frame.
pub struct StubRecognizer;

#[async_trait]
impl SpeechRecognizer for StubRecognizer {
    async fn transcribe(&self, frame: AudioFrame) -> Result<Vec<TranscriptSegment>> {
        Ok(vec![TranscriptSegment {
            sequence: frame.sequence,
            timestamp: frame.timestamp,
            text: format!("utterance {}", frame.sequence),
        }])
    }
}

/// Tags the transcript text with the target language.
pub struct TaggingTranslator;

#[async_trait]
impl TranslationEngine for TaggingTranslator {
    async fn translate(
        &self,
        segment: TranscriptSegment,
        target_language: &str,
    ) -> Result<TranslatedSegment> {
        Ok(TranslatedSegment {
            sequence: segment.sequence,
            timestamp: segment.timestamp,
            language: target_language.to_string(),
            text: format!("[{target_language}] {}", segment.text),
        })
    }
}

/// Emits a fixed silent sample buffer per segment.
pub struct SilenceSynthesizer;

#[async_trait]
impl SpeechSynthesizer for SilenceSynthesizer {
    async fn synthesize(&self, _segment: &TranslatedSegment) -> Result<Bytes> {
        Ok(Bytes::from_static(&[0u8; 16]))
    }
}

/// Renders the translated text as a bare cue.
pub struct PlainSubtitleGenerator;

#[async_trait]
impl SubtitleGenerator for PlainSubtitleGenerator {
    async fn render(&self, segment: &TranslatedSegment) -> Result<SubtitleCue> {
        Ok(SubtitleCue {
            index: segment.sequence,
            text: segment.text.clone(),
        })
    }
}
