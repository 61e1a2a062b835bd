//! Channel-based stage chain runner.
//!
//! Wires the five stage processors into a single-producer single-consumer
//! chain: each stage runs in its own task, consumes the upstream stage's
//! receiver, and produces its own. Cancellation of the session token
//! terminates every stage.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use ingest::{
    ChunkStream, FileAdapter, FileAdapterConfig, FramedTcpAdapter, FramedTcpConfig, MediaChunk,
    PlaylistAdapter, PlaylistConfig,
};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::warn;
use url::Url;

use crate::domain::{SessionStatusEvent, SourceKind, Stage, TranslationSession, state};
use crate::pipeline::runner::{EventSink, PipelineRunner, emit_to};
use crate::pipeline::stages::{OutputArtifact, StageProcessors};
use crate::{Error, Result};

/// Default capacity for channels between stages.
const DEFAULT_CHANNEL_CAPACITY: usize = 32;

/// Opens the chunk stream feeding a session's pipeline.
#[async_trait]
pub trait ChunkSource: Send + Sync {
    async fn open(
        &self,
        session: &TranslationSession,
        token: CancellationToken,
    ) -> Result<ChunkStream>;
}

/// Production source: builds the ingestion adapter matching the session's
/// source kind. DASH manifests are polled the same way playlists are.
pub struct AdapterChunkSource {
    client: reqwest::Client,
}

impl AdapterChunkSource {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ChunkSource for AdapterChunkSource {
    async fn open(
        &self,
        session: &TranslationSession,
        token: CancellationToken,
    ) -> Result<ChunkStream> {
        let uri = &session.source.uri;
        match session.source.kind {
            SourceKind::Playlist | SourceKind::Dash => {
                let adapter = PlaylistAdapter::new(PlaylistConfig::new(uri), self.client.clone())
                    .map_err(|e| Error::validation(e.to_string()))?;
                Ok(adapter.stream(token))
            }
            SourceKind::FramedTcp => {
                let parsed = Url::parse(uri).map_err(|e| Error::validation(e.to_string()))?;
                let host = parsed
                    .host_str()
                    .ok_or_else(|| Error::validation("framed-tcp URI is missing a host"))?;
                let port = parsed
                    .port()
                    .ok_or_else(|| Error::validation("framed-tcp URI is missing a port"))?;
                let adapter = FramedTcpAdapter::new(FramedTcpConfig::new(format!("{host}:{port}")))
                    .map_err(|e| Error::validation(e.to_string()))?;
                Ok(adapter.stream(token))
            }
            SourceKind::File => {
                let parsed = Url::parse(uri).map_err(|e| Error::validation(e.to_string()))?;
                let path = parsed
                    .to_file_path()
                    .map_err(|_| Error::validation("file URI is not a local path"))?;
                let adapter = FileAdapter::new(FileAdapterConfig::new(path))
                    .map_err(|e| Error::validation(e.to_string()))?;
                Ok(adapter.stream(token))
            }
        }
    }
}

/// Test source: replays a fixed chunk list, then terminates.
pub struct StaticChunkSource {
    chunks: Vec<MediaChunk>,
}

impl StaticChunkSource {
    pub fn new(chunks: Vec<MediaChunk>) -> Self {
        Self { chunks }
    }
}

#[async_trait]
impl ChunkSource for StaticChunkSource {
    async fn open(
        &self,
        _session: &TranslationSession,
        _token: CancellationToken,
    ) -> Result<ChunkStream> {
        let (chunk_tx, chunks) = mpsc::channel(self.chunks.len().max(1));
        let (_error_tx, errors) = mpsc::channel(1);
        for chunk in &self.chunks {
            // Capacity covers the whole list; this never blocks.
            let _ = chunk_tx.try_send(chunk.clone());
        }
        Ok(ChunkStream { chunks, errors })
    }
}

/// Pipeline runner composing the five stage processors over channels.
pub struct StageChainRunner {
    source: Arc<dyn ChunkSource>,
    processors: StageProcessors,
    channel_size: usize,
    artifacts: Option<mpsc::Sender<OutputArtifact>>,
}

impl StageChainRunner {
    pub fn new(source: Arc<dyn ChunkSource>, processors: StageProcessors) -> Self {
        Self {
            source,
            processors,
            channel_size: DEFAULT_CHANNEL_CAPACITY,
            artifacts: None,
        }
    }

    /// Set the capacity of the channels between stages.
    pub fn with_channel_size(mut self, size: usize) -> Self {
        self.channel_size = size.max(1);
        self
    }

    /// Deliver output artifacts to the given channel as they are produced.
    pub fn with_artifact_output(mut self, artifacts: mpsc::Sender<OutputArtifact>) -> Self {
        self.artifacts = Some(artifacts);
        self
    }
}

/// Spawn one middle stage: consume `rx`, apply `f`, send into `tx`.
///
/// A closed downstream receiver ends the stage without error; processor
/// failures propagate to the supervisor.
fn spawn_stage<I, O, F, Fut>(
    token: CancellationToken,
    mut rx: mpsc::Receiver<I>,
    tx: mpsc::Sender<O>,
    mut f: F,
) -> JoinHandle<Result<()>>
where
    I: Send + 'static,
    O: Send + 'static,
    F: FnMut(I) -> Fut + Send + 'static,
    Fut: Future<Output = Result<Vec<O>>> + Send,
{
    tokio::spawn(async move {
        loop {
            let item = tokio::select! {
                _ = token.cancelled() => return Err(Error::Canceled),
                item = rx.recv() => item,
            };
            let Some(item) = item else {
                return Ok(());
            };
            for produced in f(item).await? {
                tokio::select! {
                    _ = token.cancelled() => return Err(Error::Canceled),
                    sent = tx.send(produced) => {
                        if sent.is_err() {
                            return Ok(());
                        }
                    }
                }
            }
        }
    })
}

#[async_trait]
impl PipelineRunner for StageChainRunner {
    async fn run(
        &self,
        session: &TranslationSession,
        emit: Option<&dyn EventSink>,
        token: &CancellationToken,
    ) -> Result<()> {
        let chain_token = token.child_token();

        emit_to(
            emit,
            SessionStatusEvent::new(&session.id, Stage::Ingestion, state::RUNNING),
        )
        .await?;

        let stream = match self.source.open(session, chain_token.clone()).await {
            Ok(stream) => stream,
            Err(e) => {
                emit_to(
                    emit,
                    SessionStatusEvent::new(&session.id, Stage::Ingestion, state::ERROR)
                        .with_detail(e.to_string()),
                )
                .await?;
                return Err(e);
            }
        };

        let ChunkStream {
            chunks: mut source_chunks,
            errors: mut source_errors,
        } = stream;

        // Source errors are retried inside the adapter; here they are only
        // observed for the log.
        let error_session = session.id.clone();
        tokio::spawn(async move {
            while let Some(err) = source_errors.recv().await {
                warn!(session = error_session, error = %err, "Ingestion source error");
            }
        });

        let (chunk_tx, chunk_rx) = mpsc::channel::<MediaChunk>(self.channel_size);
        let (frame_tx, frame_rx) = mpsc::channel(self.channel_size);
        let (transcript_tx, transcript_rx) = mpsc::channel(self.channel_size);
        let (translated_tx, translated_rx) = mpsc::channel(self.channel_size);

        // Ingestion: pump the adapter's chunk stream into the chain.
        let ingestion = {
            let token = chain_token.clone();
            tokio::spawn(async move {
                loop {
                    let chunk = tokio::select! {
                        _ = token.cancelled() => return Err(Error::Canceled),
                        chunk = source_chunks.recv() => chunk,
                    };
                    let Some(chunk) = chunk else {
                        return Ok(());
                    };
                    tokio::select! {
                        _ = token.cancelled() => return Err(Error::Canceled),
                        sent = chunk_tx.send(chunk) => {
                            if sent.is_err() {
                                return Ok(());
                            }
                        }
                    }
                }
            })
        };

        let normalization = {
            let normalizer = self.processors.normalizer.clone();
            spawn_stage(chain_token.clone(), chunk_rx, frame_tx, move |chunk| {
                let normalizer = normalizer.clone();
                async move { normalizer.normalize(chunk).await }
            })
        };

        let asr = {
            let recognizer = self.processors.recognizer.clone();
            spawn_stage(chain_token.clone(), frame_rx, transcript_tx, move |frame| {
                let recognizer = recognizer.clone();
                async move { recognizer.transcribe(frame).await }
            })
        };

        let translation = {
            let translator = self.processors.translator.clone();
            let language = session.target_language.clone();
            spawn_stage(
                chain_token.clone(),
                transcript_rx,
                translated_tx,
                move |segment| {
                    let translator = translator.clone();
                    let language = language.clone();
                    async move { Ok(vec![translator.translate(segment, &language).await?]) }
                },
            )
        };

        // Output: render subtitles, synthesize dubbing when enabled.
        let output = {
            let token = chain_token.clone();
            let subtitles = self.processors.subtitles.clone();
            let synthesizer = self.processors.synthesizer.clone();
            let enable_dubbing = session.options.enable_dubbing;
            let artifacts = self.artifacts.clone();
            let mut translated_rx = translated_rx;
            tokio::spawn(async move {
                loop {
                    let segment = tokio::select! {
                        _ = token.cancelled() => return Err(Error::Canceled),
                        segment = translated_rx.recv() => segment,
                    };
                    let Some(segment) = segment else {
                        return Ok(());
                    };
                    let subtitle = subtitles.render(&segment).await?;
                    let dubbed_audio = if enable_dubbing {
                        Some(synthesizer.synthesize(&segment).await?)
                    } else {
                        None
                    };
                    if let Some(artifacts) = &artifacts {
                        let artifact = OutputArtifact {
                            sequence: segment.sequence,
                            subtitle,
                            dubbed_audio,
                        };
                        // A departed artifact consumer is not a stage failure.
                        let _ = artifacts.send(artifact).await;
                    }
                }
            })
        };

        let stages = [
            (Stage::Ingestion, ingestion),
            (Stage::Normalization, normalization),
            (Stage::Asr, asr),
            (Stage::Translation, translation),
            (Stage::Output, output),
        ];

        // Await stage tasks in chain order, emitting events as each one
        // settles. Upstream tasks always settle before downstream ones
        // because channel closure propagates down the chain, so observers
        // see stage events in pipeline order.
        let mut first = true;
        for (stage, handle) in stages {
            if !first {
                emit_to(
                    emit,
                    SessionStatusEvent::new(&session.id, stage, state::RUNNING),
                )
                .await?;
            }
            first = false;

            let joined = tokio::select! {
                _ = token.cancelled() => return Err(Error::Canceled),
                joined = handle => joined,
            };
            match joined {
                Ok(Ok(())) => {
                    emit_to(
                        emit,
                        SessionStatusEvent::new(&session.id, stage, state::COMPLETED),
                    )
                    .await?;
                }
                Ok(Err(Error::Canceled)) => return Err(Error::Canceled),
                Ok(Err(e)) => {
                    emit_to(
                        emit,
                        SessionStatusEvent::new(&session.id, stage, state::ERROR)
                            .with_detail(e.to_string()),
                    )
                    .await?;
                    chain_token.cancel();
                    return Err(e);
                }
                Err(join_err) => {
                    let e = Error::transient("pipeline", format!("stage task failed: {join_err}"));
                    emit_to(
                        emit,
                        SessionStatusEvent::new(&session.id, stage, state::ERROR)
                            .with_detail(e.to_string()),
                    )
                    .await?;
                    chain_token.cancel();
                    return Err(e);
                }
            }
        }

        Ok(())
    }
}
