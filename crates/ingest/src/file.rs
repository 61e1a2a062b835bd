//! Chunked file ingestion adapter.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::io::AsyncReadExt;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::{
    ChunkStream, IngestError, MediaChunk, StreamMetrics, ERROR_CHANNEL_CAPACITY, offer_error,
};

/// Configuration for [`FileAdapter`].
#[derive(Debug, Clone)]
pub struct FileAdapterConfig {
    /// Path of the file to read.
    pub path: PathBuf,
    /// Bytes per chunk.
    pub chunk_size: usize,
    /// Fixed media duration tagged on every chunk, if any.
    pub chunk_duration: Option<Duration>,
    /// Capacity of the chunk channel.
    pub buffer_size: usize,
}

impl FileAdapterConfig {
    /// Create a configuration for the given path with defaults.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            chunk_size: 64 * 1024,
            chunk_duration: None,
            buffer_size: crate::DEFAULT_BUFFER_SIZE,
        }
    }
}

/// Local-file ingestion adapter. Terminates at EOF.
///
/// Unlike the real-time adapters, the chunk channel applies backpressure
/// instead of dropping: the file is read on demand, so a slow consumer
/// simply slows the read.
pub struct FileAdapter {
    config: FileAdapterConfig,
    metrics: Arc<StreamMetrics>,
}

impl FileAdapter {
    /// Create an adapter, validating the chunk geometry.
    pub fn new(config: FileAdapterConfig) -> Result<Self, IngestError> {
        if config.chunk_size == 0 {
            return Err(IngestError::InvalidConfig(
                "chunk_size must be at least 1".into(),
            ));
        }
        Ok(Self {
            config,
            metrics: Arc::new(StreamMetrics::new()),
        })
    }

    /// Shared counters handle, valid for the lifetime of the stream.
    pub fn metrics(&self) -> Arc<StreamMetrics> {
        self.metrics.clone()
    }

    /// Spawn the reader task and return its output streams.
    pub fn stream(self, token: CancellationToken) -> ChunkStream {
        let (chunk_tx, chunk_rx) = mpsc::channel(self.config.buffer_size.max(1));
        let (error_tx, error_rx) = mpsc::channel(ERROR_CHANNEL_CAPACITY);

        tokio::spawn(read_loop(
            self.config,
            self.metrics,
            chunk_tx,
            error_tx,
            token,
        ));

        ChunkStream {
            chunks: chunk_rx,
            errors: error_rx,
        }
    }
}

async fn read_loop(
    config: FileAdapterConfig,
    metrics: Arc<StreamMetrics>,
    chunk_tx: mpsc::Sender<MediaChunk>,
    error_tx: mpsc::Sender<IngestError>,
    token: CancellationToken,
) {
    let mut file = match tokio::fs::File::open(&config.path).await {
        Ok(file) => file,
        Err(e) => {
            offer_error(&error_tx, &metrics, IngestError::Io(e));
            return;
        }
    };

    let path = config.path.display().to_string();
    let mut sequence: u64 = 0;
    let mut buf = vec![0u8; config.chunk_size];

    loop {
        let read = tokio::select! {
            _ = token.cancelled() => return,
            read = file.read(&mut buf) => read,
        };
        let n = match read {
            Ok(0) => {
                debug!(path, chunks = sequence, "File fully ingested");
                return;
            }
            Ok(n) => n,
            Err(e) => {
                offer_error(&error_tx, &metrics, IngestError::Io(e));
                return;
            }
        };

        sequence += 1;
        let mut chunk = MediaChunk::new(sequence, Bytes::copy_from_slice(&buf[..n]))
            .with_metadata("path", path.clone());
        if let Some(duration) = config.chunk_duration {
            chunk = chunk.with_duration(duration);
        }
        metrics.record_received(sequence);

        tokio::select! {
            _ = token.cancelled() => return,
            sent = chunk_tx.send(chunk) => {
                if sent.is_err() {
                    return;
                }
            }
        }
    }
}
