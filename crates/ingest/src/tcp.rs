//! Framed TCP ingestion adapter.
//!
//! Speaks a fixed-magic handshake followed by `(u32 big-endian length,
//! payload)` frames. Any connection or read failure emits one error, closes
//! the connection, and reconnects after a delay.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::{
    ChunkStream, IngestError, MediaChunk, StreamMetrics, DEFAULT_BUFFER_SIZE,
    ERROR_CHANNEL_CAPACITY, offer_error,
};

/// Magic token exchanged during the handshake.
pub const DEFAULT_MAGIC: &[u8; 8] = b"STRMLTN1";

/// Configuration for [`FramedTcpAdapter`].
#[derive(Debug, Clone)]
pub struct FramedTcpConfig {
    /// Remote address, `host:port`.
    pub addr: String,
    /// Handshake token; the peer must echo it back verbatim.
    pub magic: Vec<u8>,
    /// Bound on the wait between frames.
    pub read_timeout: Duration,
    /// Delay before reconnecting after a failure.
    pub reconnect_delay: Duration,
    /// Capacity of the chunk channel; a full channel drops frames.
    pub buffer_size: usize,
    /// Upper bound on a single frame's declared length.
    pub max_frame_len: usize,
}

impl FramedTcpConfig {
    /// Create a configuration for the given remote address with defaults.
    pub fn new(addr: impl Into<String>) -> Self {
        Self {
            addr: addr.into(),
            magic: DEFAULT_MAGIC.to_vec(),
            read_timeout: Duration::from_secs(30),
            reconnect_delay: Duration::from_secs(3),
            buffer_size: DEFAULT_BUFFER_SIZE,
            max_frame_len: 16 * 1024 * 1024,
        }
    }
}

/// Framed TCP ingestion adapter.
pub struct FramedTcpAdapter {
    config: FramedTcpConfig,
    metrics: Arc<StreamMetrics>,
}

impl FramedTcpAdapter {
    pub fn new(config: FramedTcpConfig) -> Result<Self, IngestError> {
        if config.magic.is_empty() {
            return Err(IngestError::InvalidConfig(
                "handshake magic must not be empty".into(),
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
    config: FramedTcpConfig,
    metrics: Arc<StreamMetrics>,
    chunk_tx: mpsc::Sender<MediaChunk>,
    error_tx: mpsc::Sender<IngestError>,
    token: CancellationToken,
) {
    let mut sequence: u64 = 0;
    let mut first_attempt = true;

    'connect: while !token.is_cancelled() {
        if !first_attempt {
            metrics.record_reconnect();
            tokio::select! {
                _ = token.cancelled() => break 'connect,
                _ = tokio::time::sleep(config.reconnect_delay) => {}
            }
        }
        first_attempt = false;

        let mut stream = tokio::select! {
            _ = token.cancelled() => break 'connect,
            connected = TcpStream::connect(&config.addr) => match connected {
                Ok(stream) => stream,
                Err(e) => {
                    warn!(addr = %config.addr, error = %e, "Connect failed");
                    offer_error(&error_tx, &metrics, IngestError::Io(e));
                    continue 'connect;
                }
            },
        };

        if let Err(err) = handshake(&mut stream, &config).await {
            warn!(addr = %config.addr, error = %err, "Handshake failed");
            offer_error(&error_tx, &metrics, err);
            continue 'connect;
        }
        debug!(addr = %config.addr, "Framed TCP session established");

        loop {
            let frame = tokio::select! {
                _ = token.cancelled() => break 'connect,
                frame = read_frame(&mut stream, &config) => frame,
            };
            match frame {
                Ok(None) => continue, // zero-length framing
                Ok(Some(payload)) => {
                    sequence += 1;
                    let chunk = MediaChunk::new(sequence, payload)
                        .with_metadata("remote_addr", config.addr.clone());
                    metrics.record_received(sequence);
                    match chunk_tx.try_send(chunk) {
                        Ok(()) => {}
                        Err(TrySendError::Full(_)) => {
                            debug!(sequence, "Chunk buffer full, dropping frame");
                            metrics.record_dropped();
                        }
                        Err(TrySendError::Closed(_)) => break 'connect,
                    }
                }
                Err(err) => {
                    warn!(addr = %config.addr, error = %err, "Read failed, reconnecting");
                    offer_error(&error_tx, &metrics, err);
                    continue 'connect;
                }
            }
        }
    }
}

/// Send the magic token and require the peer to echo it back.
async fn handshake(stream: &mut TcpStream, config: &FramedTcpConfig) -> Result<(), IngestError> {
    stream.write_all(&config.magic).await?;
    let mut echo = vec![0u8; config.magic.len()];
    timed_read(stream, &mut echo, config.read_timeout).await?;
    if echo != config.magic {
        return Err(IngestError::Handshake(format!(
            "peer returned {} unexpected bytes",
            echo.len()
        )));
    }
    Ok(())
}

/// Read one `(u32 BE length, payload)` frame.
///
/// Returns `Ok(None)` for a zero-length framing. The timeout is re-armed
/// for each read.
async fn read_frame(
    stream: &mut TcpStream,
    config: &FramedTcpConfig,
) -> Result<Option<Bytes>, IngestError> {
    let mut len_buf = [0u8; 4];
    timed_read(stream, &mut len_buf, config.read_timeout).await?;
    let len = u32::from_be_bytes(len_buf) as usize;
    if len == 0 {
        return Ok(None);
    }
    if len > config.max_frame_len {
        return Err(IngestError::FrameTooLarge {
            len,
            max: config.max_frame_len,
        });
    }

    let mut payload = vec![0u8; len];
    timed_read(stream, &mut payload, config.read_timeout).await?;
    Ok(Some(Bytes::from(payload)))
}

async fn timed_read(
    stream: &mut TcpStream,
    buf: &mut [u8],
    timeout: Duration,
) -> Result<(), IngestError> {
    match tokio::time::timeout(timeout, stream.read_exact(buf)).await {
        Ok(Ok(_)) => Ok(()),
        Ok(Err(e)) => Err(IngestError::Io(e)),
        Err(_) => Err(IngestError::ReadTimeout(timeout)),
    }
}
