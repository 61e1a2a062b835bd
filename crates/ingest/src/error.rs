//! Error type shared by the ingestion adapters.

use thiserror::Error;

/// Errors surfaced on an adapter's error channel.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("playlist fetch returned HTTP {status} for {uri}")]
    HttpStatus { status: u16, uri: String },

    #[error("playlist error: {0}")]
    Playlist(String),

    #[error("segment download failed for {uri}: {reason}")]
    Segment { uri: String, reason: String },

    #[error("handshake failed: {0}")]
    Handshake(String),

    #[error("frame exceeds maximum length: {len} > {max}")]
    FrameTooLarge { len: usize, max: usize },

    #[error("read timed out after {0:?}")]
    ReadTimeout(std::time::Duration),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid adapter configuration: {0}")]
    InvalidConfig(String),
}
