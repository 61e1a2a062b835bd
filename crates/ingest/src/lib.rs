//! # Stream Ingestion Adapters
//!
//! This crate converts a media source into a lazy sequence of [`MediaChunk`]s.
//! Three adapters are provided, one per source strategy:
//!
//! - [`PlaylistAdapter`]: polls a line-oriented text playlist over HTTP and
//!   downloads newly published segments.
//! - [`FramedTcpAdapter`]: consumes a magic-prefixed, length-framed TCP feed.
//! - [`FileAdapter`]: reads a local file in fixed-size chunks.
//!
//! All adapters share the same contract: [`stream`](PlaylistAdapter::stream)
//! spawns a producer task and returns a [`ChunkStream`] holding two bounded
//! receivers, one for chunks and one for errors. Both receivers terminate
//! together when the producer stops, either through cancellation of the
//! supplied token or a permanent source failure. Counters are exposed through
//! a shared [`StreamMetrics`] handle.

use tokio::sync::mpsc;

mod chunk;
mod error;
mod file;
mod metrics;
mod playlist;
mod tcp;

pub use chunk::MediaChunk;
pub use error::IngestError;
pub use file::{FileAdapter, FileAdapterConfig};
pub use metrics::{MetricsSnapshot, StreamMetrics};
pub use playlist::{PlaylistAdapter, PlaylistConfig};
pub use tcp::{FramedTcpAdapter, FramedTcpConfig, DEFAULT_MAGIC};

/// Default capacity for adapter chunk channels.
pub(crate) const DEFAULT_BUFFER_SIZE: usize = 32;

/// Capacity of the error channel shared by all adapters.
///
/// At most one error is kept in flight; overflow is dropped so a slow
/// consumer never stalls the producer.
pub(crate) const ERROR_CHANNEL_CAPACITY: usize = 1;

/// The pair of lazy sequences produced by an ingestion adapter.
///
/// Both receivers are closed by the producer task when it terminates, so
/// draining `chunks` to `None` is the end-of-stream signal.
pub struct ChunkStream {
    /// Media chunks in emission order, sequence numbers strictly increasing.
    pub chunks: mpsc::Receiver<MediaChunk>,
    /// Source errors, at most one in flight.
    pub errors: mpsc::Receiver<IngestError>,
}

/// Send an error without ever blocking the producer.
///
/// The error channel has capacity one; if an earlier error has not been
/// consumed yet the new one is dropped on the floor, matching the
/// at-most-one-in-flight contract.
pub(crate) fn offer_error(
    errors: &mpsc::Sender<IngestError>,
    metrics: &StreamMetrics,
    err: IngestError,
) {
    metrics.record_error();
    let _ = errors.try_send(err);
}
