//! Playlist-polling HTTP adapter.
//!
//! Polls a line-oriented text playlist, downloads newly published segments,
//! and emits each one as a [`MediaChunk`]. Fetch failures back off
//! exponentially; segments whose download fails are retried on the next
//! cycle; a bounded seen-set keeps re-published segment URIs from being
//! downloaded twice.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};
use url::Url;

use crate::{
    ChunkStream, IngestError, MediaChunk, StreamMetrics, DEFAULT_BUFFER_SIZE,
    ERROR_CHANNEL_CAPACITY, offer_error,
};

/// Configuration for [`PlaylistAdapter`].
#[derive(Debug, Clone)]
pub struct PlaylistConfig {
    /// Playlist URI to poll.
    pub playlist_url: String,
    /// Delay between successful poll cycles.
    pub poll_interval: Duration,
    /// Capacity of the chunk channel; a full channel drops chunks.
    pub buffer_size: usize,
    /// Base delay after a playlist fetch failure.
    pub retry_backoff: Duration,
    /// Cap on the doubled retry delay.
    pub max_retry_backoff: Duration,
    /// Size of the segment dedup window.
    pub max_seen_segments: usize,
    /// Per-request deadline for playlist and segment fetches.
    pub request_timeout: Duration,
}

impl PlaylistConfig {
    /// Create a configuration for the given playlist URI with defaults.
    pub fn new(playlist_url: impl Into<String>) -> Self {
        Self {
            playlist_url: playlist_url.into(),
            poll_interval: Duration::from_secs(2),
            buffer_size: DEFAULT_BUFFER_SIZE,
            retry_backoff: Duration::from_secs(1),
            max_retry_backoff: Duration::from_secs(30),
            max_seen_segments: 128,
            request_timeout: Duration::from_secs(10),
        }
    }
}

/// One segment entry parsed out of a playlist document.
#[derive(Debug, Clone, PartialEq)]
struct SegmentDescriptor {
    uri: Url,
    duration: Option<f64>,
}

/// Bounded dedup window over segment URIs.
///
/// Entries remember the sequence position at which they were inserted;
/// pruning evicts entries inserted at or before `counter - max`, so the
/// window tracks the most recent `max` emitted segments.
struct SeenSegments {
    max: usize,
    entries: HashMap<String, u64>,
}

impl SeenSegments {
    fn new(max: usize) -> Self {
        Self {
            max: max.max(1),
            entries: HashMap::new(),
        }
    }

    fn contains(&self, uri: &str) -> bool {
        self.entries.contains_key(uri)
    }

    fn insert(&mut self, uri: String, position: u64) {
        self.entries.insert(uri, position);
    }

    /// Forget a URI so the next cycle retries it.
    fn remove(&mut self, uri: &str) {
        self.entries.remove(uri);
    }

    fn prune(&mut self, counter: u64) {
        if self.entries.len() <= self.max {
            return;
        }
        let threshold = counter.saturating_sub(self.max as u64);
        self.entries.retain(|_, inserted_at| *inserted_at > threshold);
    }
}

/// Parse a playlist document into segment descriptors.
///
/// Lines beginning with `#EXTINF:` carry a floating-point seconds duration
/// up to the first comma; the next non-comment line is the segment URI.
/// Relative URIs resolve against the playlist URI.
fn parse_playlist(base: &Url, body: &str) -> Vec<SegmentDescriptor> {
    let mut segments = Vec::new();
    let mut pending_duration: Option<f64> = None;

    for line in body.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if let Some(rest) = line.strip_prefix("#EXTINF:") {
            let duration_token = rest.split(',').next().unwrap_or("").trim();
            pending_duration = duration_token.parse::<f64>().ok();
            continue;
        }
        if line.starts_with('#') {
            continue;
        }
        match base.join(line) {
            Ok(uri) => segments.push(SegmentDescriptor {
                uri,
                duration: pending_duration.take(),
            }),
            Err(e) => {
                warn!(segment = line, error = %e, "Skipping unresolvable segment URI");
                pending_duration = None;
            }
        }
    }

    segments
}

/// Playlist-polling HTTP ingestion adapter.
pub struct PlaylistAdapter {
    config: PlaylistConfig,
    playlist_url: Url,
    client: reqwest::Client,
    metrics: Arc<StreamMetrics>,
}

impl PlaylistAdapter {
    /// Create an adapter, validating the playlist URI.
    pub fn new(config: PlaylistConfig, client: reqwest::Client) -> Result<Self, IngestError> {
        let playlist_url = Url::parse(&config.playlist_url)
            .map_err(|e| IngestError::InvalidConfig(format!("playlist URL: {e}")))?;
        Ok(Self {
            config,
            playlist_url,
            client,
            metrics: Arc::new(StreamMetrics::new()),
        })
    }

    /// Shared counters handle, valid for the lifetime of the stream.
    pub fn metrics(&self) -> Arc<StreamMetrics> {
        self.metrics.clone()
    }

    /// Spawn the polling task and return its output streams.
    pub fn stream(self, token: CancellationToken) -> ChunkStream {
        let (chunk_tx, chunk_rx) = mpsc::channel(self.config.buffer_size.max(1));
        let (error_tx, error_rx) = mpsc::channel(ERROR_CHANNEL_CAPACITY);

        tokio::spawn(poll_loop(
            self.config,
            self.playlist_url,
            self.client,
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

async fn poll_loop(
    config: PlaylistConfig,
    playlist_url: Url,
    client: reqwest::Client,
    metrics: Arc<StreamMetrics>,
    chunk_tx: mpsc::Sender<MediaChunk>,
    error_tx: mpsc::Sender<IngestError>,
    token: CancellationToken,
) {
    let mut seen = SeenSegments::new(config.max_seen_segments);
    let mut counter: u64 = 0;
    let mut backoff = config.retry_backoff;

    'poll: while !token.is_cancelled() {
        let body = match fetch_playlist(&client, &playlist_url, config.request_timeout).await {
            Ok(body) => {
                backoff = config.retry_backoff;
                body
            }
            Err(err) => {
                warn!(url = %playlist_url, error = %err, "Playlist fetch failed, backing off");
                offer_error(&error_tx, &metrics, err);
                metrics.record_reconnect();
                tokio::select! {
                    _ = token.cancelled() => break 'poll,
                    _ = tokio::time::sleep(backoff) => {}
                }
                backoff = backoff.saturating_mul(2).min(config.max_retry_backoff);
                continue;
            }
        };

        for segment in parse_playlist(&playlist_url, &body) {
            if token.is_cancelled() {
                break 'poll;
            }
            let key = segment.uri.as_str().to_string();
            if seen.contains(&key) {
                trace!(uri = %segment.uri, "Segment already seen, skipping");
                continue;
            }
            seen.insert(key.clone(), counter + 1);

            let payload =
                match fetch_segment(&client, &segment.uri, config.request_timeout).await {
                    Ok(payload) => payload,
                    Err(err) => {
                        // Retried on the next cycle.
                        seen.remove(&key);
                        warn!(uri = %segment.uri, error = %err, "Segment download failed");
                        offer_error(&error_tx, &metrics, err);
                        continue;
                    }
                };

            counter += 1;
            let mut chunk = MediaChunk::new(counter, payload)
                .with_metadata("segment_uri", segment.uri.as_str());
            if let Some(seconds) = segment.duration {
                chunk = chunk.with_duration(Duration::from_secs_f64(seconds.max(0.0)));
            }

            metrics.record_received(counter);
            match chunk_tx.try_send(chunk) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => {
                    debug!(sequence = counter, "Chunk buffer full, dropping segment");
                    metrics.record_dropped();
                }
                Err(TrySendError::Closed(_)) => break 'poll,
            }
            seen.prune(counter);
        }

        tokio::select! {
            _ = token.cancelled() => break 'poll,
            _ = tokio::time::sleep(config.poll_interval) => {}
        }
    }
}

async fn fetch_playlist(
    client: &reqwest::Client,
    url: &Url,
    timeout: Duration,
) -> Result<String, IngestError> {
    let response = client.get(url.clone()).timeout(timeout).send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(IngestError::HttpStatus {
            status: status.as_u16(),
            uri: url.to_string(),
        });
    }
    Ok(response.text().await?)
}

async fn fetch_segment(
    client: &reqwest::Client,
    url: &Url,
    timeout: Duration,
) -> Result<bytes::Bytes, IngestError> {
    let response = client
        .get(url.clone())
        .timeout(timeout)
        .send()
        .await
        .map_err(|e| IngestError::Segment {
            uri: url.to_string(),
            reason: e.to_string(),
        })?;
    let status = response.status();
    if !status.is_success() {
        return Err(IngestError::Segment {
            uri: url.to_string(),
            reason: format!("HTTP {status}"),
        });
    }
    response.bytes().await.map_err(|e| IngestError::Segment {
        uri: url.to_string(),
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Url {
        Url::parse("https://example.com/live/stream.m3u8").unwrap()
    }

    #[test]
    fn parses_durations_and_relative_uris() {
        let body = "#EXTM3U\n\
                    #EXT-X-TARGETDURATION:4\n\
                    #EXTINF:4.2,\n\
                    seg-001.ts\n\
                    #EXTINF:3.8, title\n\
                    seg-002.ts\n";
        let segments = parse_playlist(&base(), body);

        assert_eq!(segments.len(), 2);
        assert_eq!(
            segments[0].uri.as_str(),
            "https://example.com/live/seg-001.ts"
        );
        assert_eq!(segments[0].duration, Some(4.2));
        assert_eq!(segments[1].duration, Some(3.8));
    }

    #[test]
    fn absolute_uris_pass_through() {
        let body = "#EXTINF:2.0,\nhttps://cdn.example.com/a.ts\n";
        let segments = parse_playlist(&base(), body);
        assert_eq!(segments[0].uri.as_str(), "https://cdn.example.com/a.ts");
    }

    #[test]
    fn comment_lines_do_not_consume_duration() {
        let body = "#EXTINF:5.0,\n#EXT-X-SOMETHING\nseg.ts\n";
        let segments = parse_playlist(&base(), body);
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].duration, Some(5.0));
    }

    #[test]
    fn uri_without_extinf_has_no_duration() {
        let segments = parse_playlist(&base(), "seg.ts\n");
        assert_eq!(segments[0].duration, None);
    }

    #[test]
    fn seen_set_prunes_oldest_entries() {
        let mut seen = SeenSegments::new(3);
        for i in 1..=5u64 {
            seen.insert(format!("seg-{i}"), i);
            seen.prune(i);
        }
        // Window of 3 around counter=5: entries at positions <= 2 evicted.
        assert!(!seen.contains("seg-1"));
        assert!(!seen.contains("seg-2"));
        assert!(seen.contains("seg-3"));
        assert!(seen.contains("seg-4"));
        assert!(seen.contains("seg-5"));
    }

    #[test]
    fn seen_set_removal_allows_retry() {
        let mut seen = SeenSegments::new(8);
        seen.insert("seg-1".into(), 1);
        assert!(seen.contains("seg-1"));
        seen.remove("seg-1");
        assert!(!seen.contains("seg-1"));
    }
}
