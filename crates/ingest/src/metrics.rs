//! Per-source ingestion counters.

use std::sync::atomic::{AtomicU64, Ordering};

/// Atomic counters tracked by every ingestion adapter.
///
/// All counters are monotonically non-decreasing except `last_sequence`,
/// which tracks the largest sequence number emitted so far. The snapshot is
/// eventually consistent: callers must not infer ordering between
/// `received` and `errors`.
#[derive(Debug, Default)]
pub struct StreamMetrics {
    received: AtomicU64,
    dropped: AtomicU64,
    errors: AtomicU64,
    reconnects: AtomicU64,
    last_sequence: AtomicU64,
}

/// Point-in-time view of a [`StreamMetrics`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub received: u64,
    pub dropped: u64,
    pub errors: u64,
    pub reconnects: u64,
    pub last_sequence: u64,
}

impl StreamMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a chunk delivered downstream.
    pub fn record_received(&self, sequence: u64) {
        self.received.fetch_add(1, Ordering::Relaxed);
        self.last_sequence.fetch_max(sequence, Ordering::Relaxed);
    }

    /// Record a chunk dropped because the buffer was full.
    pub fn record_dropped(&self) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a source error.
    pub fn record_error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a reconnect attempt after a failure.
    pub fn record_reconnect(&self) {
        self.reconnects.fetch_add(1, Ordering::Relaxed);
    }

    /// Take an eventually-consistent snapshot of all counters.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            received: self.received.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
            reconnects: self.reconnects.load(Ordering::Relaxed),
            last_sequence: self.last_sequence.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn last_sequence_never_decreases() {
        let metrics = StreamMetrics::new();
        metrics.record_received(5);
        metrics.record_received(3);
        metrics.record_received(8);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.received, 3);
        assert_eq!(snapshot.last_sequence, 8);
    }
}
