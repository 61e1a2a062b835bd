//! Per-session status event publish/subscribe.

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::Result;
use crate::domain::SessionStatusEvent;
use crate::error::Error;

mod memory;
mod redis;

pub use memory::MemoryStatusBroker;
pub use redis::{RedisStatusBroker, status_channel};

/// Default per-subscriber event buffer. Overflow drops the oldest events
/// and surfaces a [`Error::SubscriberLagged`] on the error stream.
pub const DEFAULT_SUBSCRIBER_BUFFER: usize = 64;

/// Capacity of a subscription's error stream.
const ERROR_STREAM_CAPACITY: usize = 8;

/// A live subscription to one session's status events.
///
/// Exposes two lazy sequences plus a close operation. Closing (or
/// dropping) the subscription terminates both sequences; the broker's
/// relay task is torn down with it.
pub struct Subscription {
    /// Decoded events, in publish order, starting after subscription time.
    pub events: mpsc::Receiver<SessionStatusEvent>,
    /// Transport or decode failures, and explicit drop signals.
    pub errors: mpsc::Receiver<Error>,
    closer: CancellationToken,
}

impl Subscription {
    pub(crate) fn channel(
        buffer: usize,
    ) -> (
        Self,
        mpsc::Sender<SessionStatusEvent>,
        mpsc::Sender<Error>,
        CancellationToken,
    ) {
        let (event_tx, event_rx) = mpsc::channel(buffer);
        let (error_tx, error_rx) = mpsc::channel(ERROR_STREAM_CAPACITY);
        let closer = CancellationToken::new();
        (
            Self {
                events: event_rx,
                errors: error_rx,
                closer: closer.clone(),
            },
            event_tx,
            error_tx,
            closer,
        )
    }

    /// Terminate both sequences.
    pub fn close(&self) {
        self.closer.cancel();
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.closer.cancel();
    }
}

/// Publish/subscribe broker for session status events.
#[async_trait]
pub trait StatusBroker: Send + Sync {
    /// Best-effort broadcast to subscribers of `event.session_id`.
    ///
    /// Callers treat failures as non-fatal: a lost telemetry event must
    /// not fail the work that produced it.
    async fn publish(&self, event: SessionStatusEvent) -> Result<()>;

    /// Open a subscription for one session's events.
    ///
    /// The subscription only observes events published after this call.
    async fn subscribe(&self, session_id: &str) -> Result<Subscription>;
}
