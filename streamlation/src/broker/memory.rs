//! In-memory status broker for test wiring and the in-process mode.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::broadcast;
use tracing::debug;

use crate::Result;
use crate::broker::{DEFAULT_SUBSCRIBER_BUFFER, StatusBroker, Subscription};
use crate::domain::SessionStatusEvent;
use crate::error::Error;

/// Broker backed by one broadcast ring per session.
///
/// The membership table is guarded by a mutex; event dispatch goes through
/// the per-session broadcast channel so publishers never hold the table
/// lock while delivering. A subscriber that falls behind loses the oldest
/// buffered events and is told so through its error stream.
pub struct MemoryStatusBroker {
    channels: Mutex<HashMap<String, broadcast::Sender<SessionStatusEvent>>>,
    buffer: usize,
}

impl MemoryStatusBroker {
    pub fn new() -> Self {
        Self::with_buffer(DEFAULT_SUBSCRIBER_BUFFER)
    }

    /// Use a custom per-subscriber buffer size.
    pub fn with_buffer(buffer: usize) -> Self {
        Self {
            channels: Mutex::new(HashMap::new()),
            buffer: buffer.max(1),
        }
    }

    fn drop_channel_if_idle(&self, session_id: &str) {
        let mut channels = self.channels.lock();
        if let Some(tx) = channels.get(session_id) {
            if tx.receiver_count() == 0 {
                channels.remove(session_id);
            }
        }
    }
}

impl Default for MemoryStatusBroker {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StatusBroker for MemoryStatusBroker {
    async fn publish(&self, event: SessionStatusEvent) -> Result<()> {
        let sender = self.channels.lock().get(&event.session_id).cloned();
        let Some(sender) = sender else {
            // No subscriber has ever asked for this session.
            return Ok(());
        };
        let session_id = event.session_id.clone();
        if sender.send(event).is_err() {
            self.drop_channel_if_idle(&session_id);
        }
        Ok(())
    }

    async fn subscribe(&self, session_id: &str) -> Result<Subscription> {
        let mut rx = {
            let mut channels = self.channels.lock();
            channels
                .entry(session_id.to_string())
                .or_insert_with(|| broadcast::channel(self.buffer).0)
                .subscribe()
        };

        let (subscription, event_tx, error_tx, closer) = Subscription::channel(self.buffer);

        let session = session_id.to_string();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = closer.cancelled() => break,
                    received = rx.recv() => match received {
                        Ok(event) => {
                            if event_tx.send(event).await.is_err() {
                                break;
                            }
                        }
                        Err(broadcast::error::RecvError::Lagged(dropped)) => {
                            debug!(session, dropped, "Subscriber lagged, events dropped");
                            if error_tx
                                .send(Error::SubscriberLagged { dropped })
                                .await
                                .is_err()
                            {
                                break;
                            }
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    },
                }
            }
        });

        Ok(subscription)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Stage, state};
    use std::time::Duration;

    fn event(session: &str, state: &str) -> SessionStatusEvent {
        SessionStatusEvent::new(session, Stage::Ingestion, state)
    }

    async fn recv(
        subscription: &mut Subscription,
    ) -> Option<SessionStatusEvent> {
        tokio::time::timeout(Duration::from_secs(2), subscription.events.recv())
            .await
            .expect("timed out waiting for event")
    }

    #[tokio::test]
    async fn delivers_in_publish_order() {
        let broker = MemoryStatusBroker::new();
        let mut subscription = broker.subscribe("session-a").await.unwrap();

        for s in ["one", "two", "three"] {
            broker.publish(event("session-a", s)).await.unwrap();
        }

        assert_eq!(recv(&mut subscription).await.unwrap().state, "one");
        assert_eq!(recv(&mut subscription).await.unwrap().state, "two");
        assert_eq!(recv(&mut subscription).await.unwrap().state, "three");
    }

    #[tokio::test]
    async fn does_not_deliver_events_before_subscription() {
        let broker = MemoryStatusBroker::new();
        broker.publish(event("session-a", "early")).await.unwrap();

        let mut subscription = broker.subscribe("session-a").await.unwrap();
        broker.publish(event("session-a", "late")).await.unwrap();

        assert_eq!(recv(&mut subscription).await.unwrap().state, "late");
    }

    #[tokio::test]
    async fn sessions_are_isolated() {
        let broker = MemoryStatusBroker::new();
        let mut sub_a = broker.subscribe("session-a").await.unwrap();
        let _sub_b = broker.subscribe("session-b").await.unwrap();

        broker.publish(event("session-b", "other")).await.unwrap();
        broker.publish(event("session-a", "mine")).await.unwrap();

        assert_eq!(recv(&mut sub_a).await.unwrap().state, "mine");
    }

    #[tokio::test]
    async fn overflow_drops_oldest_and_signals_lag() {
        let broker = MemoryStatusBroker::with_buffer(4);
        let mut subscription = broker.subscribe("session-a").await.unwrap();

        // Saturate the ring before the relay gets a chance to drain.
        for i in 0..32 {
            broker
                .publish(event("session-a", &format!("state-{i}")))
                .await
                .unwrap();
        }

        let lag = tokio::time::timeout(Duration::from_secs(2), subscription.errors.recv())
            .await
            .expect("timed out waiting for lag signal")
            .expect("error stream closed");
        assert!(matches!(lag, Error::SubscriberLagged { dropped } if dropped > 0));

        // Delivered events are still in publish order after the gap.
        let first = recv(&mut subscription).await.unwrap();
        let second = recv(&mut subscription).await.unwrap();
        let first_idx: u32 = first.state.trim_start_matches("state-").parse().unwrap();
        let second_idx: u32 = second.state.trim_start_matches("state-").parse().unwrap();
        assert!(second_idx > first_idx);
    }

    #[tokio::test]
    async fn close_terminates_both_sequences() {
        let broker = MemoryStatusBroker::new();
        let mut subscription = broker.subscribe("session-a").await.unwrap();
        subscription.close();

        assert!(recv(&mut subscription).await.is_none());
        assert!(subscription.errors.recv().await.is_none());
    }

    #[tokio::test]
    async fn publish_without_subscribers_is_a_no_op() {
        let broker = MemoryStatusBroker::new();
        broker.publish(event("session-a", state::QUEUED)).await.unwrap();
    }
}
