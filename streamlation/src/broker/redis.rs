//! Redis pub/sub status broker.

use async_trait::async_trait;
use futures::StreamExt;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use tracing::debug;

use crate::broker::{DEFAULT_SUBSCRIBER_BUFFER, StatusBroker, Subscription};
use crate::domain::SessionStatusEvent;
use crate::{Error, Result};

/// Pub/sub channel carrying one session's status events.
pub fn status_channel(session_id: &str) -> String {
    format!("streamlation:session:{session_id}:status")
}

/// Broker over Redis PUBLISH / SUBSCRIBE.
///
/// Publishing shares a managed connection; every subscription gets a
/// dedicated pub/sub connection with a relay task decoding messages into
/// the subscription's event stream.
pub struct RedisStatusBroker {
    client: redis::Client,
    manager: ConnectionManager,
}

impl RedisStatusBroker {
    /// Connect to the given Redis instance.
    pub async fn connect(url: &str) -> Result<Self> {
        let client = redis::Client::open(url)
            .map_err(|e| Error::fatal(format!("invalid redis url: {e}")))?;
        let manager = ConnectionManager::new(client.clone())
            .await
            .map_err(|e| Error::fatal(format!("cannot connect to redis: {e}")))?;
        Ok(Self { client, manager })
    }
}

#[async_trait]
impl StatusBroker for RedisStatusBroker {
    async fn publish(&self, event: SessionStatusEvent) -> Result<()> {
        let channel = status_channel(&event.session_id);
        let payload = serde_json::to_string(&event)?;
        let mut conn = self.manager.clone();
        let _: i64 = conn.publish(channel, payload).await?;
        Ok(())
    }

    async fn subscribe(&self, session_id: &str) -> Result<Subscription> {
        let channel = status_channel(session_id);
        let mut pubsub = self.client.get_async_pubsub().await?;
        pubsub.subscribe(&channel).await?;

        let (subscription, event_tx, error_tx, closer) =
            Subscription::channel(DEFAULT_SUBSCRIBER_BUFFER);

        let session = session_id.to_string();
        tokio::spawn(async move {
            let mut messages = pubsub.into_on_message();
            loop {
                tokio::select! {
                    _ = closer.cancelled() => break,
                    message = messages.next() => {
                        let Some(message) = message else { break };
                        let decoded = message
                            .get_payload::<String>()
                            .map_err(Error::from)
                            .and_then(|payload| {
                                serde_json::from_str::<SessionStatusEvent>(&payload)
                                    .map_err(|e| Error::decode(format!("malformed event: {e}")))
                            });
                        match decoded {
                            Ok(event) => {
                                if event_tx.send(event).await.is_err() {
                                    break;
                                }
                            }
                            Err(err) => {
                                // The next message is still processed.
                                if error_tx.send(err).await.is_err() {
                                    break;
                                }
                            }
                        }
                    }
                }
            }
            debug!(session, "Status subscription relay stopped");
        });

        Ok(subscription)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_name_embeds_session_id() {
        assert_eq!(
            status_channel("session123"),
            "streamlation:session:session123:status"
        );
    }
}
