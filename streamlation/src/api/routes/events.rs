//! Live session event subscriptions over WebSocket.
//!
//! Bridges a broker subscription to a long-lived frame stream: every event
//! is one JSON text frame. The bridge heartbeats with pings, enforces a
//! read-inactivity deadline, answers client pings, and closes with code
//! 1000 on server shutdown or 1011 on internal failure.

use std::time::Duration;

use axum::{
    extract::{
        Path, State,
        ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade, close_code},
    },
    response::IntoResponse,
};
use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::api::error::ApiError;
use crate::api::server::AppState;
use crate::broker::Subscription;
use crate::domain::is_valid_session_id;
use crate::error::Error;

/// Interval between server-sent pings.
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(15);

/// A connection with no inbound frames for this long is torn down.
const READ_DEADLINE: Duration = Duration::from_secs(30);

/// Upgrade a client connection into a live event stream.
pub async fn subscribe_events(
    ws: WebSocketUpgrade,
    Path(id): Path<String>,
    State(app): State<AppState>,
) -> Result<impl IntoResponse, ApiError> {
    if !is_valid_session_id(&id) {
        return Err(ApiError::validation("invalid session id"));
    }
    // Subscribing to a session that was never registered is a client error.
    app.store.get(&id).await?;

    let subscription = app.broker.subscribe(&id).await?;
    let shutdown = app.shutdown.clone();

    Ok(ws.on_upgrade(move |socket| handle_socket(socket, id, subscription, shutdown)))
}

/// Pump broker events to the client until either side goes away.
async fn handle_socket(
    socket: WebSocket,
    session_id: String,
    mut subscription: Subscription,
    shutdown: CancellationToken,
) {
    let (mut sender, mut receiver) = socket.split();

    let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
    heartbeat.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    let mut read_deadline = tokio::time::Instant::now() + READ_DEADLINE;

    loop {
        tokio::select! {
            event = subscription.events.recv() => match event {
                Some(event) => {
                    let Ok(payload) = serde_json::to_string(&event) else {
                        continue;
                    };
                    if sender.send(Message::Text(payload.into())).await.is_err() {
                        break;
                    }
                }
                None => {
                    send_close(&mut sender, close_code::NORMAL, "subscription ended").await;
                    break;
                }
            },

            broker_err = subscription.errors.recv() => match broker_err {
                // Drop-oldest overflow: the stream continues with a gap.
                Some(Error::SubscriberLagged { dropped }) => {
                    warn!(session_id, dropped, "Subscriber lagging, events dropped");
                }
                Some(e) => {
                    warn!(session_id, error = %e, "Broker subscription failed");
                    send_close(&mut sender, close_code::ERROR, "broker failure").await;
                    break;
                }
                None => {
                    send_close(&mut sender, close_code::NORMAL, "subscription ended").await;
                    break;
                }
            },

            frame = receiver.next() => match frame {
                Some(Ok(Message::Close(_))) => {
                    send_close(&mut sender, close_code::NORMAL, "").await;
                    break;
                }
                Some(Ok(Message::Ping(data))) => {
                    read_deadline = tokio::time::Instant::now() + READ_DEADLINE;
                    if sender.send(Message::Pong(data)).await.is_err() {
                        break;
                    }
                }
                Some(Ok(_)) => {
                    // Client payloads are accepted and discarded.
                    read_deadline = tokio::time::Instant::now() + READ_DEADLINE;
                }
                Some(Err(e)) => {
                    debug!(session_id, error = %e, "Client read failed");
                    break;
                }
                None => break,
            },

            _ = tokio::time::sleep_until(read_deadline) => {
                debug!(session_id, "Read deadline exceeded, closing");
                send_close(&mut sender, close_code::ERROR, "inactivity").await;
                break;
            }

            _ = heartbeat.tick() => {
                if sender.send(Message::Ping(Bytes::new())).await.is_err() {
                    break;
                }
            }

            _ = shutdown.cancelled() => {
                send_close(&mut sender, close_code::NORMAL, "server shutting down").await;
                break;
            }
        }
    }

    subscription.close();
    debug!(session_id, "Event stream closed");
}

async fn send_close(
    sender: &mut (impl futures::Sink<Message> + Unpin),
    code: u16,
    reason: &'static str,
) {
    let _ = sender
        .send(Message::Close(Some(CloseFrame {
            code,
            reason: reason.into(),
        })))
        .await;
}
