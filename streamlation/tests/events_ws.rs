//! Live event subscription over a real WebSocket connection.

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use streamlation::api::{AppState, build_router};
use streamlation::broker::{MemoryStatusBroker, StatusBroker};
use streamlation::database::{MemorySessionRepository, SessionRepository};
use streamlation::domain::{
    SessionOptions, SessionStatusEvent, SourceKind, SourceSpec, Stage, TranslationSession, state,
};
use streamlation::queue::MemoryJobQueue;
use tokio::net::TcpListener;
use tokio_tungstenite::tungstenite;
use tokio_util::sync::CancellationToken;

struct WsHarness {
    addr: std::net::SocketAddr,
    broker: Arc<MemoryStatusBroker>,
    shutdown: CancellationToken,
}

async fn spawn_server() -> WsHarness {
    let store = Arc::new(MemorySessionRepository::new());
    store
        .create(&TranslationSession {
            id: "session123".into(),
            source: SourceSpec {
                kind: SourceKind::Playlist,
                uri: "https://example.com/x.m3u8".into(),
            },
            target_language: "es".into(),
            options: SessionOptions::default(),
        })
        .await
        .unwrap();

    let broker = Arc::new(MemoryStatusBroker::new());
    let shutdown = CancellationToken::new();
    let state = AppState::new(
        store,
        Arc::new(MemoryJobQueue::new()),
        broker.clone(),
        shutdown.clone(),
    );

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let router = build_router(state);
    let server_shutdown = shutdown.clone();
    tokio::spawn(async move {
        axum::serve(listener, router)
            .with_graceful_shutdown(async move { server_shutdown.cancelled().await })
            .await
            .unwrap();
    });

    WsHarness {
        addr,
        broker,
        shutdown,
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn events_stream_as_json_text_frames() {
    let harness = spawn_server().await;

    let url = format!("ws://{}/sessions/session123/events", harness.addr);
    let (mut socket, _response) = tokio_tungstenite::connect_async(&url).await.unwrap();

    harness
        .broker
        .publish(SessionStatusEvent::new(
            "session123",
            Stage::Ingestion,
            state::QUEUED,
        ))
        .await
        .unwrap();
    harness
        .broker
        .publish(SessionStatusEvent::new(
            "session123",
            Stage::Ingestion,
            state::DEQUEUED,
        ))
        .await
        .unwrap();

    let mut states = Vec::new();
    while states.len() < 2 {
        let frame = tokio::time::timeout(Duration::from_secs(3), socket.next())
            .await
            .expect("timed out waiting for frame")
            .expect("connection closed early")
            .unwrap();
        match frame {
            tungstenite::Message::Text(text) => {
                let event: serde_json::Value = serde_json::from_str(text.as_str()).unwrap();
                assert_eq!(event["sessionId"], "session123");
                assert_eq!(event["stage"], "ingestion");
                states.push(event["state"].as_str().unwrap().to_string());
            }
            tungstenite::Message::Ping(_) => {}
            other => panic!("unexpected frame: {other:?}"),
        }
    }
    assert_eq!(states, vec!["queued", "dequeued"]);

    // Server-side shutdown closes with a normal-closure frame.
    harness.shutdown.cancel();
    let deadline = tokio::time::Instant::now() + Duration::from_secs(3);
    loop {
        let frame = tokio::time::timeout_at(deadline, socket.next())
            .await
            .expect("timed out waiting for close frame")
            .expect("stream ended without close frame")
            .unwrap();
        match frame {
            tungstenite::Message::Close(Some(close)) => {
                assert_eq!(close.code, tungstenite::protocol::frame::coding::CloseCode::Normal);
                break;
            }
            tungstenite::Message::Close(None) => break,
            _ => continue,
        }
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn invalid_session_id_rejects_the_upgrade() {
    let harness = spawn_server().await;

    let url = format!("ws://{}/sessions/short/events", harness.addr);
    let err = tokio_tungstenite::connect_async(&url).await.unwrap_err();
    match err {
        tungstenite::Error::Http(response) => {
            assert_eq!(response.status(), 400);
        }
        other => panic!("expected HTTP rejection, got {other:?}"),
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn unknown_session_rejects_with_not_found() {
    let harness = spawn_server().await;

    let url = format!("ws://{}/sessions/unknownsession99/events", harness.addr);
    let err = tokio_tungstenite::connect_async(&url).await.unwrap_err();
    match err {
        tungstenite::Error::Http(response) => {
            assert_eq!(response.status(), 404);
        }
        other => panic!("expected HTTP rejection, got {other:?}"),
    }
}
