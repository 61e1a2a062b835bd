//! Worker pool scenarios with in-memory wiring.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use streamlation::Result;
use streamlation::broker::{MemoryStatusBroker, StatusBroker, Subscription};
use streamlation::database::{MemorySessionRepository, SessionRepository};
use streamlation::domain::{
    IngestionJob, SessionOptions, SourceKind, SourceSpec, TranslationSession,
};
use streamlation::pipeline::{EventSink, PipelineRunner, ScriptedRunner, WorkerPool, WorkerPoolConfig};
use streamlation::queue::{JobQueue, MemoryJobQueue};
use tokio_util::sync::CancellationToken;

fn session(id: &str) -> TranslationSession {
    TranslationSession {
        id: id.to_string(),
        source: SourceSpec {
            kind: SourceKind::Playlist,
            uri: "https://example.com/x.m3u8".into(),
        },
        target_language: "es".into(),
        options: SessionOptions::default(),
    }
}

fn fast_config(max_concurrency: usize) -> WorkerPoolConfig {
    WorkerPoolConfig {
        max_concurrency,
        poll_interval: Duration::from_millis(20),
        idle_delay: Duration::from_millis(20),
        shutdown_grace: Duration::from_secs(1),
    }
}

async fn next_event(subscription: &mut Subscription) -> (String, String) {
    let event = tokio::time::timeout(Duration::from_secs(2), subscription.events.recv())
        .await
        .expect("timed out waiting for event")
        .expect("event stream closed");
    (event.stage.to_string(), event.state)
}

/// The full event trail of one successfully processed job.
fn happy_path_trail() -> Vec<(String, String)> {
    let mut expected = vec![
        ("ingestion".to_string(), "dequeued".to_string()),
        ("ingestion".to_string(), "ready".to_string()),
    ];
    for stage in ["ingestion", "normalization", "asr", "translation", "output"] {
        expected.push((stage.to_string(), "running".to_string()));
        expected.push((stage.to_string(), "completed".to_string()));
    }
    expected
}

#[tokio::test]
async fn worker_processes_a_job_through_all_stages_in_order() {
    let store = Arc::new(MemorySessionRepository::new());
    let queue = Arc::new(MemoryJobQueue::new());
    let broker = Arc::new(MemoryStatusBroker::new());

    store.create(&session("abcdefgh")).await.unwrap();
    queue.enqueue(&IngestionJob::new("abcdefgh")).await.unwrap();
    let mut subscription = broker.subscribe("abcdefgh").await.unwrap();

    let pool = Arc::new(WorkerPool::new(
        fast_config(2),
        store,
        queue,
        broker,
        Arc::new(ScriptedRunner::new()),
    ));
    let token = CancellationToken::new();
    let run = {
        let pool = pool.clone();
        let token = token.clone();
        tokio::spawn(async move { pool.run(token).await })
    };

    for expected in happy_path_trail() {
        assert_eq!(next_event(&mut subscription).await, expected);
    }

    token.cancel();
    run.await.unwrap();
}

#[tokio::test]
async fn missing_session_is_reported_once_and_work_continues() {
    let store = Arc::new(MemorySessionRepository::new());
    let queue = Arc::new(MemoryJobQueue::new());
    let broker = Arc::new(MemoryStatusBroker::new());

    store.create(&session("abcdefgh")).await.unwrap();
    queue.enqueue(&IngestionJob::new("ghost-session")).await.unwrap();
    queue.enqueue(&IngestionJob::new("abcdefgh")).await.unwrap();

    let mut ghost_sub = broker.subscribe("ghost-session").await.unwrap();
    let mut live_sub = broker.subscribe("abcdefgh").await.unwrap();

    let pool = Arc::new(WorkerPool::new(
        fast_config(1),
        store,
        queue,
        broker,
        Arc::new(ScriptedRunner::new()),
    ));
    let token = CancellationToken::new();
    let run = {
        let pool = pool.clone();
        let token = token.clone();
        tokio::spawn(async move { pool.run(token).await })
    };

    assert_eq!(
        next_event(&mut ghost_sub).await,
        ("ingestion".to_string(), "dequeued".to_string())
    );
    assert_eq!(
        next_event(&mut ghost_sub).await,
        ("session".to_string(), "not_found".to_string())
    );

    // The next job is processed normally.
    for expected in happy_path_trail() {
        assert_eq!(next_event(&mut live_sub).await, expected);
    }

    // No further events for the ghost session.
    let extra = tokio::time::timeout(Duration::from_millis(200), ghost_sub.events.recv()).await;
    assert!(extra.is_err(), "ghost session received an extra event");

    token.cancel();
    run.await.unwrap();
}

/// Runner that records how many pipelines run at once.
struct GaugeRunner {
    current: AtomicUsize,
    peak: AtomicUsize,
    completed: AtomicUsize,
}

impl GaugeRunner {
    fn new() -> Self {
        Self {
            current: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
            completed: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl PipelineRunner for GaugeRunner {
    async fn run(
        &self,
        _session: &TranslationSession,
        _emit: Option<&dyn EventSink>,
        _token: &CancellationToken,
    ) -> Result<()> {
        let current = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(current, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(50)).await;
        self.current.fetch_sub(1, Ordering::SeqCst);
        self.completed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[tokio::test]
async fn in_flight_pipelines_never_exceed_max_concurrency() {
    let store = Arc::new(MemorySessionRepository::new());
    let queue = Arc::new(MemoryJobQueue::new());
    let broker = Arc::new(MemoryStatusBroker::new());
    let runner = Arc::new(GaugeRunner::new());

    for i in 0..6 {
        let id = format!("session-{i:03}");
        store.create(&session(&id)).await.unwrap();
        queue.enqueue(&IngestionJob::new(&id)).await.unwrap();
    }

    let pool = Arc::new(WorkerPool::new(
        fast_config(2),
        store,
        queue,
        broker,
        runner.clone(),
    ));
    let token = CancellationToken::new();
    let run = {
        let pool = pool.clone();
        let token = token.clone();
        tokio::spawn(async move { pool.run(token).await })
    };

    tokio::time::timeout(Duration::from_secs(5), async {
        while runner.completed.load(Ordering::SeqCst) < 6 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("jobs did not finish");

    assert!(
        runner.peak.load(Ordering::SeqCst) <= 2,
        "peak concurrency {} exceeded the configured bound",
        runner.peak.load(Ordering::SeqCst)
    );

    token.cancel();
    run.await.unwrap();
}

#[tokio::test]
async fn cancellation_drains_in_flight_jobs_and_their_events() {
    let store = Arc::new(MemorySessionRepository::new());
    let queue = Arc::new(MemoryJobQueue::new());
    let broker = Arc::new(MemoryStatusBroker::new());

    store.create(&session("abcdefgh")).await.unwrap();
    queue.enqueue(&IngestionJob::new("abcdefgh")).await.unwrap();
    let mut subscription = broker.subscribe("abcdefgh").await.unwrap();

    // Stage delays make the job outlive the cancellation below.
    let runner = Arc::new(ScriptedRunner::new().with_stage_delay(Duration::from_millis(20)));
    let pool = Arc::new(WorkerPool::new(
        fast_config(1),
        store,
        queue,
        broker,
        runner,
    ));
    let token = CancellationToken::new();
    let run = {
        let pool = pool.clone();
        let token = token.clone();
        tokio::spawn(async move { pool.run(token).await })
    };

    // Cancel as soon as the job is in flight.
    assert_eq!(
        next_event(&mut subscription).await,
        ("ingestion".to_string(), "dequeued".to_string())
    );
    token.cancel();

    // The full trail still arrives: the drain runs detached from the
    // cancelled context.
    let mut trail = happy_path_trail();
    trail.remove(0); // dequeued already consumed
    for expected in trail {
        assert_eq!(next_event(&mut subscription).await, expected);
    }

    tokio::time::timeout(Duration::from_secs(3), run)
        .await
        .expect("pool did not stop within the grace window")
        .unwrap();
}
