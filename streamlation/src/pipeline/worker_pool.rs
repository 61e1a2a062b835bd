//! Bounded-concurrency worker pool consuming the ingestion queue.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::broker::StatusBroker;
use crate::database::SessionRepository;
use crate::domain::{IngestionJob, SessionStatusEvent, Stage, state};
use crate::pipeline::runner::{BrokerEventSink, PipelineRunner};
use crate::queue::JobQueue;

/// Configuration for the worker pool.
#[derive(Debug, Clone)]
pub struct WorkerPoolConfig {
    /// Maximum pipelines in flight (floor 1).
    pub max_concurrency: usize,
    /// Long-poll bound for queue dequeues.
    pub poll_interval: Duration,
    /// Sleep after a dequeue error before retrying.
    pub idle_delay: Duration,
    /// How long workers may drain in-flight jobs after cancellation.
    pub shutdown_grace: Duration,
}

impl Default for WorkerPoolConfig {
    fn default() -> Self {
        Self {
            max_concurrency: 4,
            poll_interval: Duration::from_secs(5),
            idle_delay: Duration::from_millis(500),
            shutdown_grace: Duration::from_millis(500),
        }
    }
}

/// Shared collaborators a worker needs to process one job.
struct JobContext {
    store: Arc<dyn SessionRepository>,
    broker: Arc<dyn StatusBroker>,
    runner: Arc<dyn PipelineRunner>,
}

/// Dequeues jobs and dispatches them to a fixed worker set.
///
/// At most `max_concurrency` pipelines run at once. On cancellation the
/// pool stops admitting work, lets workers drain in-flight jobs detached
/// from the cancelled context so their status events still publish, and
/// aborts whatever is left once the grace window elapses.
pub struct WorkerPool {
    config: WorkerPoolConfig,
    queue: Arc<dyn JobQueue>,
    context: Arc<JobContext>,
}

impl WorkerPool {
    pub fn new(
        config: WorkerPoolConfig,
        store: Arc<dyn SessionRepository>,
        queue: Arc<dyn JobQueue>,
        broker: Arc<dyn StatusBroker>,
        runner: Arc<dyn PipelineRunner>,
    ) -> Self {
        Self {
            config,
            queue,
            context: Arc::new(JobContext {
                store,
                broker,
                runner,
            }),
        }
    }

    /// Run the dispatcher until `token` is cancelled, then drain.
    pub async fn run(&self, token: CancellationToken) {
        let workers = self.config.max_concurrency.max(1);
        let (job_tx, job_rx) = mpsc::channel::<IngestionJob>(1);
        let job_rx = Arc::new(Mutex::new(job_rx));

        let mut tasks = JoinSet::new();
        for worker_id in 0..workers {
            let job_rx = job_rx.clone();
            let context = self.context.clone();
            tasks.spawn(async move {
                loop {
                    // The guard is released as soon as a job (or the end
                    // of the channel) is received, before processing.
                    let job = { job_rx.lock().await.recv().await };
                    let Some(job) = job else { break };
                    debug!(worker_id, session_id = job.session_id, "Job picked up");
                    process_job(&context, job).await;
                }
                debug!(worker_id, "Worker stopped");
            });
        }
        info!(workers, "Worker pool started");

        loop {
            if token.is_cancelled() {
                break;
            }
            let dequeued = tokio::select! {
                _ = token.cancelled() => break,
                dequeued = self.queue.dequeue(self.config.poll_interval) => dequeued,
            };
            match dequeued {
                // Idle: poll again.
                Ok(None) => continue,
                Ok(Some(job)) => {
                    // Blocks only on worker availability. No cancellation
                    // branch here: a dequeued job must reach a worker.
                    if job_tx.send(job).await.is_err() {
                        break;
                    }
                }
                Err(e) => {
                    error!(error = %e, "Queue dequeue failed");
                    tokio::select! {
                        _ = token.cancelled() => break,
                        _ = tokio::time::sleep(self.config.idle_delay) => {}
                    }
                }
            }
        }

        // Stop admitting new work; buffered jobs are still drained.
        drop(job_tx);
        info!("Worker pool draining in-flight jobs");

        let drained = tokio::time::timeout(self.config.shutdown_grace, async {
            while tasks.join_next().await.is_some() {}
        })
        .await;
        if drained.is_err() {
            warn!(
                grace_ms = self.config.shutdown_grace.as_millis() as u64,
                "Shutdown grace elapsed, aborting remaining workers"
            );
            tasks.abort_all();
            while tasks.join_next().await.is_some() {}
        }
        info!("Worker pool stopped");
    }
}

/// Process one dequeued job, publishing its status trail.
async fn process_job(context: &JobContext, job: IngestionJob) {
    let session_id = job.session_id;
    publish(
        context,
        SessionStatusEvent::new(&session_id, Stage::Ingestion, state::DEQUEUED),
    )
    .await;

    let session = match context.store.get(&session_id).await {
        Ok(session) => session,
        Err(e) if e.is_not_found() => {
            warn!(session_id, "Job references an unknown session");
            publish(
                context,
                SessionStatusEvent::new(&session_id, Stage::Session, state::NOT_FOUND),
            )
            .await;
            return;
        }
        Err(e) => {
            error!(session_id, error = %e, "Session lookup failed");
            publish(
                context,
                SessionStatusEvent::new(&session_id, Stage::Ingestion, state::ERROR)
                    .with_detail(e.to_string()),
            )
            .await;
            return;
        }
    };

    publish(
        context,
        SessionStatusEvent::new(&session_id, Stage::Ingestion, state::READY),
    )
    .await;

    let sink = BrokerEventSink::new(context.broker.clone());
    // Detached from the pool token: an in-flight job finishes (and its
    // events publish) even while the pool is shutting down.
    let job_token = CancellationToken::new();
    if let Err(e) = context
        .runner
        .run(&session, Some(&sink), &job_token)
        .await
    {
        error!(session_id, error = %e, "Pipeline failed");
        publish(
            context,
            SessionStatusEvent::new(&session_id, Stage::Pipeline, state::ERROR)
                .with_detail(e.to_string()),
        )
        .await;
    }
}

/// Best-effort publish: failures are logged, the job flow continues.
async fn publish(context: &JobContext, event: SessionStatusEvent) {
    if let Err(e) = context.broker.publish(event).await {
        warn!(error = %e, "Failed to publish worker event");
    }
}
