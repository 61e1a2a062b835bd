//! In-memory job queue for test wiring and the in-process mode.

use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio::time::Instant;

use crate::Result;
use crate::domain::IngestionJob;
use crate::queue::JobQueue;

/// FIFO backed by a `VecDeque`, with `Notify`-based wakeup for blocked
/// dequeuers.
#[derive(Default)]
pub struct MemoryJobQueue {
    jobs: Mutex<VecDeque<IngestionJob>>,
    notify: Notify,
}

impl MemoryJobQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current queue depth.
    pub fn depth(&self) -> usize {
        self.jobs.lock().len()
    }
}

#[async_trait]
impl JobQueue for MemoryJobQueue {
    async fn enqueue(&self, job: &IngestionJob) -> Result<()> {
        self.jobs.lock().push_back(job.clone());
        self.notify.notify_one();
        Ok(())
    }

    async fn dequeue(&self, wait: Duration) -> Result<Option<IngestionJob>> {
        let deadline = Instant::now() + wait;
        loop {
            // Register interest before checking so an enqueue between the
            // check and the await is not missed.
            let notified = self.notify.notified();
            if let Some(job) = self.jobs.lock().pop_front() {
                return Ok(Some(job));
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Ok(None);
            }
            let _ = tokio::time::timeout(remaining, notified).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn dequeue_is_fifo() {
        let queue = MemoryJobQueue::new();
        queue.enqueue(&IngestionJob::new("first-session")).await.unwrap();
        queue.enqueue(&IngestionJob::new("second-session")).await.unwrap();

        let a = queue.dequeue(Duration::from_millis(10)).await.unwrap();
        let b = queue.dequeue(Duration::from_millis(10)).await.unwrap();
        assert_eq!(a.unwrap().session_id, "first-session");
        assert_eq!(b.unwrap().session_id, "second-session");
        assert_eq!(queue.depth(), 0);
    }

    #[tokio::test]
    async fn empty_dequeue_returns_none_after_wait() {
        let queue = MemoryJobQueue::new();
        let start = Instant::now();
        let job = queue.dequeue(Duration::from_millis(50)).await.unwrap();
        assert!(job.is_none());
        assert!(start.elapsed() >= Duration::from_millis(50));
    }

    #[tokio::test]
    async fn blocked_dequeue_wakes_on_enqueue() {
        let queue = std::sync::Arc::new(MemoryJobQueue::new());

        let waiter = {
            let queue = queue.clone();
            tokio::spawn(async move { queue.dequeue(Duration::from_secs(5)).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        queue.enqueue(&IngestionJob::new("late-session")).await.unwrap();

        let job = waiter.await.unwrap().unwrap();
        assert_eq!(job.unwrap().session_id, "late-session");
    }
}
