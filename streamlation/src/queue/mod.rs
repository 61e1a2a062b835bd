//! FIFO queue of ingestion jobs.

use std::time::Duration;

use async_trait::async_trait;

use crate::Result;
use crate::domain::IngestionJob;

mod memory;
mod redis;

pub use memory::MemoryJobQueue;
pub use redis::RedisJobQueue;

/// Queue topic carrying ingestion jobs.
pub const INGESTION_QUEUE_TOPIC: &str = "streamlation:ingestion:sessions";

/// A FIFO of ingestion jobs with blocking dequeue and bounded wait.
#[async_trait]
pub trait JobQueue: Send + Sync {
    /// Append a job to the tail.
    async fn enqueue(&self, job: &IngestionJob) -> Result<()>;

    /// Remove and return the head job, waiting up to `wait` for one to
    /// appear. `Ok(None)` is not an error: it signals "idle, poll again".
    async fn dequeue(&self, wait: Duration) -> Result<Option<IngestionJob>>;
}
