//! Redis-backed job queue.

use std::time::Duration;

use async_trait::async_trait;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;

use crate::domain::IngestionJob;
use crate::queue::{INGESTION_QUEUE_TOPIC, JobQueue};
use crate::{Error, Result};

/// FIFO over a Redis list: LPUSH producers, BRPOP consumers.
pub struct RedisJobQueue {
    manager: ConnectionManager,
    topic: String,
}

impl RedisJobQueue {
    /// Connect to the given Redis instance on the default topic.
    pub async fn connect(url: &str) -> Result<Self> {
        let client = redis::Client::open(url)
            .map_err(|e| Error::fatal(format!("invalid redis url: {e}")))?;
        let manager = ConnectionManager::new(client)
            .await
            .map_err(|e| Error::fatal(format!("cannot connect to redis: {e}")))?;
        Ok(Self {
            manager,
            topic: INGESTION_QUEUE_TOPIC.to_string(),
        })
    }
}

#[async_trait]
impl JobQueue for RedisJobQueue {
    async fn enqueue(&self, job: &IngestionJob) -> Result<()> {
        let payload = serde_json::to_string(job)?;
        let mut conn = self.manager.clone();
        let _: i64 = conn.lpush(&self.topic, payload).await?;
        Ok(())
    }

    async fn dequeue(&self, wait: Duration) -> Result<Option<IngestionJob>> {
        // BRPOP treats a timeout of 0 as "block forever"; keep the bounded
        // wait bounded.
        let timeout = wait.as_secs_f64().max(0.01);
        let mut conn = self.manager.clone();
        let popped: Option<(String, String)> = conn.brpop(&self.topic, timeout).await?;

        match popped {
            None => Ok(None),
            Some((_, payload)) => {
                let job: IngestionJob = serde_json::from_str(&payload)
                    .map_err(|e| Error::decode(format!("malformed job payload: {e}")))?;
                Ok(Some(job))
            }
        }
    }
}
