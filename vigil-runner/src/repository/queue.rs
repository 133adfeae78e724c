//! Job queue repository
//!
//! Pulls raw job payloads. Once a payload is returned it is this worker's
//! responsibility; the queue offers no acknowledgement or redelivery.

use anyhow::{Context, Result};
use async_trait::async_trait;
use vigil_client::RedisQueue;

/// Repository trait for the job queue
#[async_trait]
pub trait JobQueue: Send + Sync {
    /// Takes the next raw payload, or `None` if the queue is empty
    async fn dequeue(&self) -> Result<Option<Vec<u8>>>;
}

#[async_trait]
impl JobQueue for RedisQueue {
    async fn dequeue(&self) -> Result<Option<Vec<u8>>> {
        self.pop()
            .await
            .with_context(|| format!("Failed to pop from queue '{}'", self.queue_name()))
    }
}
