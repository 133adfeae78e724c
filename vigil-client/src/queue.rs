//! Redis-backed job queue
//!
//! Jobs are raw JSON payloads in a Redis list. Producers `LPUSH`, workers
//! `RPOP`, so the list behaves as a FIFO. Pops are atomic: each payload is
//! delivered to at most one worker.

use crate::error::Result;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;

/// Connection to one named job list
#[derive(Clone)]
pub struct RedisQueue {
    conn: ConnectionManager,
    queue_name: String,
}

impl RedisQueue {
    /// Connect to Redis at `url` (e.g. "redis://localhost:6379")
    ///
    /// The connection manager reconnects on its own after transient failures.
    pub async fn connect(url: &str, queue_name: impl Into<String>) -> Result<Self> {
        let client = redis::Client::open(url)?;
        let conn = ConnectionManager::new(client).await?;
        Ok(Self {
            conn,
            queue_name: queue_name.into(),
        })
    }

    pub fn queue_name(&self) -> &str {
        &self.queue_name
    }

    /// Take the oldest payload, or `None` when the list is empty
    pub async fn pop(&self) -> Result<Option<Vec<u8>>> {
        let mut conn = self.conn.clone();
        let payload: Option<Vec<u8>> = conn.rpop(&self.queue_name, None).await?;
        Ok(payload)
    }

    /// Append a payload, returning the new queue length
    pub async fn push(&self, payload: &[u8]) -> Result<usize> {
        let mut conn = self.conn.clone();
        let len: usize = conn.lpush(&self.queue_name, payload).await?;
        Ok(len)
    }

    /// Number of payloads waiting
    pub async fn len(&self) -> Result<usize> {
        let mut conn = self.conn.clone();
        let len: usize = conn.llen(&self.queue_name).await?;
        Ok(len)
    }
}
