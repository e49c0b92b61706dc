use async_trait::async_trait;
use redis::AsyncCommands;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, instrument};

#[derive(Error, Debug)]
pub enum QueueError {
    #[error("Failed to connect to queue: {0}")]
    ConnectionError(String),
    #[error("Failed to send message: {0}")]
    SendError(String),
    #[error("Failed to receive message: {0}")]
    ReceiveError(String),
}

/// FIFO queue of print job ids between the backend (producer) and the
/// print worker (consumer).
///
/// Delivery is at-most-once: a popped id that the consumer never acts on
/// is not reclaimed. Stuck jobs are recovered through the retry endpoint,
/// which re-enqueues them.
#[async_trait]
pub trait PrintQueue: Send + Sync {
    /// Appends a job id to the tail of the queue.
    async fn enqueue(&self, job_id: &str) -> Result<(), QueueError>;

    /// Pops the job id at the head of the queue, blocking up to `timeout`.
    /// Returns `None` when the queue stayed empty for the whole window.
    async fn dequeue(&self, timeout: Duration) -> Result<Option<String>, QueueError>;

    /// Number of jobs currently waiting.
    async fn len(&self) -> Result<usize, QueueError>;
}

/// Redis-backed queue: RPUSH on the producer side, BLPOP on the consumer
/// side, which yields strict FIFO ordering on a single list.
pub struct RedisPrintQueue {
    client: redis::Client,
    queue_name: String,
}

impl RedisPrintQueue {
    pub fn new(client: redis::Client, queue_name: String) -> Self {
        Self { client, queue_name }
    }

    pub fn from_url(redis_url: &str, queue_name: String) -> Result<Self, QueueError> {
        let client = redis::Client::open(redis_url)
            .map_err(|e| QueueError::ConnectionError(e.to_string()))?;
        Ok(Self::new(client, queue_name))
    }
}

#[async_trait]
impl PrintQueue for RedisPrintQueue {
    #[instrument(skip(self))]
    async fn enqueue(&self, job_id: &str) -> Result<(), QueueError> {
        let mut conn = self
            .client
            .get_async_connection()
            .await
            .map_err(|e| QueueError::ConnectionError(e.to_string()))?;

        conn.rpush::<_, _, ()>(&self.queue_name, job_id)
            .await
            .map_err(|e| QueueError::SendError(e.to_string()))?;
        debug!(queue = %self.queue_name, job_id = %job_id, "Enqueued print job");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn dequeue(&self, timeout: Duration) -> Result<Option<String>, QueueError> {
        let mut conn = self
            .client
            .get_async_connection()
            .await
            .map_err(|e| QueueError::ConnectionError(e.to_string()))?;

        let popped: Option<(String, String)> = redis::cmd("BLPOP")
            .arg(&self.queue_name)
            .arg(timeout.as_secs())
            .query_async(&mut conn)
            .await
            .map_err(|e| QueueError::ReceiveError(e.to_string()))?;

        Ok(popped.map(|(_, value)| value))
    }

    async fn len(&self) -> Result<usize, QueueError> {
        let mut conn = self
            .client
            .get_async_connection()
            .await
            .map_err(|e| QueueError::ConnectionError(e.to_string()))?;

        conn.llen(&self.queue_name)
            .await
            .map_err(|e| QueueError::ReceiveError(e.to_string()))
    }
}

/// In-memory queue for tests and single-process setups.
pub struct InMemoryPrintQueue {
    items: Arc<Mutex<VecDeque<String>>>,
    notify: Arc<tokio::sync::Notify>,
}

impl InMemoryPrintQueue {
    pub fn new() -> Self {
        Self {
            items: Arc::new(Mutex::new(VecDeque::new())),
            notify: Arc::new(tokio::sync::Notify::new()),
        }
    }
}

impl Default for InMemoryPrintQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PrintQueue for InMemoryPrintQueue {
    async fn enqueue(&self, job_id: &str) -> Result<(), QueueError> {
        self.items.lock().await.push_back(job_id.to_string());
        self.notify.notify_one();
        Ok(())
    }

    async fn dequeue(&self, timeout: Duration) -> Result<Option<String>, QueueError> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if let Some(item) = self.items.lock().await.pop_front() {
                return Ok(Some(item));
            }
            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            if remaining.is_zero() {
                return Ok(None);
            }
            let _ = tokio::time::timeout(remaining, self.notify.notified()).await;
        }
    }

    async fn len(&self) -> Result<usize, QueueError> {
        Ok(self.items.lock().await.len())
    }
}
