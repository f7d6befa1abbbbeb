mod fifo;

pub use fifo::LibSqlQueue;

use async_trait::async_trait;

use crate::error::Result;

/// SQS-style cap on batched sends.
pub const MAX_BATCH_SIZE: usize = 10;

/// One message to enqueue. `id` is the caller's correlation key for
/// batch outcomes; `group_id`/`dedup_id` carry the FIFO attributes.
#[derive(Debug, Clone)]
pub struct QueueEntry {
    pub id: String,
    pub body: String,
    pub group_id: String,
    pub dedup_id: String,
}

/// A received, in-flight message.
#[derive(Debug, Clone)]
pub struct QueueMessage {
    pub message_id: String,
    pub group_id: String,
    pub body: String,
    pub receive_count: u64,
}

#[derive(Debug, Clone)]
pub struct FailedEntry {
    pub id: String,
    pub message: String,
}

/// Per-entry outcome of a batched send. The API call can succeed while
/// individual entries fail; callers retry only the failed entries.
#[derive(Debug, Clone, Default)]
pub struct BatchSendOutcome {
    pub successful: Vec<String>,
    pub failed: Vec<FailedEntry>,
}

/// Durable FIFO queue contract.
///
/// Delivery is at-least-once. Messages in one group are delivered
/// strictly in enqueue order and never concurrently: while one message
/// of a group is in flight, the group is locked. A send whose dedup id
/// was already seen within the dedup window is accepted and dropped.
#[async_trait]
pub trait MessageQueue: Send + Sync {
    /// Enqueue a single message, returning its message id.
    async fn send(&self, entry: &QueueEntry) -> Result<String>;

    /// Enqueue up to [`MAX_BATCH_SIZE`] messages, reporting per-entry
    /// outcomes. Larger batches are rejected outright.
    async fn send_batch(&self, entries: &[QueueEntry]) -> Result<BatchSendOutcome>;

    /// Receive up to `max_messages` visible messages, at most one per
    /// group, marking them in flight for the visibility timeout.
    async fn receive(&self, max_messages: u32) -> Result<Vec<QueueMessage>>;

    /// Acknowledge (delete) a processed message. Unacked messages become
    /// visible again when their visibility timeout lapses.
    async fn ack(&self, message_id: &str) -> Result<()>;
}
