use std::collections::HashSet;
use std::sync::Arc;

use crate::error::Result;
use crate::handlers::EmbeddingHandler;
use crate::queue::MessageQueue;

/// Polls the FIFO queue and drives the embedding handler.
///
/// Each invocation is single-threaded over its batch; scale comes from
/// running more workers against the queue, not from parallelism inside
/// one. Successful messages are acked; failed ones stay in flight and
/// redeliver when their visibility timeout lapses.
#[derive(Clone)]
pub struct QueueWorker {
    queue: Arc<dyn MessageQueue>,
    handler: EmbeddingHandler,
    batch_size: u32,
}

impl QueueWorker {
    pub fn new(queue: Arc<dyn MessageQueue>, handler: EmbeddingHandler, batch_size: u32) -> Self {
        Self {
            queue,
            handler,
            batch_size,
        }
    }

    /// Receive and process one batch. Returns the number of messages
    /// successfully processed and acked.
    pub async fn run_once(&self) -> Result<usize> {
        let messages = self.queue.receive(self.batch_size).await?;
        if messages.is_empty() {
            return Ok(0);
        }

        let result = self.handler.handle_batch(&messages).await;
        let failed: HashSet<&str> = result
            .batch_item_failures
            .iter()
            .map(|f| f.item_identifier.as_str())
            .collect();

        let mut acked = 0;
        for message in &messages {
            if failed.contains(message.message_id.as_str()) {
                continue;
            }
            self.queue.ack(&message.message_id).await?;
            acked += 1;
        }

        Ok(acked)
    }
}
