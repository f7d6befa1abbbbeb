use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{GeodexError, Result};
use crate::models::ConceptMessage;
use crate::queue::{MessageQueue, QueueEntry};

/// One catalog notification: an opaque JSON message plus the upstream
/// delivery id used for error reporting.
#[derive(Debug, Clone, Deserialize)]
pub struct NotificationRecord {
    #[serde(rename = "MessageId")]
    pub message_id: String,
    #[serde(rename = "Message")]
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct IngestResult {
    pub concept_id: String,
    pub status: &'static str,
    pub queue_message_id: String,
}

#[derive(Debug, Serialize)]
pub struct IngestFailure {
    pub message_id: String,
    pub error: String,
}

#[derive(Debug, Serialize)]
pub struct IngestSummary {
    pub processed: usize,
    pub failed: usize,
    pub results: Vec<IngestResult>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<IngestFailure>,
}

/// Receives concept notifications and forwards them to the FIFO queue
/// for ordered processing by the embedding handler.
pub struct IngestHandler {
    queue: Arc<dyn MessageQueue>,
}

impl IngestHandler {
    pub fn new(queue: Arc<dyn MessageQueue>) -> Self {
        Self { queue }
    }

    pub async fn handle_batch(&self, records: &[NotificationRecord]) -> IngestSummary {
        tracing::info!(count = records.len(), "Processing notification records");

        let mut results = Vec::new();
        let mut errors = Vec::new();

        for record in records {
            match self.process_record(record).await {
                Ok(result) => results.push(result),
                Err(e) => {
                    tracing::error!(message_id = %record.message_id, error = %e, "Invalid notification");
                    errors.push(IngestFailure {
                        message_id: record.message_id.clone(),
                        error: e.to_string(),
                    });
                }
            }
        }

        if errors.is_empty() {
            tracing::info!(count = results.len(), "Queued all notification records");
        } else {
            tracing::warn!(failed = errors.len(), "Completed ingest with errors");
        }

        IngestSummary {
            processed: results.len(),
            failed: errors.len(),
            results,
            errors,
        }
    }

    async fn process_record(&self, record: &NotificationRecord) -> Result<IngestResult> {
        let message: ConceptMessage = serde_json::from_str(&record.message)
            .map_err(|e| GeodexError::Validation(format!("Invalid notification message: {e}")))?;

        let entry = QueueEntry {
            id: record.message_id.clone(),
            body: serde_json::to_string(&message)?,
            group_id: message.group_id(),
            dedup_id: message.dedup_id(),
        };
        let queue_message_id = self.queue.send(&entry).await?;

        tracing::info!(
            action = ?message.action,
            group_id = %entry.group_id,
            revision_id = message.revision_id,
            queue_message_id = %queue_message_id,
            "Queued concept event"
        );

        Ok(IngestResult {
            concept_id: message.concept_id,
            status: "queued",
            queue_message_id,
        })
    }
}
