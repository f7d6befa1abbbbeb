//! Bootstrap driver: bulk-loads concepts from a CMR search into the
//! embedding pipeline by synthesizing update messages.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::cmr::{extract_concept_info, CmrClient};
use crate::error::{GeodexError, Result};
use crate::models::{ConceptMessage, ConceptType};
use crate::queue::{MessageQueue, QueueEntry, MAX_BATCH_SIZE};

const MAX_RETRIES: u32 = 3;
const INITIAL_BACKOFF: Duration = Duration::from_secs(1);

fn default_page_size() -> u32 {
    500
}

#[derive(Debug, Clone, Deserialize)]
pub struct BootstrapRequest {
    pub concept_type: ConceptType,
    #[serde(default)]
    pub search_params: HashMap<String, String>,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    #[serde(default)]
    pub dry_run: bool,
}

#[derive(Debug, Serialize)]
pub struct BootstrapSummary {
    pub concept_type: ConceptType,
    pub search_params: HashMap<String, String>,
    pub total_processed: u64,
    pub total_sent: u64,
    pub total_errors: u64,
    pub dry_run: bool,
}

pub struct BootstrapDriver {
    cmr: CmrClient,
    queue: Arc<dyn MessageQueue>,
}

impl BootstrapDriver {
    pub fn new(cmr: CmrClient, queue: Arc<dyn MessageQueue>) -> Self {
        Self { cmr, queue }
    }

    pub async fn run(&self, request: &BootstrapRequest) -> Result<BootstrapSummary> {
        tracing::info!(
            concept_type = %request.concept_type,
            page_size = request.page_size,
            dry_run = request.dry_run,
            "Starting bootstrap"
        );

        let mut total_processed = 0u64;
        let mut total_sent = 0u64;
        let mut total_errors = 0u64;

        let mut pages = self
            .cmr
            .search(request.concept_type, &request.search_params, request.page_size);

        while let Some(items) = pages.next_page().await? {
            let mut messages = Vec::new();

            for item in &items {
                match extract_concept_info(request.concept_type, item) {
                    Ok(message) => {
                        messages.push(message);
                        total_processed += 1;
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "Error extracting concept info");
                        total_errors += 1;
                    }
                }
            }

            if request.dry_run {
                tracing::info!(count = messages.len(), "[DRY RUN] Would send messages to queue");
                total_sent += messages.len() as u64;
            } else {
                let sent = self.send_to_queue(&messages).await?;
                total_sent += sent;
                tracing::info!(sent, "Sent messages to queue");
            }
        }

        let summary = BootstrapSummary {
            concept_type: request.concept_type,
            search_params: request.search_params.clone(),
            total_processed,
            total_sent,
            total_errors,
            dry_run: request.dry_run,
        };
        tracing::info!(
            total_processed = summary.total_processed,
            total_sent = summary.total_sent,
            total_errors = summary.total_errors,
            "Bootstrap complete"
        );
        Ok(summary)
    }

    /// Send messages in batches of up to 10 with per-item FIFO
    /// attributes. A batch can partially fail; only the failed entries
    /// retry, with exponential backoff, before the run surfaces an error.
    async fn send_to_queue(&self, messages: &[ConceptMessage]) -> Result<u64> {
        let mut sent = 0u64;

        for batch in messages.chunks(MAX_BATCH_SIZE) {
            let entries: Vec<QueueEntry> = batch
                .iter()
                .enumerate()
                .map(|(idx, message)| {
                    Ok(QueueEntry {
                        id: idx.to_string(),
                        body: serde_json::to_string(message)?,
                        group_id: message.group_id(),
                        dedup_id: message.dedup_id(),
                    })
                })
                .collect::<Result<_>>()?;

            let mut pending = entries;
            for attempt in 0..=MAX_RETRIES {
                let outcome = self.queue.send_batch(&pending).await?;
                sent += outcome.successful.len() as u64;

                if outcome.failed.is_empty() {
                    break;
                }

                let failed_ids: Vec<String> =
                    outcome.failed.iter().map(|f| f.id.clone()).collect();
                pending.retain(|entry| failed_ids.contains(&entry.id));

                if attempt < MAX_RETRIES {
                    let backoff = INITIAL_BACKOFF * 2_u32.pow(attempt);
                    tracing::warn!(
                        attempt = attempt + 1,
                        max_retries = MAX_RETRIES,
                        failed = outcome.failed.len(),
                        backoff_secs = backoff.as_secs(),
                        "Queue batch partially failed, retrying"
                    );
                    tokio::time::sleep(backoff).await;
                } else {
                    let details: Vec<String> = outcome
                        .failed
                        .iter()
                        .map(|f| format!("{}: {}", f.id, f.message))
                        .collect();
                    return Err(GeodexError::Queue(format!(
                        "Batch send failed after {MAX_RETRIES} retries: {}",
                        details.join(", ")
                    )));
                }
            }
        }

        Ok(sent)
    }
}
