//! Embedding handler: drains the FIFO queue and keeps the index in sync.
//!
//! Updates fetch the concept from CMR, split it into attribute chunks,
//! embed and persist them, then resolve and link KMS terms. Deletes
//! cascade across all stored rows for the concept. Each message is an
//! isolation boundary: a failure is reported as a batch item failure and
//! the message redelivers, while the rest of the batch proceeds.

use std::collections::HashSet;
use std::sync::Arc;

use serde::Serialize;

use crate::cmr::{extract_data, CmrClient};
use crate::db::EmbeddingStore;
use crate::embeddings::EmbeddingGenerator;
use crate::error::{GeodexError, Result};
use crate::kms::KmsClient;
use crate::models::{
    ConceptAction, ConceptMessage, ConceptType, EmbeddedChunk, EmbeddingChunk, KmsTermRef,
};
use crate::queue::QueueMessage;

#[derive(Debug, Serialize, PartialEq)]
pub struct BatchItemFailure {
    #[serde(rename = "itemIdentifier")]
    pub item_identifier: String,
}

#[derive(Debug, Serialize, Default)]
pub struct BatchResult {
    #[serde(rename = "batchItemFailures")]
    pub batch_item_failures: Vec<BatchItemFailure>,
}

#[derive(Clone)]
pub struct EmbeddingHandler {
    store: Arc<dyn EmbeddingStore>,
    embedder: Arc<dyn EmbeddingGenerator>,
    kms: KmsClient,
    cmr: CmrClient,
}

impl EmbeddingHandler {
    pub fn new(
        store: Arc<dyn EmbeddingStore>,
        embedder: Arc<dyn EmbeddingGenerator>,
        kms: KmsClient,
        cmr: CmrClient,
    ) -> Self {
        Self {
            store,
            embedder,
            kms,
            cmr,
        }
    }

    /// Process a batch of queue messages. Failed messages are returned
    /// for redelivery; successful ones should be acked by the caller.
    pub async fn handle_batch(&self, messages: &[QueueMessage]) -> BatchResult {
        tracing::info!(count = messages.len(), "Processing queue messages");

        let mut failures = Vec::new();
        for message in messages {
            if let Err(e) = self.process_message(message).await {
                tracing::error!(message_id = %message.message_id, error = %e, "Message failed");
                failures.push(BatchItemFailure {
                    item_identifier: message.message_id.clone(),
                });
            }
        }

        if !failures.is_empty() {
            tracing::warn!(
                failed = failures.len(),
                total = messages.len(),
                "Completed batch with failures"
            );
        }

        BatchResult {
            batch_item_failures: failures,
        }
    }

    async fn process_message(&self, message: &QueueMessage) -> Result<()> {
        let concept_message: ConceptMessage = serde_json::from_str(&message.body)
            .map_err(|e| GeodexError::Validation(format!("Invalid message format: {e}")))?;

        match concept_message.action {
            ConceptAction::Update => self.handle_update(&concept_message).await,
            ConceptAction::Delete => self.handle_delete(&concept_message).await,
        }
    }

    /// Update path: fetch metadata, extract, embed, persist, link.
    async fn handle_update(&self, message: &ConceptMessage) -> Result<()> {
        let metadata = self
            .cmr
            .fetch_concept(&message.concept_id, message.revision_id)
            .await?;

        let extraction = extract_data(message, &metadata);
        tracing::info!(
            concept_id = %message.concept_id,
            chunks = extraction.chunks.len(),
            kms_terms = extraction.kms_terms.len(),
            "Extracted concept data"
        );

        let embedded = self.embed_chunks(&extraction.chunks).await?;
        self.store
            .upsert_chunks(message.concept_type, &message.concept_id, &embedded)
            .await?;

        let kms_uuids = self.process_kms_terms(&extraction.kms_terms).await?;
        self.store
            .upsert_concept_kms_associations(message.concept_type, &message.concept_id, &kms_uuids)
            .await?;

        if message.concept_type == ConceptType::Collection {
            let associations = self.cmr.fetch_associations(&message.concept_id).await;
            if !associations.is_empty() {
                self.store
                    .upsert_associations(message.concept_type, &message.concept_id, &associations)
                    .await?;
            }
        }

        tracing::info!(
            concept_id = %message.concept_id,
            chunks = embedded.len(),
            kms_terms = kms_uuids.len(),
            "Processed concept update"
        );
        Ok(())
    }

    /// Delete path: remove all stored rows for the concept. Shared KMS
    /// embeddings stay; only the links go.
    async fn handle_delete(&self, message: &ConceptMessage) -> Result<()> {
        let concept_id = &message.concept_id;

        let deleted_chunks = self.store.delete_chunks(concept_id).await?;
        let deleted_assocs = self.store.delete_associations(concept_id).await?;
        let deleted_kms = self.store.delete_concept_kms_associations(concept_id).await?;

        tracing::info!(
            concept_id = %concept_id,
            deleted_chunks,
            deleted_assocs,
            deleted_kms,
            "Processed concept delete"
        );
        Ok(())
    }

    /// Embed every chunk; the first failure aborts the message so no
    /// partial chunk set is ever written.
    async fn embed_chunks(&self, chunks: &[EmbeddingChunk]) -> Result<Vec<EmbeddedChunk>> {
        let mut embedded = Vec::with_capacity(chunks.len());
        for chunk in chunks {
            let embedding = self
                .embedder
                .generate(
                    &chunk.text_content,
                    Some(chunk.concept_type.as_str()),
                    Some(&chunk.attribute),
                )
                .await?;
            embedded.push(EmbeddedChunk {
                attribute: chunk.attribute.clone(),
                text_content: chunk.text_content.clone(),
                embedding,
            });
        }
        Ok(embedded)
    }

    /// Resolve KMS term references, embed terms not yet stored, and
    /// return the uuids to link to the concept.
    ///
    /// Terms are shared across many concepts (hundreds of collections
    /// reference "MODIS"), so each unique uuid is embedded exactly once.
    /// A lookup miss skips the term; an embedding failure skips the term
    /// but still links it on the next revision that sees it stored.
    async fn process_kms_terms(&self, kms_terms: &[KmsTermRef]) -> Result<Vec<String>> {
        let mut uuids = Vec::new();
        let mut seen: HashSet<&KmsTermRef> = HashSet::new();

        for term_ref in kms_terms {
            // Same instrument listed twice in one concept
            if !seen.insert(term_ref) {
                continue;
            }

            let Some(kms_term) = self.kms.lookup_term(&term_ref.term, term_ref.scheme).await
            else {
                tracing::debug!(term = %term_ref.term, scheme = %term_ref.scheme, "KMS term not found");
                continue;
            };

            uuids.push(kms_term.uuid.clone());

            if self.store.get_kms_embedding(&kms_term.uuid).await?.is_some() {
                continue;
            }

            let text = kms_term.embedding_text();
            let embedding = match self
                .embedder
                .generate(&text, Some("kms"), Some(term_ref.scheme.as_str()))
                .await
            {
                Ok(embedding) => embedding,
                Err(e) => {
                    tracing::warn!(term = %kms_term.term, error = %e, "Failed to embed KMS term");
                    continue;
                }
            };

            self.store
                .upsert_kms_embedding(
                    &kms_term.uuid,
                    kms_term.scheme.as_str(),
                    &kms_term.term,
                    kms_term.definition.as_deref(),
                    &embedding,
                )
                .await?;
        }

        Ok(uuids)
    }
}
