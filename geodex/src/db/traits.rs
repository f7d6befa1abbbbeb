use std::collections::HashMap;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{ConceptType, EmbeddedChunk, KmsEmbeddingRecord, SimilarChunk};

/// Storage contract for the embedding index.
///
/// Every write is idempotent: chunk and association upserts are atomic
/// full-replaces keyed by concept id, KMS embeddings upsert by uuid.
/// Replaying a message therefore converges to the same state.
#[async_trait]
pub trait EmbeddingStore: Send + Sync {
    /// Replace all chunks for a concept with the given set, atomically.
    /// An empty set is a no-op and returns 0.
    async fn upsert_chunks(
        &self,
        concept_type: ConceptType,
        concept_id: &str,
        chunks: &[EmbeddedChunk],
    ) -> Result<u64>;

    /// Delete all chunks for a concept. Returns rows removed.
    async fn delete_chunks(&self, concept_id: &str) -> Result<u64>;

    /// Replace all associations where this concept is on the left side.
    /// Keys map CMR association kinds to target ids (`variables`,
    /// `citations`); unknown keys are ignored.
    async fn upsert_associations(
        &self,
        concept_type: ConceptType,
        concept_id: &str,
        associations: &HashMap<String, Vec<String>>,
    ) -> Result<u64>;

    /// Delete associations where the concept appears on either side.
    async fn delete_associations(&self, concept_id: &str) -> Result<u64>;

    /// Fetch a stored KMS embedding row, if present.
    async fn get_kms_embedding(&self, kms_uuid: &str) -> Result<Option<KmsEmbeddingRecord>>;

    /// Insert or update a KMS term embedding keyed by uuid. Returns true
    /// when the row was newly inserted.
    async fn upsert_kms_embedding(
        &self,
        kms_uuid: &str,
        scheme: &str,
        term: &str,
        definition: Option<&str>,
        embedding: &[f32],
    ) -> Result<bool>;

    /// Replace the set of KMS links for a concept. The input is
    /// deduplicated; an empty set clears all existing links.
    async fn upsert_concept_kms_associations(
        &self,
        concept_type: ConceptType,
        concept_id: &str,
        kms_uuids: &[String],
    ) -> Result<u64>;

    /// Delete all KMS links for a concept. Returns rows removed.
    async fn delete_concept_kms_associations(&self, concept_id: &str) -> Result<u64>;

    /// Cosine-similarity search over chunks; similarity is
    /// `1 - cosine_distance`.
    async fn search_similar(
        &self,
        embedding: &[f32],
        limit: u32,
        concept_type: Option<ConceptType>,
    ) -> Result<Vec<SimilarChunk>>;

    /// Release resources. Safe to call multiple times.
    async fn close(&self) -> Result<()> {
        Ok(())
    }
}
