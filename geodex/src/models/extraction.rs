use super::{EmbeddingChunk, KmsTermRef};

/// Result of extracting embeddable data from a CMR concept.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtractionResult {
    pub chunks: Vec<EmbeddingChunk>,
    pub kms_terms: Vec<KmsTermRef>,
}
