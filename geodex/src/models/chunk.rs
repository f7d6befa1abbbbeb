use serde::{Deserialize, Serialize};

use super::ConceptType;

/// A piece of text extracted from a CMR concept, ready to be embedded.
///
/// Concepts are split into chunks by attribute (title, abstract, etc.)
/// so similarity search can return the specific matching text instead of
/// the whole record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingChunk {
    pub concept_type: ConceptType,
    pub concept_id: String,
    pub attribute: String,
    pub text_content: String,
}

impl EmbeddingChunk {
    pub fn new(
        concept_type: ConceptType,
        concept_id: impl Into<String>,
        attribute: impl Into<String>,
        text_content: impl Into<String>,
    ) -> Self {
        Self {
            concept_type,
            concept_id: concept_id.into(),
            attribute: attribute.into(),
            text_content: text_content.into(),
        }
    }
}

/// A chunk with its embedding vector, the unit persisted to the store.
#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddedChunk {
    pub attribute: String,
    pub text_content: String,
    pub embedding: Vec<f32>,
}

/// One similarity-search hit from the chunk index.
#[derive(Debug, Clone, Serialize)]
pub struct SimilarChunk {
    pub concept_type: String,
    pub concept_id: String,
    pub attribute: String,
    pub text_content: String,
    pub similarity: f32,
}
