use async_trait::async_trait;

use crate::error::Result;

/// Text-to-vector generation.
///
/// `concept_type` and `attribute` are routing hints, not content: a
/// generator may ignore them (the base model client does) or use them to
/// pick a specific model (the router does).
#[async_trait]
pub trait EmbeddingGenerator: Send + Sync {
    async fn generate(
        &self,
        text: &str,
        concept_type: Option<&str>,
        attribute: Option<&str>,
    ) -> Result<Vec<f32>>;

    fn model_id(&self) -> &str;
}
