use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;
use crate::kms::KmsClient;
use crate::models::KmsScheme;

use super::EmbeddingGenerator;

/// Wraps a base generator, enriching keyword text with KMS definitions
/// before embedding.
///
/// Input may be a single term or newline-separated hierarchical paths
/// like `"EARTH SCIENCE > ATMOSPHERE > PRECIPITATION"`. Each line is
/// reduced to its deepest segment, looked up in the configured scheme,
/// and rewritten to `"{term}: {definition}"` when a definition exists.
/// Lines that fail to resolve pass through unchanged; enrichment never
/// fails the embedding.
pub struct KmsEnrichedEmbeddingGenerator {
    base: Arc<dyn EmbeddingGenerator>,
    kms: KmsClient,
    scheme: KmsScheme,
}

impl KmsEnrichedEmbeddingGenerator {
    pub fn new(base: Arc<dyn EmbeddingGenerator>, kms: KmsClient, scheme: KmsScheme) -> Self {
        Self { base, kms, scheme }
    }

    async fn enrich_text(&self, text: &str) -> String {
        let mut enriched_lines = Vec::new();
        for line in text.trim().split('\n') {
            enriched_lines.push(self.enrich_line(line.trim()).await);
        }
        enriched_lines.join("\n")
    }

    async fn enrich_line(&self, path: &str) -> String {
        if path.is_empty() {
            return path.to_string();
        }

        let term = deepest_segment(path);
        match self.kms.lookup_term(term, self.scheme).await {
            Some(kms_term) => match kms_term.definition {
                Some(definition) => format!("{term}: {definition}"),
                None => path.to_string(),
            },
            None => path.to_string(),
        }
    }
}

/// The most specific term of a hierarchical keyword path.
fn deepest_segment(path: &str) -> &str {
    match path.rsplit_once(" > ") {
        Some((_, last)) => last.trim(),
        None => path.trim(),
    }
}

#[async_trait]
impl EmbeddingGenerator for KmsEnrichedEmbeddingGenerator {
    async fn generate(
        &self,
        text: &str,
        concept_type: Option<&str>,
        attribute: Option<&str>,
    ) -> Result<Vec<f32>> {
        let enriched = self.enrich_text(text).await;
        self.base.generate(&enriched, concept_type, attribute).await
    }

    fn model_id(&self) -> &str {
        self.base.model_id()
    }
}
