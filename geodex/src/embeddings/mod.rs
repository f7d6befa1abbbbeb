mod enriched;
mod generator;
mod routing;
mod titan;

pub use enriched::KmsEnrichedEmbeddingGenerator;
pub use generator::EmbeddingGenerator;
pub use routing::RoutingEmbeddingGenerator;
pub use titan::TitanEmbeddingClient;

use std::collections::HashMap;
use std::sync::Arc;

use crate::config::EmbeddingsConfig;
use crate::error::Result;
use crate::kms::KmsClient;
use crate::models::KmsScheme;

/// Build the pipeline's routing table: keyword-ish attributes go through
/// KMS enrichment in their scheme, everything else hits the base model
/// directly.
pub fn default_generator(
    config: &EmbeddingsConfig,
    kms: &KmsClient,
) -> Result<RoutingEmbeddingGenerator> {
    let base: Arc<dyn EmbeddingGenerator> = Arc::new(TitanEmbeddingClient::new(config)?);

    let enriched = |scheme: KmsScheme| -> Arc<dyn EmbeddingGenerator> {
        Arc::new(KmsEnrichedEmbeddingGenerator::new(
            Arc::clone(&base),
            kms.clone(),
            scheme,
        ))
    };

    let mut generators: HashMap<String, Arc<dyn EmbeddingGenerator>> = HashMap::new();
    generators.insert(
        "collection.science_keywords".to_string(),
        enriched(KmsScheme::ScienceKeywords),
    );
    generators.insert(
        "collection.platforms".to_string(),
        enriched(KmsScheme::Platforms),
    );
    generators.insert(
        "collection.instruments".to_string(),
        enriched(KmsScheme::Instruments),
    );
    generators.insert(
        "variable.science_keywords".to_string(),
        enriched(KmsScheme::ScienceKeywords),
    );
    generators.insert("default".to_string(), base);

    RoutingEmbeddingGenerator::new(generators)
}
