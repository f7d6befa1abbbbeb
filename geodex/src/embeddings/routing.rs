use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::{GeodexError, Result};

use super::EmbeddingGenerator;

/// Dispatches to a generator by key, most specific first:
/// `"{concept_type}.{attribute}"`, then `"{concept_type}"`, then
/// `"default"`. The table is built once at startup and never mutated.
pub struct RoutingEmbeddingGenerator {
    generators: HashMap<String, Arc<dyn EmbeddingGenerator>>,
    default: Arc<dyn EmbeddingGenerator>,
}

impl RoutingEmbeddingGenerator {
    /// Build a router from a generator map. The map must contain a
    /// `"default"` entry.
    pub fn new(generators: HashMap<String, Arc<dyn EmbeddingGenerator>>) -> Result<Self> {
        let default = generators
            .get("default")
            .cloned()
            .ok_or_else(|| {
                GeodexError::Internal("Routing generator requires a 'default' entry".to_string())
            })?;
        Ok(Self {
            generators,
            default,
        })
    }

    fn resolve(
        &self,
        concept_type: Option<&str>,
        attribute: Option<&str>,
    ) -> &Arc<dyn EmbeddingGenerator> {
        if let (Some(concept_type), Some(attribute)) = (concept_type, attribute) {
            if let Some(generator) = self.generators.get(&format!("{concept_type}.{attribute}")) {
                return generator;
            }
        }

        if let Some(concept_type) = concept_type {
            if let Some(generator) = self.generators.get(concept_type) {
                return generator;
            }
        }

        &self.default
    }
}

#[async_trait]
impl EmbeddingGenerator for RoutingEmbeddingGenerator {
    async fn generate(
        &self,
        text: &str,
        concept_type: Option<&str>,
        attribute: Option<&str>,
    ) -> Result<Vec<f32>> {
        self.resolve(concept_type, attribute)
            .generate(text, concept_type, attribute)
            .await
    }

    fn model_id(&self) -> &str {
        self.default.model_id()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct StaticGenerator {
        id: String,
        vector: Vec<f32>,
    }

    #[async_trait]
    impl EmbeddingGenerator for StaticGenerator {
        async fn generate(
            &self,
            _text: &str,
            _concept_type: Option<&str>,
            _attribute: Option<&str>,
        ) -> Result<Vec<f32>> {
            Ok(self.vector.clone())
        }

        fn model_id(&self) -> &str {
            &self.id
        }
    }

    fn fixed(id: &str, value: f32) -> Arc<dyn EmbeddingGenerator> {
        Arc::new(StaticGenerator {
            id: id.to_string(),
            vector: vec![value],
        })
    }

    fn router() -> RoutingEmbeddingGenerator {
        let mut generators = HashMap::new();
        generators.insert("collection.abstract".to_string(), fixed("specific", 1.0));
        generators.insert("collection".to_string(), fixed("type-level", 2.0));
        generators.insert("default".to_string(), fixed("fallback", 3.0));
        RoutingEmbeddingGenerator::new(generators).unwrap()
    }

    #[tokio::test]
    async fn test_routes_most_specific_key_first() {
        let router = router();
        let v = router
            .generate("t", Some("collection"), Some("abstract"))
            .await
            .unwrap();
        assert_eq!(v, vec![1.0]);
    }

    #[tokio::test]
    async fn test_falls_back_to_concept_type() {
        let router = router();
        let v = router
            .generate("t", Some("collection"), Some("title"))
            .await
            .unwrap();
        assert_eq!(v, vec![2.0]);
    }

    #[tokio::test]
    async fn test_falls_back_to_default() {
        let router = router();
        assert_eq!(
            router.generate("t", Some("variable"), None).await.unwrap(),
            vec![3.0]
        );
        assert_eq!(router.generate("t", None, None).await.unwrap(), vec![3.0]);
    }

    #[test]
    fn test_construction_requires_default() {
        let mut generators = HashMap::new();
        generators.insert("collection".to_string(), fixed("only", 1.0));
        assert!(RoutingEmbeddingGenerator::new(generators).is_err());
    }

    #[test]
    fn test_model_id_is_defaults() {
        assert_eq!(router().model_id(), "fallback");
    }
}
