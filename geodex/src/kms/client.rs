use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use lru::LruCache;
use serde::Deserialize;

use crate::config::KmsConfig;
use crate::error::{GeodexError, Result};
use crate::models::{KmsScheme, KmsTerm};

#[derive(Debug, Deserialize)]
struct PatternSearchResponse {
    #[serde(default)]
    concepts: Vec<PatternConcept>,
}

#[derive(Debug, Deserialize)]
struct PatternConcept {
    #[serde(rename = "prefLabel", default)]
    pref_label: String,
    uuid: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ConceptDetailResponse {
    definition: Option<String>,
}

type CacheKey = (String, KmsScheme);

/// Client for NASA's Keyword Management System API.
///
/// Lookups resolve a term to its canonical uuid and definition in two
/// steps: a pattern search within the scheme, then a concept-details
/// fetch. Results (including misses) are cached in a bounded LRU shared
/// by all clones, so repeated terms cost one upstream round trip per
/// process. A failed lookup is never an error: KMS is an enrichment
/// source and misses must not fail the enclosing concept.
#[derive(Clone)]
pub struct KmsClient {
    http: reqwest::Client,
    base_url: reqwest::Url,
    cache: Arc<Mutex<LruCache<CacheKey, Option<KmsTerm>>>>,
}

impl KmsClient {
    pub fn new(config: &KmsConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| GeodexError::Internal(format!("Failed to create HTTP client: {e}")))?;

        let base_url = reqwest::Url::parse(&config.base_url)
            .map_err(|e| GeodexError::Internal(format!("Invalid KMS base URL: {e}")))?;

        let capacity = NonZeroUsize::new(config.cache_size)
            .ok_or_else(|| GeodexError::Internal("KMS cache size must be non-zero".to_string()))?;

        Ok(Self {
            http,
            base_url,
            cache: Arc::new(Mutex::new(LruCache::new(capacity))),
        })
    }

    /// Append percent-encoded path segments to the base URL. GCMD terms
    /// contain spaces and slashes ("CLOUD LIQUID WATER/ICE"), so they
    /// must travel as a single encoded segment, never as raw path text.
    fn endpoint(&self, segments: &[&str]) -> Result<reqwest::Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| GeodexError::Internal("KMS base URL cannot be a base".to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Look up a term, returning its canonical metadata or `None` when
    /// the term cannot be resolved for any reason.
    pub async fn lookup_term(&self, term: &str, scheme: KmsScheme) -> Option<KmsTerm> {
        let key = (term.to_string(), scheme);
        if let Some(cached) = self.cache.lock().unwrap().get(&key) {
            return cached.clone();
        }

        let resolved = self.lookup_uncached(term, scheme).await;
        self.cache.lock().unwrap().put(key, resolved.clone());
        resolved
    }

    /// Drop all cached lookups. Exposed for tests.
    pub fn clear_cache(&self) {
        self.cache.lock().unwrap().clear();
    }

    async fn lookup_uncached(&self, term: &str, scheme: KmsScheme) -> Option<KmsTerm> {
        let uuid = match self.search_uuid(term, scheme).await {
            Ok(Some(uuid)) => uuid,
            Ok(None) => {
                tracing::debug!(term, scheme = %scheme, "No UUID found for KMS term");
                return None;
            }
            Err(e) => {
                tracing::debug!(term, scheme = %scheme, error = %e, "KMS search failed");
                return None;
            }
        };

        let definition = match self.fetch_definition(&uuid).await {
            Ok(definition) => definition,
            Err(e) => {
                tracing::debug!(uuid, error = %e, "KMS concept fetch failed");
                None
            }
        };

        Some(KmsTerm {
            uuid,
            scheme,
            term: term.to_string(),
            definition,
        })
    }

    async fn search_uuid(&self, term: &str, scheme: KmsScheme) -> Result<Option<String>> {
        let url = self.endpoint(&[
            "concepts",
            "concept_scheme",
            scheme.as_str(),
            "pattern",
            term,
        ])?;

        let response = self
            .http
            .get(url)
            .query(&[("format", "json")])
            .send()
            .await?
            .error_for_status()?;
        let data: PatternSearchResponse = response.json().await?;

        // Exact case-insensitive match on the preferred label wins;
        // otherwise the first result
        for concept in &data.concepts {
            if concept.pref_label.eq_ignore_ascii_case(term) {
                if let Some(uuid) = &concept.uuid {
                    return Ok(Some(uuid.clone()));
                }
            }
        }

        Ok(data.concepts.into_iter().find_map(|c| c.uuid))
    }

    async fn fetch_definition(&self, uuid: &str) -> Result<Option<String>> {
        let url = self.endpoint(&["concept", uuid])?;

        let response = self
            .http
            .get(url)
            .query(&[("format", "json")])
            .send()
            .await?
            .error_for_status()?;
        let data: ConceptDetailResponse = response.json().await?;

        Ok(data.definition)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> KmsClient {
        KmsClient::new(&KmsConfig {
            base_url: server.uri(),
            timeout_secs: 5,
            cache_size: 100,
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_lookup_prefers_exact_pref_label_match() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/concepts/concept_scheme/instruments/pattern/MODIS"))
            .and(query_param("format", "json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "concepts": [
                    {"prefLabel": "MODIS-like", "uuid": "wrong"},
                    {"prefLabel": "modis", "uuid": "right"}
                ]
            })))
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/concept/right"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "definition": "An imaging radiometer"
            })))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let term = client
            .lookup_term("MODIS", KmsScheme::Instruments)
            .await
            .unwrap();

        assert_eq!(term.uuid, "right");
        assert_eq!(term.definition.as_deref(), Some("An imaging radiometer"));
        assert_eq!(term.term, "MODIS");
    }

    #[tokio::test]
    async fn test_lookup_falls_back_to_first_result() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/concepts/concept_scheme/platforms/pattern/TERRA"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "concepts": [
                    {"prefLabel": "TERRA AM-1", "uuid": "first"},
                    {"prefLabel": "TERRA-X", "uuid": "second"}
                ]
            })))
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/concept/first"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"definition": null})))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let term = client
            .lookup_term("TERRA", KmsScheme::Platforms)
            .await
            .unwrap();

        assert_eq!(term.uuid, "first");
        assert!(term.definition.is_none());
    }

    #[tokio::test]
    async fn test_term_with_space_and_slash_is_percent_encoded() {
        let server = MockServer::start().await;

        // The slash must arrive as %2F inside one path segment; a raw
        // slash would split the term and miss this mock
        Mock::given(method("GET"))
            .and(path(
                "/concepts/concept_scheme/sciencekeywords/pattern/CLOUD%20LIQUID%20WATER%2FICE",
            ))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "concepts": [{"prefLabel": "CLOUD LIQUID WATER/ICE", "uuid": "clwi"}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/concept/clwi"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "definition": "Liquid and frozen cloud water content"
            })))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let term = client
            .lookup_term("CLOUD LIQUID WATER/ICE", KmsScheme::ScienceKeywords)
            .await
            .unwrap();

        assert_eq!(term.uuid, "clwi");
        assert_eq!(term.term, "CLOUD LIQUID WATER/ICE");
    }

    #[tokio::test]
    async fn test_base_url_with_path_prefix_is_preserved() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/kms/concepts/concept_scheme/platforms/pattern/TERRA"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "concepts": [{"prefLabel": "TERRA", "uuid": "t"}]
            })))
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/kms/concept/t"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"definition": null})))
            .mount(&server)
            .await;

        let client = KmsClient::new(&KmsConfig {
            base_url: format!("{}/kms/", server.uri()),
            timeout_secs: 5,
            cache_size: 100,
        })
        .unwrap();

        let term = client
            .lookup_term("TERRA", KmsScheme::Platforms)
            .await
            .unwrap();
        assert_eq!(term.uuid, "t");
    }

    #[tokio::test]
    async fn test_lookup_returns_none_on_http_error() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let client = client_for(&server);
        assert!(client
            .lookup_term("BROKEN", KmsScheme::Platforms)
            .await
            .is_none());
    }

    #[tokio::test]
    async fn test_lookup_returns_none_on_empty_results() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"concepts": []})))
            .mount(&server)
            .await;

        let client = client_for(&server);
        assert!(client
            .lookup_term("UNKNOWN", KmsScheme::ScienceKeywords)
            .await
            .is_none());
    }

    #[tokio::test]
    async fn test_definition_failure_still_resolves_term() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/concepts/concept_scheme/platforms/pattern/AQUA"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "concepts": [{"prefLabel": "AQUA", "uuid": "aqua-uuid"}]
            })))
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/concept/aqua-uuid"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let term = client
            .lookup_term("AQUA", KmsScheme::Platforms)
            .await
            .unwrap();

        assert_eq!(term.uuid, "aqua-uuid");
        assert!(term.definition.is_none());
    }

    #[tokio::test]
    async fn test_cache_avoids_duplicate_upstream_calls() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/concepts/concept_scheme/instruments/pattern/MODIS"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "concepts": [{"prefLabel": "MODIS", "uuid": "m"}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/concept/m"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"definition": "def"})))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server);
        let first = client.lookup_term("MODIS", KmsScheme::Instruments).await;
        let second = client.lookup_term("MODIS", KmsScheme::Instruments).await;

        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_misses_are_cached() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server);
        assert!(client.lookup_term("NOPE", KmsScheme::Platforms).await.is_none());
        assert!(client.lookup_term("NOPE", KmsScheme::Platforms).await.is_none());
    }

    #[tokio::test]
    async fn test_clear_cache_forces_refetch() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/concepts/concept_scheme/platforms/pattern/TERRA"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "concepts": [{"prefLabel": "TERRA", "uuid": "t"}]
            })))
            .expect(2)
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/concept/t"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"definition": null})))
            .expect(2)
            .mount(&server)
            .await;

        let client = client_for(&server);
        client.lookup_term("TERRA", KmsScheme::Platforms).await;
        client.clear_cache();
        client.lookup_term("TERRA", KmsScheme::Platforms).await;
    }
}
