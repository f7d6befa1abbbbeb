use std::collections::HashMap;
use std::time::Duration;

use serde_json::Value;

use crate::config::CmrConfig;
use crate::error::{GeodexError, Result};
use crate::models::ConceptType;

fn search_endpoint(concept_type: ConceptType) -> &'static str {
    match concept_type {
        ConceptType::Collection => "/search/collections.umm_json",
        ConceptType::Variable => "/search/variables.umm_json",
        ConceptType::Citation => "/search/citations.umm_json",
    }
}

/// Client for the CMR search API.
#[derive(Clone)]
pub struct CmrClient {
    http: reqwest::Client,
    base_url: String,
    concept_timeout: Duration,
    search_timeout: Duration,
}

impl CmrClient {
    pub fn new(config: &CmrConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| GeodexError::Internal(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            concept_timeout: Duration::from_secs(config.concept_timeout_secs),
            search_timeout: Duration::from_secs(config.search_timeout_secs),
        })
    }

    /// Fetch a concept's UMM metadata at a specific revision.
    pub async fn fetch_concept(&self, concept_id: &str, revision_id: i64) -> Result<Value> {
        let url = format!(
            "{}/search/concepts/{}/{}.umm_json",
            self.base_url, concept_id, revision_id
        );

        let response = self
            .http
            .get(&url)
            .timeout(self.concept_timeout)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| GeodexError::Cmr(format!("Failed to fetch {concept_id} from CMR: {e}")))?;

        response
            .json()
            .await
            .map_err(|e| GeodexError::Cmr(format!("Failed to parse CMR response for {concept_id}: {e}")))
    }

    /// Fetch a collection's associations (variables, citations).
    ///
    /// Best-effort: any failure returns an empty map. A missing
    /// association set is recoverable on the next revision, so this is
    /// the one call allowed to degrade silently.
    pub async fn fetch_associations(&self, concept_id: &str) -> HashMap<String, Vec<String>> {
        let url = format!("{}/search/collections.umm_json", self.base_url);

        let result = self
            .http
            .get(&url)
            .query(&[
                ("concept_id", concept_id),
                ("include_has_granules", "false"),
            ])
            .timeout(self.concept_timeout)
            .send()
            .await
            .and_then(|r| r.error_for_status());

        let response = match result {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(concept_id, error = %e, "Failed to fetch associations");
                return HashMap::new();
            }
        };

        let data: Value = match response.json().await {
            Ok(data) => data,
            Err(e) => {
                tracing::warn!(concept_id, error = %e, "Failed to parse associations response");
                return HashMap::new();
            }
        };

        let Some(associations) = data
            .get("items")
            .and_then(|items| items.get(0))
            .and_then(|item| item.get("meta"))
            .and_then(|meta| meta.get("associations"))
            .and_then(|a| a.as_object())
        else {
            return HashMap::new();
        };

        associations
            .iter()
            .map(|(kind, ids)| {
                let ids = ids
                    .as_array()
                    .map(|arr| {
                        arr.iter()
                            .filter_map(|v| v.as_str().map(str::to_string))
                            .collect()
                    })
                    .unwrap_or_default();
                (kind.clone(), ids)
            })
            .collect()
    }

    /// Start a paginated search, returning a pager that yields one page
    /// of items per call.
    pub fn search(
        &self,
        concept_type: ConceptType,
        search_params: &HashMap<String, String>,
        page_size: u32,
    ) -> CmrSearchPages {
        CmrSearchPages {
            client: self.clone(),
            endpoint: format!("{}{}", self.base_url, search_endpoint(concept_type)),
            concept_type,
            search_params: search_params.clone(),
            page_size,
            page_num: 1,
            total_fetched: 0,
            done: false,
        }
    }
}

/// Pull-based pager over a CMR search. Pagination stops when a page
/// comes back empty or the cumulative item count reaches the reported
/// hit count.
pub struct CmrSearchPages {
    client: CmrClient,
    endpoint: String,
    concept_type: ConceptType,
    search_params: HashMap<String, String>,
    page_size: u32,
    page_num: u32,
    total_fetched: u64,
    done: bool,
}

impl CmrSearchPages {
    pub async fn next_page(&mut self) -> Result<Option<Vec<Value>>> {
        if self.done {
            return Ok(None);
        }

        tracing::info!(
            concept_type = %self.concept_type,
            page_num = self.page_num,
            page_size = self.page_size,
            "Fetching CMR search page"
        );

        let mut query: Vec<(String, String)> = self
            .search_params
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        query.push(("page_size".to_string(), self.page_size.to_string()));
        query.push(("page_num".to_string(), self.page_num.to_string()));

        let response = self
            .client
            .http
            .get(&self.endpoint)
            .query(&query)
            .timeout(self.client.search_timeout)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| GeodexError::Cmr(format!("CMR request failed: {e}")))?;

        let data: Value = response
            .json()
            .await
            .map_err(|e| GeodexError::Cmr(format!("Failed to parse CMR search response: {e}")))?;

        let items: Vec<Value> = data
            .get("items")
            .and_then(|i| i.as_array())
            .cloned()
            .unwrap_or_default();

        if items.is_empty() {
            tracing::info!("No more results, stopping pagination");
            self.done = true;
            return Ok(None);
        }

        self.total_fetched += items.len() as u64;
        let hits = data.get("hits").and_then(|h| h.as_u64()).unwrap_or(0);
        tracing::info!(
            fetched = items.len(),
            total = self.total_fetched,
            hits,
            "Fetched CMR search page"
        );

        if self.total_fetched >= hits {
            self.done = true;
        }
        self.page_num += 1;

        Ok(Some(items))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> CmrClient {
        CmrClient::new(&CmrConfig {
            base_url: server.uri(),
            concept_timeout_secs: 5,
            search_timeout_secs: 5,
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_fetch_concept_returns_metadata() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/search/concepts/C1-P/3.umm_json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "EntryTitle": "MODIS SST"
            })))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let metadata = client.fetch_concept("C1-P", 3).await.unwrap();
        assert_eq!(metadata["EntryTitle"], "MODIS SST");
    }

    #[tokio::test]
    async fn test_fetch_concept_error_is_typed() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let err = client.fetch_concept("C404-P", 1).await.unwrap_err();
        assert!(matches!(err, GeodexError::Cmr(_)));
    }

    #[tokio::test]
    async fn test_fetch_associations_extracts_meta() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/search/collections.umm_json"))
            .and(query_param("concept_id", "C1-P"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "items": [{
                    "meta": {
                        "concept-id": "C1-P",
                        "associations": {
                            "variables": ["V1-P", "V2-P"],
                            "citations": ["CIT1-P"]
                        }
                    }
                }]
            })))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let associations = client.fetch_associations("C1-P").await;
        assert_eq!(associations["variables"], vec!["V1-P", "V2-P"]);
        assert_eq!(associations["citations"], vec!["CIT1-P"]);
    }

    #[tokio::test]
    async fn test_fetch_associations_degrades_to_empty() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let client = client_for(&server);
        assert!(client.fetch_associations("C1-P").await.is_empty());
    }

    #[tokio::test]
    async fn test_fetch_associations_empty_when_absent() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "items": [{"meta": {"concept-id": "C1-P"}}]
            })))
            .mount(&server)
            .await;

        let client = client_for(&server);
        assert!(client.fetch_associations("C1-P").await.is_empty());
    }

    #[tokio::test]
    async fn test_search_pages_until_hits_reached() {
        let server = MockServer::start().await;

        let item = |id: &str| json!({"meta": {"concept-id": id, "revision-id": 1}});

        Mock::given(method("GET"))
            .and(path("/search/variables.umm_json"))
            .and(query_param("page_num", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "hits": 3,
                "items": [item("V1-P"), item("V2-P")]
            })))
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/search/variables.umm_json"))
            .and(query_param("page_num", "2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "hits": 3,
                "items": [item("V3-P")]
            })))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let mut pages = client.search(ConceptType::Variable, &HashMap::new(), 2);

        let first = pages.next_page().await.unwrap().unwrap();
        assert_eq!(first.len(), 2);
        let second = pages.next_page().await.unwrap().unwrap();
        assert_eq!(second.len(), 1);
        assert!(pages.next_page().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_search_stops_on_empty_page() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/search/collections.umm_json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "hits": 100,
                "items": []
            })))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let mut pages = client.search(ConceptType::Collection, &HashMap::new(), 10);
        assert!(pages.next_page().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_search_forwards_search_params() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/search/collections.umm_json"))
            .and(query_param("consortium", "EOSDIS"))
            .and(query_param("page_size", "10"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "hits": 1,
                "items": [{"meta": {"concept-id": "C1-P", "revision-id": 1}}]
            })))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let mut params = HashMap::new();
        params.insert("consortium".to_string(), "EOSDIS".to_string());

        let mut pages = client.search(ConceptType::Collection, &params, 10);
        let page = pages.next_page().await.unwrap().unwrap();
        assert_eq!(page.len(), 1);
    }
}
