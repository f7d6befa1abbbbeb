use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, Serialize};

use crate::config::EmbeddingsConfig;
use crate::error::{GeodexError, Result};

use super::EmbeddingGenerator;

#[derive(Debug, Serialize)]
struct InvokeRequest<'a> {
    #[serde(rename = "inputText")]
    input_text: &'a str,
}

#[derive(Debug, Deserialize)]
struct InvokeResponse {
    embedding: Vec<f32>,
}

/// Titan embedding model client over the Bedrock runtime invoke API.
///
/// One model, fixed output dimension; routing hints are ignored here and
/// handled by [`RoutingEmbeddingGenerator`](super::RoutingEmbeddingGenerator).
/// Transient failures (transport, 429, 5xx) retry with exponential
/// backoff; anything else fails the call.
#[derive(Clone)]
pub struct TitanEmbeddingClient {
    http: reqwest::Client,
    base_url: String,
    model_id: String,
    api_key: Option<String>,
    max_retries: u32,
}

impl TitanEmbeddingClient {
    pub fn new(config: &EmbeddingsConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| GeodexError::Embedding(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model_id: config.model_id.clone(),
            api_key: config.api_key.clone(),
            max_retries: config.max_retries,
        })
    }

    fn headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        if let Some(ref api_key) = self.api_key {
            headers.insert(
                AUTHORIZATION,
                HeaderValue::from_str(&format!("Bearer {api_key}"))
                    .map_err(|e| GeodexError::Embedding(format!("Invalid API key header: {e}")))?,
            );
        }

        Ok(headers)
    }
}

#[async_trait]
impl EmbeddingGenerator for TitanEmbeddingClient {
    async fn generate(
        &self,
        text: &str,
        _concept_type: Option<&str>,
        _attribute: Option<&str>,
    ) -> Result<Vec<f32>> {
        let url = format!("{}/model/{}/invoke", self.base_url, self.model_id);
        let request = InvokeRequest { input_text: text };
        let headers = self.headers()?;

        let mut last_error = None;
        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = Duration::from_millis(100 * 2_u64.pow(attempt - 1));
                tokio::time::sleep(delay).await;
            }

            let response = self
                .http
                .post(&url)
                .headers(headers.clone())
                .json(&request)
                .send()
                .await;

            match response {
                Ok(resp) => {
                    let status = resp.status();

                    if status.is_success() {
                        let body: InvokeResponse = resp.json().await.map_err(|e| {
                            GeodexError::Embedding(format!("Failed to parse response: {e}"))
                        })?;
                        return Ok(body.embedding);
                    }

                    if status == reqwest::StatusCode::TOO_MANY_REQUESTS
                        || status.is_server_error()
                    {
                        let body = resp.text().await.unwrap_or_default();
                        last_error = Some(GeodexError::Embedding(format!(
                            "Model error {status}: {body}"
                        )));
                        continue;
                    }

                    let body = resp.text().await.unwrap_or_default();
                    return Err(GeodexError::Embedding(format!("API error {status}: {body}")));
                }
                Err(e) => {
                    last_error = Some(GeodexError::Embedding(format!("Request failed: {e}")));
                    continue;
                }
            }
        }

        Err(last_error
            .unwrap_or_else(|| GeodexError::Embedding("Unknown embedding error".to_string())))
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }
}
