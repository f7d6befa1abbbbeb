use std::sync::Arc;

use serde_json::json;
use tempfile::NamedTempFile;
use wiremock::matchers::{method, path, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

use geodex::cmr::CmrClient;
use geodex::config::{CmrConfig, DatabaseConfig, EmbeddingsConfig, KmsConfig, QueueConfig};
use geodex::db::{Database, EmbeddingStore, LibSqlStore};
use geodex::embeddings::{EmbeddingGenerator, TitanEmbeddingClient};
use geodex::handlers::EmbeddingHandler;
use geodex::kms::KmsClient;
use geodex::models::{ConceptAction, ConceptMessage, ConceptType};
use geodex::queue::{LibSqlQueue, QueueMessage};

pub const DIMS: usize = 4;

pub struct TestContext {
    pub db: Database,
    pub store: Arc<dyn EmbeddingStore>,
    pub queue: Arc<LibSqlQueue>,
    _temp: NamedTempFile,
}

/// Temp-file libsql database with the store and a FIFO queue sharing it.
/// Zero visibility timeout so unacked messages redeliver immediately.
pub async fn setup_context() -> TestContext {
    let temp = NamedTempFile::new().unwrap();
    let db_config = DatabaseConfig {
        url: temp.path().to_str().unwrap().to_string(),
        auth_token: None,
        local_path: None,
    };
    let db = Database::new(&db_config, DIMS).await.unwrap();

    let queue_config = QueueConfig {
        visibility_timeout_secs: 0,
        dedup_window_secs: 300,
        receive_batch_size: 10,
    };
    let queue = Arc::new(LibSqlQueue::new(db.clone(), &queue_config).await.unwrap());
    let store: Arc<dyn EmbeddingStore> = Arc::new(LibSqlStore::new(db.clone()));

    TestContext {
        db,
        store,
        queue,
        _temp: temp,
    }
}

pub async fn count_rows(db: &Database, sql: &str) -> i64 {
    let conn = db.connect().unwrap();
    conn.query(sql, ())
        .await
        .unwrap()
        .next()
        .await
        .unwrap()
        .unwrap()
        .get(0)
        .unwrap()
}

pub fn cmr_client(server: &MockServer) -> CmrClient {
    CmrClient::new(&CmrConfig {
        base_url: server.uri(),
        concept_timeout_secs: 5,
        search_timeout_secs: 5,
    })
    .unwrap()
}

pub fn kms_client(server: &MockServer) -> KmsClient {
    KmsClient::new(&KmsConfig {
        base_url: server.uri(),
        timeout_secs: 5,
        cache_size: 100,
    })
    .unwrap()
}

pub fn titan_client(server: &MockServer) -> Arc<dyn EmbeddingGenerator> {
    Arc::new(
        TitanEmbeddingClient::new(&EmbeddingsConfig {
            model_id: "amazon.titan-embed-text-v2:0".to_string(),
            base_url: server.uri(),
            api_key: None,
            dimensions: DIMS,
            timeout_secs: 5,
            max_retries: 0,
        })
        .unwrap(),
    )
}

pub fn embedding_handler(
    ctx: &TestContext,
    cmr_server: &MockServer,
    kms_server: &MockServer,
    titan_server: &MockServer,
) -> EmbeddingHandler {
    EmbeddingHandler::new(
        Arc::clone(&ctx.store),
        titan_client(titan_server),
        kms_client(kms_server),
        cmr_client(cmr_server),
    )
}

/// Mock the versioned concept endpoint for one (id, revision).
pub async fn mock_concept(
    server: &MockServer,
    concept_id: &str,
    revision_id: i64,
    metadata: serde_json::Value,
) {
    Mock::given(method("GET"))
        .and(path(format!(
            "/search/concepts/{concept_id}/{revision_id}.umm_json"
        )))
        .respond_with(ResponseTemplate::new(200).set_body_json(metadata))
        .mount(server)
        .await;
}

/// Mock a KMS term resolving to a uuid with a definition. Matches on
/// the scheme prefix so terms with spaces survive percent-encoding;
/// tests use at most one term per scheme per server.
pub async fn mock_kms_term(
    server: &MockServer,
    scheme: &str,
    term: &str,
    uuid: &str,
    definition: Option<&str>,
) {
    Mock::given(method("GET"))
        .and(path_regex(format!(
            "^/concepts/concept_scheme/{scheme}/pattern/"
        )))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "concepts": [{"prefLabel": term, "uuid": uuid}]
        })))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path(format!("/concept/{uuid}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "definition": definition
        })))
        .mount(server)
        .await;
}

/// Mock the embedding backend to return a fixed vector for any input.
pub async fn mock_embedding_model(server: &MockServer) {
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "embedding": [0.1, 0.2, 0.3, 0.4],
            "inputTextTokenCount": 8
        })))
        .mount(server)
        .await;
}

pub fn update_message(concept_type: ConceptType, concept_id: &str, revision_id: i64) -> ConceptMessage {
    ConceptMessage {
        action: ConceptAction::Update,
        concept_type,
        concept_id: concept_id.to_string(),
        revision_id,
    }
}

pub fn delete_message(concept_type: ConceptType, concept_id: &str, revision_id: i64) -> ConceptMessage {
    ConceptMessage {
        action: ConceptAction::Delete,
        concept_type,
        concept_id: concept_id.to_string(),
        revision_id,
    }
}

/// Wrap a concept message as a received queue message, bypassing the
/// queue for handler-level tests.
pub fn queue_message(id: &str, message: &ConceptMessage) -> QueueMessage {
    QueueMessage {
        message_id: id.to_string(),
        group_id: message.group_id(),
        body: serde_json::to_string(message).unwrap(),
        receive_count: 1,
    }
}
