use serde::Deserialize;
use std::env;

fn parse_env_or<T: std::str::FromStr>(var: &str, default: T) -> T
where
    T::Err: std::fmt::Display,
{
    match env::var(var) {
        Ok(val) => match val.parse() {
            Ok(parsed) => parsed,
            Err(e) => {
                tracing::warn!("Invalid value '{}' for {}: {}. Using default.", val, var, e);
                default
            }
        },
        Err(_) => default,
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
    pub queue: QueueConfig,
    pub worker: WorkerConfig,
    pub cmr: CmrConfig,
    pub kms: KmsConfig,
    pub embeddings: EmbeddingsConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub auth_token: Option<String>,
    pub local_path: Option<String>,
}

/// FIFO queue tuning. Messages invisible for `visibility_timeout_secs`
/// after receive; duplicate dedup ids are dropped within
/// `dedup_window_secs` of the first send.
#[derive(Debug, Clone, Deserialize)]
pub struct QueueConfig {
    pub visibility_timeout_secs: u64,
    pub dedup_window_secs: u64,
    pub receive_batch_size: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WorkerConfig {
    pub poll_interval_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CmrConfig {
    pub base_url: String,
    pub concept_timeout_secs: u64,
    pub search_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct KmsConfig {
    pub base_url: String,
    pub timeout_secs: u64,
    pub cache_size: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EmbeddingsConfig {
    pub model_id: String,
    pub base_url: String,
    pub api_key: Option<String>,
    pub dimensions: usize,
    pub timeout_secs: u64,
    pub max_retries: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: env::var("DATABASE_URL").unwrap_or_else(|_| "file:geodex.db".to_string()),
                auth_token: env::var("DATABASE_AUTH_TOKEN").ok(),
                local_path: env::var("DATABASE_LOCAL_PATH").ok(),
            },
            queue: QueueConfig {
                visibility_timeout_secs: parse_env_or("QUEUE_VISIBILITY_TIMEOUT_SECS", 300),
                dedup_window_secs: parse_env_or("QUEUE_DEDUP_WINDOW_SECS", 300),
                receive_batch_size: parse_env_or("QUEUE_RECEIVE_BATCH_SIZE", 10),
            },
            worker: WorkerConfig {
                poll_interval_secs: parse_env_or("WORKER_POLL_INTERVAL_SECS", 5),
            },
            cmr: CmrConfig {
                base_url: env::var("CMR_URL")
                    .unwrap_or_else(|_| "https://cmr.earthdata.nasa.gov".to_string()),
                concept_timeout_secs: parse_env_or("CMR_CONCEPT_TIMEOUT_SECS", 30),
                search_timeout_secs: parse_env_or("CMR_SEARCH_TIMEOUT_SECS", 60),
            },
            kms: KmsConfig {
                base_url: env::var("KMS_URL")
                    .unwrap_or_else(|_| "https://cmr.earthdata.nasa.gov/kms".to_string()),
                timeout_secs: parse_env_or("KMS_TIMEOUT_SECS", 10),
                cache_size: parse_env_or("KMS_CACHE_SIZE", 2000),
            },
            embeddings: EmbeddingsConfig {
                model_id: env::var("EMBEDDING_MODEL")
                    .unwrap_or_else(|_| "amazon.titan-embed-text-v2:0".to_string()),
                base_url: env::var("EMBEDDING_BASE_URL")
                    .unwrap_or_else(|_| "https://bedrock-runtime.us-east-1.amazonaws.com".to_string()),
                api_key: env::var("EMBEDDING_API_KEY").ok(),
                dimensions: parse_env_or("EMBEDDING_DIMENSIONS", 1024),
                timeout_secs: parse_env_or("EMBEDDING_TIMEOUT_SECS", 30),
                max_retries: parse_env_or("EMBEDDING_MAX_RETRIES", 3),
            },
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::default()
    }
}
