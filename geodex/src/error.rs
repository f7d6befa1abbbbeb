use thiserror::Error;

#[derive(Error, Debug)]
pub enum GeodexError {
    #[error("Database error: {0}")]
    Database(#[from] libsql::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("CMR error: {0}")]
    Cmr(String),

    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("Queue error: {0}")]
    Queue(String),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, GeodexError>;
