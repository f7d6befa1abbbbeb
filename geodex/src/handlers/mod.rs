mod bootstrap;
mod embedding;
mod ingest;

pub use bootstrap::{BootstrapDriver, BootstrapRequest, BootstrapSummary};
pub use embedding::{BatchItemFailure, BatchResult, EmbeddingHandler};
pub use ingest::{IngestHandler, IngestSummary, NotificationRecord};
