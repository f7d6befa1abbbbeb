use libsql::{Builder, Connection};
use std::sync::Arc;

use crate::config::DatabaseConfig;
use crate::error::Result;

use super::schema;

/// Handle to the libsql database backing both the embedding index and
/// the FIFO queue. Clones share one underlying database; connections
/// are opened per operation, so a dropped connection heals on the next
/// call. The handle carries the index's vector dimension: every table
/// and every stored embedding is sized against it.
#[derive(Clone)]
pub struct Database {
    db: Arc<libsql::Database>,
    embedding_dims: usize,
}

impl Database {
    /// Open (or create) the database and initialize the index schema
    /// sized to the embedding model's output dimension.
    pub async fn new(config: &DatabaseConfig, embedding_dims: usize) -> Result<Self> {
        let db = open_database(config).await?;
        let database = Self {
            db: Arc::new(db),
            embedding_dims,
        };

        let conn = database.connect()?;
        // The worker, the queue, and bootstrap all write to this file;
        // WAL plus a busy timeout keeps concurrent upserts from failing
        // fast on lock contention.
        if let Err(error) = conn
            .execute_batch("PRAGMA journal_mode = WAL; PRAGMA busy_timeout = 5000")
            .await
        {
            tracing::warn!(error = %error, "Failed to apply SQLite pragmas");
        }
        schema::init_schema(&conn, embedding_dims).await?;

        Ok(database)
    }

    pub fn connect(&self) -> Result<Connection> {
        Ok(self.db.connect()?)
    }

    /// Vector dimension the index schema was created with.
    pub fn embedding_dims(&self) -> usize {
        self.embedding_dims
    }

    pub async fn sync(&self) -> Result<()> {
        if let Ok(sync) = self.db.sync().await {
            tracing::info!("Database synced: {:?}", sync);
        }
        Ok(())
    }
}

fn is_remote_url(url: &str) -> bool {
    url.starts_with("libsql://") || url.starts_with("https://")
}

async fn open_database(config: &DatabaseConfig) -> Result<libsql::Database> {
    if is_remote_url(&config.url) {
        let auth_token = config.auth_token.clone().unwrap_or_default();
        let db = match &config.local_path {
            // Embedded replica: reads hit the local file, writes go upstream
            Some(local_path) => {
                Builder::new_remote_replica(local_path, config.url.clone(), auth_token)
                    .build()
                    .await?
            }
            None => Builder::new_remote(config.url.clone(), auth_token).build().await?,
        };
        return Ok(db);
    }

    // Local file, `file:` URL, or `:memory:`
    let path = config.url.strip_prefix("file:").unwrap_or(&config.url);
    Ok(Builder::new_local(path).build().await?)
}
