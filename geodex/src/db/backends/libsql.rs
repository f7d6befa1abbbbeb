use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use libsql::params;
use uuid::Uuid;

use crate::db::traits::EmbeddingStore;
use crate::db::Database;
use crate::error::{GeodexError, Result};
use crate::models::{ConceptType, EmbeddedChunk, KmsEmbeddingRecord, SimilarChunk};

/// Map CMR association keys to the concept type on the right-hand side.
/// Unknown keys in an association payload are ignored.
const ASSOCIATION_TYPE_MAP: &[(&str, &str)] = &[("variables", "variable"), ("citations", "citation")];

/// libsql implementation of [`EmbeddingStore`].
///
/// Full-replace upserts run delete-then-insert inside a single
/// transaction, which gives per-concept serializability: two writers for
/// the same concept id conflict at commit and one retries at the queue
/// level. The FIFO message groups make that case unreachable in normal
/// operation.
#[derive(Clone)]
pub struct LibSqlStore {
    db: Database,
}

impl LibSqlStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Vector columns are fixed-width; a wrong-sized embedding means the
    /// caller routed text through a different model than the index was
    /// built for, and must fail before anything is written.
    fn check_dims(&self, embedding: &[f32]) -> Result<()> {
        let expected = self.db.embedding_dims();
        if embedding.len() != expected {
            return Err(GeodexError::Validation(format!(
                "Embedding has {} dimensions, index expects {expected}",
                embedding.len()
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl EmbeddingStore for LibSqlStore {
    async fn upsert_chunks(
        &self,
        concept_type: ConceptType,
        concept_id: &str,
        chunks: &[EmbeddedChunk],
    ) -> Result<u64> {
        if chunks.is_empty() {
            return Ok(0);
        }
        for chunk in chunks {
            self.check_dims(&chunk.embedding)?;
        }

        let conn = self.db.connect()?;
        let tx = conn.transaction().await?;

        tx.execute(
            "DELETE FROM concept_embeddings WHERE concept_id = ?1",
            params![concept_id],
        )
        .await?;

        for chunk in chunks {
            let embedding_json = serde_json::to_string(&chunk.embedding)?;
            tx.execute(
                r#"
                INSERT INTO concept_embeddings (
                    id, concept_type, concept_id, attribute, text_content, embedding
                ) VALUES (?1, ?2, ?3, ?4, ?5, vector32(?6))
                "#,
                params![
                    Uuid::new_v4().to_string(),
                    concept_type.as_str(),
                    concept_id,
                    chunk.attribute.clone(),
                    chunk.text_content.clone(),
                    embedding_json,
                ],
            )
            .await?;
        }

        tx.commit().await?;
        tracing::info!(concept_id, count = chunks.len(), "Upserted chunks");
        Ok(chunks.len() as u64)
    }

    async fn delete_chunks(&self, concept_id: &str) -> Result<u64> {
        let conn = self.db.connect()?;
        let deleted = conn
            .execute(
                "DELETE FROM concept_embeddings WHERE concept_id = ?1",
                params![concept_id],
            )
            .await?;
        Ok(deleted)
    }

    async fn upsert_associations(
        &self,
        concept_type: ConceptType,
        concept_id: &str,
        associations: &HashMap<String, Vec<String>>,
    ) -> Result<u64> {
        if associations.is_empty() {
            return Ok(0);
        }

        let conn = self.db.connect()?;
        let tx = conn.transaction().await?;

        tx.execute(
            "DELETE FROM concept_associations WHERE left_concept_id = ?1",
            params![concept_id],
        )
        .await?;

        let mut count = 0;
        for (assoc_key, right_concept_type) in ASSOCIATION_TYPE_MAP {
            let Some(right_ids) = associations.get(*assoc_key) else {
                continue;
            };
            for right_concept_id in right_ids {
                count += tx
                    .execute(
                        r#"
                        INSERT INTO concept_associations (
                            left_concept_type, left_concept_id,
                            right_concept_type, right_concept_id
                        ) VALUES (?1, ?2, ?3, ?4)
                        ON CONFLICT (left_concept_id, right_concept_id) DO NOTHING
                        "#,
                        params![
                            concept_type.as_str(),
                            concept_id,
                            *right_concept_type,
                            right_concept_id.clone(),
                        ],
                    )
                    .await?;
            }
        }

        tx.commit().await?;
        Ok(count)
    }

    async fn delete_associations(&self, concept_id: &str) -> Result<u64> {
        let conn = self.db.connect()?;
        let deleted = conn
            .execute(
                r#"
                DELETE FROM concept_associations
                WHERE left_concept_id = ?1 OR right_concept_id = ?1
                "#,
                params![concept_id],
            )
            .await?;
        Ok(deleted)
    }

    async fn get_kms_embedding(&self, kms_uuid: &str) -> Result<Option<KmsEmbeddingRecord>> {
        let conn = self.db.connect()?;
        let mut rows = conn
            .query(
                r#"
                SELECT kms_uuid, scheme, term, definition
                FROM kms_embeddings
                WHERE kms_uuid = ?1
                "#,
                params![kms_uuid],
            )
            .await?;

        match rows.next().await? {
            Some(row) => Ok(Some(KmsEmbeddingRecord {
                uuid: row.get(0)?,
                scheme: row.get(1)?,
                term: row.get(2)?,
                definition: row.get::<Option<String>>(3)?,
            })),
            None => Ok(None),
        }
    }

    async fn upsert_kms_embedding(
        &self,
        kms_uuid: &str,
        scheme: &str,
        term: &str,
        definition: Option<&str>,
        embedding: &[f32],
    ) -> Result<bool> {
        self.check_dims(embedding)?;

        let conn = self.db.connect()?;
        let tx = conn.transaction().await?;

        let mut existing = tx
            .query(
                "SELECT 1 FROM kms_embeddings WHERE kms_uuid = ?1",
                params![kms_uuid],
            )
            .await?;
        let inserted = existing.next().await?.is_none();

        let embedding_json = serde_json::to_string(embedding)?;
        tx.execute(
            r#"
            INSERT INTO kms_embeddings (
                kms_uuid, scheme, term, definition, embedding, updated_at
            ) VALUES (?1, ?2, ?3, ?4, vector32(?5), ?6)
            ON CONFLICT (kms_uuid) DO UPDATE SET
                definition = excluded.definition,
                embedding = excluded.embedding,
                updated_at = excluded.updated_at
            "#,
            params![
                kms_uuid,
                scheme,
                term,
                definition,
                embedding_json,
                Utc::now().to_rfc3339(),
            ],
        )
        .await?;

        tx.commit().await?;
        tracing::info!(
            scheme,
            term,
            "{} KMS embedding",
            if inserted { "Inserted" } else { "Updated" }
        );
        Ok(inserted)
    }

    async fn upsert_concept_kms_associations(
        &self,
        concept_type: ConceptType,
        concept_id: &str,
        kms_uuids: &[String],
    ) -> Result<u64> {
        let conn = self.db.connect()?;
        let tx = conn.transaction().await?;

        tx.execute(
            r#"
            DELETE FROM concept_kms_associations
            WHERE concept_type = ?1 AND concept_id = ?2
            "#,
            params![concept_type.as_str(), concept_id],
        )
        .await?;

        let mut count = 0;
        for kms_uuid in kms_uuids {
            count += tx
                .execute(
                    r#"
                    INSERT INTO concept_kms_associations (concept_type, concept_id, kms_uuid)
                    VALUES (?1, ?2, ?3)
                    ON CONFLICT DO NOTHING
                    "#,
                    params![concept_type.as_str(), concept_id, kms_uuid.clone()],
                )
                .await?;
        }

        tx.commit().await?;
        tracing::info!(
            concept_id,
            concept_type = concept_type.as_str(),
            count,
            "Replaced concept KMS associations"
        );
        Ok(count)
    }

    async fn delete_concept_kms_associations(&self, concept_id: &str) -> Result<u64> {
        let conn = self.db.connect()?;
        let deleted = conn
            .execute(
                "DELETE FROM concept_kms_associations WHERE concept_id = ?1",
                params![concept_id],
            )
            .await?;
        Ok(deleted)
    }

    async fn search_similar(
        &self,
        embedding: &[f32],
        limit: u32,
        concept_type: Option<ConceptType>,
    ) -> Result<Vec<SimilarChunk>> {
        let conn = self.db.connect()?;
        let embedding_json = serde_json::to_string(embedding)?;

        let (query, param_values) = match concept_type {
            Some(ct) => (
                r#"
                SELECT concept_type, concept_id, attribute, text_content,
                       1 - vector_distance_cos(embedding, vector32(?1)) as similarity
                FROM concept_embeddings
                WHERE concept_type = ?2
                ORDER BY similarity DESC
                LIMIT ?3
                "#,
                vec![
                    libsql::Value::from(embedding_json),
                    libsql::Value::from(ct.as_str()),
                    libsql::Value::from(limit),
                ],
            ),
            None => (
                r#"
                SELECT concept_type, concept_id, attribute, text_content,
                       1 - vector_distance_cos(embedding, vector32(?1)) as similarity
                FROM concept_embeddings
                ORDER BY similarity DESC
                LIMIT ?2
                "#,
                vec![
                    libsql::Value::from(embedding_json),
                    libsql::Value::from(limit),
                ],
            ),
        };

        let mut rows = conn
            .query(query, libsql::params_from_iter(param_values))
            .await?;

        let mut results = Vec::new();
        while let Some(row) = rows.next().await? {
            results.push(SimilarChunk {
                concept_type: row.get(0)?,
                concept_id: row.get(1)?,
                attribute: row.get(2)?,
                text_content: row.get(3)?,
                similarity: row.get::<f64>(4)? as f32,
            });
        }

        Ok(results)
    }
}
