use libsql::Connection;

use crate::error::Result;

pub async fn init_schema(conn: &Connection, embedding_dims: usize) -> Result<()> {
    let ddl = format!(
        r#"
        -- Text chunks extracted from concepts, one row per attribute
        CREATE TABLE IF NOT EXISTS concept_embeddings (
            id TEXT PRIMARY KEY,
            concept_type TEXT NOT NULL,
            concept_id TEXT NOT NULL,
            attribute TEXT NOT NULL,
            text_content TEXT NOT NULL,
            embedding F32_BLOB({dims}) NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_concept_embeddings_concept_id
            ON concept_embeddings(concept_id);
        CREATE INDEX IF NOT EXISTS idx_concept_embeddings_concept_type
            ON concept_embeddings(concept_type);
        CREATE INDEX IF NOT EXISTS idx_concept_embeddings_vector
            ON concept_embeddings(libsql_vector_idx(embedding));

        -- Directional links between concepts (collection -> variable/citation)
        CREATE TABLE IF NOT EXISTS concept_associations (
            left_concept_type TEXT NOT NULL,
            left_concept_id TEXT NOT NULL,
            right_concept_type TEXT NOT NULL,
            right_concept_id TEXT NOT NULL,
            UNIQUE(left_concept_id, right_concept_id)
        );

        CREATE INDEX IF NOT EXISTS idx_concept_associations_left
            ON concept_associations(left_concept_id);
        CREATE INDEX IF NOT EXISTS idx_concept_associations_right
            ON concept_associations(right_concept_id);

        -- Shared controlled-vocabulary embeddings, one row per canonical uuid
        CREATE TABLE IF NOT EXISTS kms_embeddings (
            kms_uuid TEXT PRIMARY KEY,
            scheme TEXT NOT NULL,
            term TEXT NOT NULL,
            definition TEXT,
            embedding F32_BLOB({dims}) NOT NULL,
            updated_at TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_kms_embeddings_vector
            ON kms_embeddings(libsql_vector_idx(embedding));

        -- Links from concepts to the KMS terms they reference
        CREATE TABLE IF NOT EXISTS concept_kms_associations (
            concept_type TEXT NOT NULL,
            concept_id TEXT NOT NULL,
            kms_uuid TEXT NOT NULL,
            PRIMARY KEY (concept_type, concept_id, kms_uuid)
        );

        CREATE INDEX IF NOT EXISTS idx_concept_kms_associations_concept_id
            ON concept_kms_associations(concept_id);
        "#,
        dims = embedding_dims
    );

    conn.execute_batch(&ddl).await?;
    Ok(())
}
