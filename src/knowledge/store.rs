//! Knowledge store lifecycle.
//!
//! Each agent with training data owns one dynamically named Postgres table
//! of embedded text chunks plus a companion `match_<store>` function doing
//! cosine nearest-neighbor search over it (pgvector). Store names are
//! validated against the identifier allow-list before any DDL; chunk
//! contents, filters and query vectors always bind as parameters.
//!
//! Lifecycle per agent: NoStore -> Provisioned -> (Renamed | Reprovisioned)
//! -> Dropped. Retrieval succeeds only while Provisioned/Renamed.

use crate::embeddings::EMBEDDING_DIM;
use crate::knowledge::identifiers::{match_function_name, validate_store_name};
use crate::types::{AppError, AppResult};
use sqlx::{PgPool, Postgres, Row, Transaction};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::info;

/// One embedded chunk ready for loading.
#[derive(Debug, Clone)]
pub struct Chunk {
    pub content: String,
    pub metadata: serde_json::Value,
    pub embedding: Vec<f32>,
}

/// One retrieval hit, ranked by descending cosine similarity.
#[derive(Debug, Clone)]
pub struct ScoredChunk {
    pub content: String,
    pub metadata: serde_json::Value,
    pub similarity: f64,
}

#[derive(Clone)]
pub struct KnowledgeStoreManager {
    pool: PgPool,
    /// Provisioning is drop+recreate; concurrent runs against the same
    /// store must take turns or the match function can end up referencing
    /// a half-built table.
    provision_locks: Arc<Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>>,
}

impl KnowledgeStoreManager {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            provision_locks: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Whether a store is provisioned under this name.
    pub async fn exists(&self, store_name: &str) -> AppResult<bool> {
        validate_store_name(store_name)?;
        let exists: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS (
                SELECT FROM information_schema.tables
                WHERE table_schema = 'public'
                AND table_name = $1
            )
            "#,
        )
        .bind(store_name)
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }

    /// Reset and load a store as one logical unit: any existing table and
    /// match function are dropped, fresh ones created, and all chunks
    /// inserted inside a single transaction. A failure anywhere rolls the
    /// whole unit back, so callers retry provisioning wholesale rather
    /// than patching a half-loaded store.
    pub async fn provision(&self, store_name: &str, chunks: &[Chunk]) -> AppResult<()> {
        validate_store_name(store_name)?;
        for chunk in chunks {
            if chunk.embedding.len() != EMBEDDING_DIM {
                return Err(AppError::Validation(format!(
                    "chunk embedding has {} dimensions, expected {EMBEDDING_DIM}",
                    chunk.embedding.len()
                )));
            }
        }

        let lock = self.lock_for(store_name);
        let _guard = lock.lock().await;

        let mut tx = self.pool.begin().await?;
        Self::drop_objects(&mut tx, store_name).await?;
        Self::create_objects(&mut tx, store_name).await?;

        let insert = format!(
            "INSERT INTO {store_name} (content, metadata, embedding) VALUES ($1, $2, $3::vector)"
        );
        for chunk in chunks {
            sqlx::query(&insert)
                .bind(&chunk.content)
                .bind(&chunk.metadata)
                .bind(vector_literal(&chunk.embedding))
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;

        info!(store = store_name, chunks = chunks.len(), "Provisioned knowledge store");
        Ok(())
    }

    /// Rename the store inside the caller's transaction so the agent-row
    /// update and the store rename commit or roll back together. The match
    /// function is recreated under the new name; it embeds the table name
    /// and a plain table rename would leave it pointing at nothing.
    pub async fn rename(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        old_name: &str,
        new_name: &str,
    ) -> AppResult<()> {
        validate_store_name(old_name)?;
        validate_store_name(new_name)?;

        let alter = format!("ALTER TABLE {old_name} RENAME TO {new_name}");
        sqlx::query(&alter)
            .execute(&mut **tx)
            .await
            .map_err(|e| map_store_error(old_name, e))?;

        let drop_fn = format!(
            "DROP FUNCTION IF EXISTS {}(vector({EMBEDDING_DIM}), int, jsonb)",
            match_function_name(old_name)
        );
        sqlx::query(&drop_fn).execute(&mut **tx).await?;

        let create_fn = match_function_sql(new_name);
        sqlx::query(&create_fn).execute(&mut **tx).await?;

        info!(old = old_name, new = new_name, "Renamed knowledge store");
        Ok(())
    }

    /// Remove the store and its match function. Safe to call when nothing
    /// is provisioned.
    pub async fn drop_store(&self, store_name: &str) -> AppResult<()> {
        validate_store_name(store_name)?;

        let mut tx = self.pool.begin().await?;
        Self::drop_objects(&mut tx, store_name).await?;
        tx.commit().await?;

        info!(store = store_name, "Dropped knowledge store");
        Ok(())
    }

    /// Top-k chunks by descending cosine similarity to `query_embedding`,
    /// restricted to rows whose metadata contains `metadata_filter`.
    pub async fn retrieve(
        &self,
        store_name: &str,
        query_embedding: &[f32],
        k: usize,
        metadata_filter: &serde_json::Value,
    ) -> AppResult<Vec<ScoredChunk>> {
        validate_store_name(store_name)?;
        if query_embedding.len() != EMBEDDING_DIM {
            return Err(AppError::Validation(format!(
                "query embedding has {} dimensions, expected {EMBEDDING_DIM}",
                query_embedding.len()
            )));
        }

        let sql = format!(
            "SELECT content, metadata, similarity FROM {}($1::vector, $2, $3)",
            match_function_name(store_name)
        );
        let rows = sqlx::query(&sql)
            .bind(vector_literal(query_embedding))
            .bind(k as i32)
            .bind(metadata_filter)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| map_store_error(store_name, e))?;

        let chunks = rows
            .into_iter()
            .map(|row| ScoredChunk {
                content: row.get("content"),
                metadata: row.get("metadata"),
                similarity: row.get("similarity"),
            })
            .collect();

        Ok(chunks)
    }

    async fn drop_objects(tx: &mut Transaction<'_, Postgres>, store_name: &str) -> AppResult<()> {
        let drop_fn = format!(
            "DROP FUNCTION IF EXISTS {}(vector({EMBEDDING_DIM}), int, jsonb)",
            match_function_name(store_name)
        );
        sqlx::query(&drop_fn).execute(&mut **tx).await?;

        let drop_table = format!("DROP TABLE IF EXISTS {store_name}");
        sqlx::query(&drop_table).execute(&mut **tx).await?;
        Ok(())
    }

    async fn create_objects(tx: &mut Transaction<'_, Postgres>, store_name: &str) -> AppResult<()> {
        let create_table = format!(
            r#"
            CREATE TABLE {store_name} (
                id BIGSERIAL PRIMARY KEY,
                content TEXT NOT NULL,
                metadata JSONB NOT NULL DEFAULT '{{}}',
                embedding VECTOR({EMBEDDING_DIM})
            )
            "#
        );
        sqlx::query(&create_table).execute(&mut **tx).await?;

        let create_fn = match_function_sql(store_name);
        sqlx::query(&create_fn).execute(&mut **tx).await?;
        Ok(())
    }

    fn lock_for(&self, store_name: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self
            .provision_locks
            .lock()
            .expect("provision lock registry poisoned");
        locks
            .entry(store_name.to_string())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }
}

/// Cosine nearest-neighbor search function over one store. `<=>` is
/// pgvector cosine distance, so similarity is its complement.
fn match_function_sql(store_name: &str) -> String {
    let function = match_function_name(store_name);
    format!(
        r#"
        CREATE FUNCTION {function} (
            query_embedding VECTOR({EMBEDDING_DIM}),
            match_count INT DEFAULT NULL,
            filter JSONB DEFAULT '{{}}'
        ) RETURNS TABLE (
            id BIGINT,
            content TEXT,
            metadata JSONB,
            similarity DOUBLE PRECISION
        )
        LANGUAGE plpgsql
        AS $$
        BEGIN
            RETURN QUERY
            SELECT
                t.id,
                t.content,
                t.metadata,
                1 - (t.embedding <=> query_embedding) AS similarity
            FROM {store_name} t
            WHERE t.metadata @> filter
            ORDER BY t.embedding <=> query_embedding
            LIMIT match_count;
        END;
        $$
        "#
    )
}

/// pgvector input literal; the value binds as text and casts server-side.
fn vector_literal(embedding: &[f32]) -> String {
    let mut out = String::with_capacity(embedding.len() * 10 + 2);
    out.push('[');
    for (i, value) in embedding.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        out.push_str(&value.to_string());
    }
    out.push(']');
    out
}

fn map_store_error(store_name: &str, error: sqlx::Error) -> AppError {
    if let sqlx::Error::Database(db_error) = &error {
        if let Some(code) = db_error.code() {
            // undefined_table / undefined_function
            if code == "42P01" || code == "42883" {
                return AppError::NotFound(format!(
                    "knowledge store '{store_name}' does not exist"
                ));
            }
        }
    }
    AppError::Database(error)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lazy_manager() -> KnowledgeStoreManager {
        // connect_lazy never touches the network; these tests exercise the
        // validation paths that fail before any query is issued.
        let pool = PgPool::connect_lazy("postgres://localhost/unused").unwrap();
        KnowledgeStoreManager::new(pool)
    }

    #[test]
    fn test_vector_literal_format() {
        assert_eq!(vector_literal(&[1.0, -0.5, 0.25]), "[1,-0.5,0.25]");
        assert_eq!(vector_literal(&[]), "[]");
    }

    #[test]
    fn test_match_function_sql_targets_store() {
        let sql = match_function_sql("sales_bob");
        assert!(sql.contains("CREATE FUNCTION match_sales_bob"));
        assert!(sql.contains("FROM sales_bob t"));
        assert!(sql.contains("t.metadata @> filter"));
    }

    #[tokio::test]
    async fn test_invalid_store_name_rejected_before_sql() {
        let manager = lazy_manager();
        let error = manager.exists("bad name; drop").await.unwrap_err();
        assert!(matches!(error, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn test_provision_rejects_wrong_dimensions() {
        let manager = lazy_manager();
        let chunks = vec![Chunk {
            content: "x".to_string(),
            metadata: serde_json::json!({}),
            embedding: vec![0.0; 3],
        }];
        let error = manager.provision("sales_bob", &chunks).await.unwrap_err();
        assert!(matches!(error, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn test_retrieve_rejects_wrong_dimensions() {
        let manager = lazy_manager();
        let error = manager
            .retrieve("sales_bob", &[0.0; 4], 4, &serde_json::json!({}))
            .await
            .unwrap_err();
        assert!(matches!(error, AppError::Validation(_)));
    }
}
