// Knowledge ingestion: uploaded files -> extracted text -> overlapping
// chunks -> embeddings -> a freshly provisioned store.

use crate::embeddings::{chunk_text, extract_files, EmbeddingClient};
use crate::knowledge::store::{Chunk, KnowledgeStoreManager};
use crate::types::{AppError, AppResult};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

pub struct IngestionPipeline {
    embedder: Arc<EmbeddingClient>,
    stores: KnowledgeStoreManager,
}

impl IngestionPipeline {
    pub fn new(embedder: Arc<EmbeddingClient>, stores: KnowledgeStoreManager) -> Self {
        Self { embedder, stores }
    }

    /// Ingest the given files into `store_name`, replacing any previous
    /// store contents wholesale. Returns the number of chunks loaded.
    pub async fn ingest_files(&self, paths: &[PathBuf], store_name: &str) -> AppResult<usize> {
        let documents = extract_files(paths)?;

        let mut contents = Vec::new();
        let mut metadata = Vec::new();
        for document in &documents {
            for (index, chunk) in chunk_text(&document.content).into_iter().enumerate() {
                metadata.push(serde_json::json!({
                    "source": document.source,
                    "chunk": index,
                }));
                contents.push(chunk);
            }
        }

        if contents.is_empty() {
            return Err(AppError::Validation(
                "training files contained no extractable text".to_string(),
            ));
        }

        let embeddings = self.embedder.embed(&contents).await?;
        let chunks: Vec<Chunk> = contents
            .into_iter()
            .zip(metadata)
            .zip(embeddings)
            .map(|((content, metadata), embedding)| Chunk {
                content,
                metadata,
                embedding,
            })
            .collect();

        self.stores.provision(store_name, &chunks).await?;

        info!(
            store = store_name,
            files = paths.len(),
            chunks = chunks.len(),
            "Ingested training files"
        );
        Ok(chunks.len())
    }
}
