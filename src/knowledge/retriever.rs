// Retrieval adapter: the capability the pipeline consumes when an agent
// has a provisioned store.

use crate::embeddings::EmbeddingClient;
use crate::knowledge::store::{KnowledgeStoreManager, ScoredChunk};
use crate::types::AppResult;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

/// Ranked-chunk lookup for one agent's knowledge store.
#[async_trait]
pub trait Retriever: Send + Sync {
    async fn retrieve(&self, query: &str, k: usize) -> AppResult<Vec<ScoredChunk>>;
}

/// How many chunks the pipeline pulls into the answer context.
pub const DEFAULT_TOP_K: usize = 4;

pub struct StoreRetriever {
    stores: KnowledgeStoreManager,
    embedder: Arc<EmbeddingClient>,
    store_name: String,
}

impl StoreRetriever {
    pub fn new(
        stores: KnowledgeStoreManager,
        embedder: Arc<EmbeddingClient>,
        store_name: String,
    ) -> Self {
        Self {
            stores,
            embedder,
            store_name,
        }
    }
}

#[async_trait]
impl Retriever for StoreRetriever {
    async fn retrieve(&self, query: &str, k: usize) -> AppResult<Vec<ScoredChunk>> {
        let query_embedding = self.embedder.embed_one(query).await?;
        let chunks = self
            .stores
            .retrieve(&self.store_name, &query_embedding, k, &serde_json::json!({}))
            .await?;

        debug!(
            store = %self.store_name,
            k,
            hits = chunks.len(),
            "Retrieved context chunks"
        );
        Ok(chunks)
    }
}
