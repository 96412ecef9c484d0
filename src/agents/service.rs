//! Agent lifecycle service.
//!
//! Creation uploads the agent picture and training files to object
//! storage, ingests the training files into a fresh knowledge store, and
//! inserts the agent row. Renames cascade to the knowledge store inside
//! one transaction: both the agent row and the store move, or neither
//! does.

use crate::db::DatabaseOperations;
use crate::knowledge::{derive_store_name, IngestionPipeline, KnowledgeStoreManager};
use crate::models::{Agent, AgentSummary, AppState, User};
use crate::storage::ObjectStorage;
use crate::types::{AppError, AppResult};
use sqlx::PgPool;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

/// An uploaded file held in memory between multipart parsing and the
/// object-storage upload.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub filename: String,
    pub content_type: String,
    pub bytes: bytes::Bytes,
}

#[derive(Debug, Default)]
pub struct AgentUpdate {
    pub name: Option<String>,
    pub context: Option<String>,
    pub description: Option<String>,
    pub picture: Option<UploadedFile>,
}

pub struct AgentService {
    pool: PgPool,
    knowledge: KnowledgeStoreManager,
    ingestion: IngestionPipeline,
    storage: Arc<ObjectStorage>,
}

impl AgentService {
    pub fn from_state(state: &AppState) -> Self {
        Self {
            pool: state.pool.clone(),
            knowledge: state.knowledge.clone(),
            ingestion: IngestionPipeline::new(state.embedder.clone(), state.knowledge.clone()),
            storage: state.storage.clone(),
        }
    }

    pub async fn create(
        &self,
        owner: &User,
        name: &str,
        context: &str,
        description: &str,
        picture: Option<UploadedFile>,
        training_paths: &[PathBuf],
    ) -> AppResult<Agent> {
        let name = name.trim();
        if name.is_empty() {
            return Err(AppError::Validation("agent name is empty".to_string()));
        }
        let store_name = derive_store_name(name, &owner.username)?;

        if DatabaseOperations::find_agent_by_name(&self.pool, owner.id, name)
            .await?
            .is_some()
        {
            return Err(AppError::Validation(
                "Agent with this name already exists. Pick something else!".to_string(),
            ));
        }

        let mut training_file_urls = Vec::new();
        for path in training_paths {
            let filename = path
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or("training-file");
            let bytes = tokio::fs::read(path)
                .await
                .map_err(|e| AppError::Validation(format!("cannot read {filename}: {e}")))?;
            let content_type = mime_guess::from_path(path)
                .first_or_octet_stream()
                .to_string();
            let key = format!("training-files/{filename}");
            let url = self.storage.put_object(&key, &bytes, &content_type).await?;
            training_file_urls.push(serde_json::Value::String(url));
        }

        let picture_url = match picture {
            Some(picture) => Some(self.upload_picture(&picture).await?),
            None => None,
        };

        if !training_paths.is_empty() {
            self.ingestion
                .ingest_files(training_paths, &store_name)
                .await?;
        }

        let agent = DatabaseOperations::create_agent(
            &self.pool,
            owner.id,
            name,
            &store_name,
            context,
            description,
            picture_url.as_deref(),
            &serde_json::Value::Array(training_file_urls),
        )
        .await?;

        info!(
            agent_id = %agent.id,
            name = %agent.name,
            store = %agent.store_name,
            trained = !training_paths.is_empty(),
            "Created agent"
        );
        Ok(agent)
    }

    pub async fn list(&self, owner_id: Uuid) -> AppResult<Vec<AgentSummary>> {
        let agents = DatabaseOperations::list_agents(&self.pool, owner_id).await?;
        Ok(agents.into_iter().map(AgentSummary::from).collect())
    }

    pub async fn update(
        &self,
        agent_id: Uuid,
        owner: &User,
        update: AgentUpdate,
    ) -> AppResult<Agent> {
        let agent = DatabaseOperations::find_agent(&self.pool, agent_id).await?;
        if agent.owner_id != owner.id {
            // Foreign agents are invisible, not forbidden
            return Err(AppError::NotFound(format!("agent {agent_id}")));
        }

        let mut picture_url = agent.picture_url.clone();
        if let Some(picture) = &update.picture {
            let url = self.upload_picture(picture).await?;
            if let Some(old_url) = &agent.picture_url {
                if let Some(old_key) = ObjectStorage::key_from_url(old_url) {
                    if let Err(error) = self.storage.delete_object(old_key).await {
                        warn!(key = old_key, error = %error, "Could not delete previous picture");
                    }
                }
            }
            picture_url = Some(url);
        }

        let context = update.context.as_deref().unwrap_or(&agent.context);
        let description = update.description.as_deref().unwrap_or(&agent.description);
        DatabaseOperations::update_agent_profile(
            &self.pool,
            agent_id,
            context,
            description,
            picture_url.as_deref(),
        )
        .await?;

        if let Some(new_name) = update.name.as_deref().map(str::trim) {
            if !new_name.is_empty() && new_name != agent.name {
                self.rename(&agent, owner, new_name).await?;
            }
        }

        DatabaseOperations::find_agent(&self.pool, agent_id).await
    }

    /// Agent rename with knowledge-store cascade. Both updates run in one
    /// transaction; a store rename failure rolls the agent rename back.
    async fn rename(&self, agent: &Agent, owner: &User, new_name: &str) -> AppResult<()> {
        if DatabaseOperations::find_agent_by_name(&self.pool, owner.id, new_name)
            .await?
            .is_some()
        {
            return Err(AppError::Validation(
                "Agent with this name already exists. Pick something else!".to_string(),
            ));
        }
        let new_store = derive_store_name(new_name, &owner.username)?;
        let has_store = self.knowledge.exists(&agent.store_name).await?;

        let mut tx = self.pool.begin().await?;
        DatabaseOperations::rename_agent(&mut tx, agent.id, new_name, &new_store).await?;
        if has_store {
            self.knowledge
                .rename(&mut tx, &agent.store_name, &new_store)
                .await?;
        }
        tx.commit().await?;

        info!(
            agent_id = %agent.id,
            old = %agent.name,
            new = new_name,
            store_renamed = has_store,
            "Renamed agent"
        );
        Ok(())
    }

    async fn upload_picture(&self, picture: &UploadedFile) -> AppResult<String> {
        let key = format!("app-data/{}_{}", Uuid::new_v4(), picture.filename);
        self.storage
            .put_object(&key, &picture.bytes, &picture.content_type)
            .await
    }
}
