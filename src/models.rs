use crate::config::Config;
use crate::embeddings::EmbeddingClient;
use crate::knowledge::KnowledgeStoreManager;
use crate::llm::TextGenerator;
use crate::storage::ObjectStorage;
use sqlx::PgPool;
use std::sync::Arc;
use validator::Validate;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Config,
    pub generator: Arc<dyn TextGenerator>,
    pub embedder: Arc<EmbeddingClient>,
    pub knowledge: KnowledgeStoreManager,
    pub storage: Arc<ObjectStorage>,
}

// Database rows
// FromRow is needed for runtime query_as (no DATABASE_URL at compile time)

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: uuid::Uuid,
    pub username: String,
    pub email: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, sqlx::FromRow)]
pub struct Agent {
    pub id: uuid::Uuid,
    pub owner_id: uuid::Uuid,
    /// Display name; unique per owner.
    pub name: String,
    /// Validated identifier of the agent's knowledge store.
    pub store_name: String,
    /// Persona / free-form instructions fed to the answer stage.
    pub context: String,
    pub description: String,
    pub picture_url: Option<String>,
    /// Object-storage keys of the uploaded training files.
    pub training_files: serde_json::Value,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, sqlx::FromRow)]
pub struct Chat {
    pub id: uuid::Uuid,
    pub agent_id: uuid::Uuid,
    pub user_id: uuid::Uuid,
    /// Generated from the first exchange, exactly once.
    pub name: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, sqlx::FromRow)]
pub struct ConversationTurn {
    pub id: uuid::Uuid,
    pub chat_id: uuid::Uuid,
    pub agent_id: uuid::Uuid,
    pub user_id: uuid::Uuid,
    pub human_text: String,
    pub agent_text: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

// API request/response types

#[derive(Debug, serde::Deserialize, Validate)]
pub struct ChatRequest {
    #[validate(length(min = 1, message = "no input from user"))]
    pub user_input: String,
}

#[derive(Debug, serde::Serialize)]
pub struct ChatResponse {
    pub message: String,
    pub response: String,
    pub chat_id: uuid::Uuid,
}

#[derive(Debug, serde::Serialize)]
pub struct AgentSummary {
    pub id: uuid::Uuid,
    pub name: String,
    pub context: String,
    pub description: String,
    pub picture_url: Option<String>,
    pub training_files: serde_json::Value,
}

impl From<Agent> for AgentSummary {
    fn from(agent: Agent) -> Self {
        Self {
            id: agent.id,
            name: agent.name,
            context: agent.context,
            description: agent.description,
            picture_url: agent.picture_url,
            training_files: agent.training_files,
        }
    }
}

#[derive(Debug, serde::Deserialize, Validate)]
pub struct BlogRequest {
    #[validate(length(min = 1, message = "no blog instructions supplied"))]
    pub user_instructions: String,
}

#[derive(Debug, serde::Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: String,
    pub database: String,
}
