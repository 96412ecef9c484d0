// Agentforge - conversational AI agents with private knowledge bases

pub mod agents;
pub mod blog;
pub mod chat;
pub mod config;
pub mod db;
pub mod embeddings;
pub mod images;
pub mod knowledge;
pub mod llm;
pub mod middleware;
pub mod models;
pub mod pipeline;
pub mod routes;
pub mod storage;
pub mod types;
pub mod utils;

// Re-exports for convenience
pub use config::Config;
pub use models::AppState;
pub use types::{AppError, AppResult};

pub fn create_router(state: AppState) -> axum::Router {
    routes::create_router(state)
}
