//! API Routes
//!
//! HTTP endpoints, one router per resource:
//! - `/api/agents` - agent creation, listing and editing
//! - `/api/agents/{agent_id}/chat` - conversational endpoint
//! - `/api/blog` - blog generation
//! - `/api/health` - health checks

pub mod agents;
pub mod blog;
pub mod chat;
pub mod health;

use crate::middleware::cors_layer;
use crate::models::AppState;
use axum::Router;
use tower_http::trace::TraceLayer;
use tracing::info;

/// Create the main application router. API routes are prefixed with
/// `/api/`; CORS and request tracing wrap everything.
pub fn create_router(state: AppState) -> Router {
    info!("Creating application router");

    let cors = cors_layer(&state.config.server);

    Router::new()
        .merge(agents::router(state.clone()))
        .merge(chat::router(state.clone()))
        .merge(blog::router(state.clone()))
        .merge(health::router(state))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}
