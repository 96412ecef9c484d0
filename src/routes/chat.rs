use crate::chat::ChatService;
use crate::db::DatabaseOperations;
use crate::knowledge::{Retriever, StoreRetriever};
use crate::middleware::AuthUser;
use crate::models::{AppState, ChatRequest, ChatResponse};
use crate::pipeline::{ChatPipeline, RespondRequest, Turn};
use crate::types::{AppError, AppResult};
use axum::extract::{Path, State};
use axum::routing::post;
use axum::{Json, Router};
use tracing::info;
use uuid::Uuid;
use validator::Validate;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/agents/{agent_id}/chat", post(chat_new))
        .route("/api/agents/{agent_id}/chat/{chat_id}", post(chat_existing))
        .with_state(state)
}

async fn chat_new(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(agent_id): Path<Uuid>,
    Json(request): Json<ChatRequest>,
) -> AppResult<Json<ChatResponse>> {
    handle_chat(state, user_id, agent_id, None, request).await
}

async fn chat_existing(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path((agent_id, chat_id)): Path<(Uuid, Uuid)>,
    Json(request): Json<ChatRequest>,
) -> AppResult<Json<ChatResponse>> {
    handle_chat(state, user_id, agent_id, Some(chat_id), request).await
}

async fn handle_chat(
    state: AppState,
    user_id: Uuid,
    agent_id: Uuid,
    chat_id: Option<Uuid>,
    request: ChatRequest,
) -> AppResult<Json<ChatResponse>> {
    request
        .validate()
        .map_err(|_| AppError::Validation("no input from user".to_string()))?;

    let agent = DatabaseOperations::find_agent(&state.pool, agent_id).await?;
    let chat_service = ChatService::new(state.pool.clone(), state.generator.clone());

    // History is keyed by the globally unique chat id; the ownership check
    // keeps a foreign chat id from pulling another conversation in.
    let prior_turns: Vec<Turn> = match chat_id {
        Some(chat_id) => {
            let chat = DatabaseOperations::find_chat(&state.pool, chat_id).await?;
            if chat.agent_id != agent_id || chat.user_id != user_id {
                return Err(AppError::NotFound(format!("chat {chat_id}")));
            }
            chat_service.load_history(chat_id).await?
        }
        None => Vec::new(),
    };

    let has_store = state.knowledge.exists(&agent.store_name).await?;
    let retriever = has_store.then(|| {
        StoreRetriever::new(
            state.knowledge.clone(),
            state.embedder.clone(),
            agent.store_name.clone(),
        )
    });

    let pipeline = ChatPipeline::new(state.generator.clone());
    let answer = pipeline
        .respond(RespondRequest {
            user_input: &request.user_input,
            agent_name: &agent.name,
            agent_context: &agent.context,
            prior_turns: &prior_turns,
            retriever: retriever.as_ref().map(|r| r as &dyn Retriever),
        })
        .await?;

    let chat = chat_service
        .record_turn(agent_id, user_id, chat_id, &request.user_input, &answer)
        .await?;

    info!(agent_id = %agent_id, chat_id = %chat.id, "Chat turn recorded");
    Ok(Json(ChatResponse {
        message: "success".to_string(),
        response: answer,
        chat_id: chat.id,
    }))
}
