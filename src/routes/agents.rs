use crate::agents::{AgentService, AgentUpdate, UploadedFile};
use crate::db::DatabaseOperations;
use crate::middleware::AuthUser;
use crate::models::{AgentSummary, AppState};
use crate::types::{AppError, AppResult};
use axum::extract::multipart::Field;
use axum::extract::{Multipart, Path, State};
use axum::http::StatusCode;
use axum::routing::{get, patch};
use axum::{Json, Router};
use std::path::PathBuf;
use tracing::warn;
use uuid::Uuid;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/agents", get(list_agents).post(create_agent))
        .route("/api/agents/{agent_id}", patch(edit_agent))
        .with_state(state)
}

async fn list_agents(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> AppResult<Json<serde_json::Value>> {
    let service = AgentService::from_state(&state);
    let agents = service.list(user_id).await?;

    Ok(Json(serde_json::json!({
        "message": "success",
        "response": agents,
    })))
}

async fn create_agent(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    mut multipart: Multipart,
) -> AppResult<(StatusCode, Json<serde_json::Value>)> {
    let owner = DatabaseOperations::find_user(&state.pool, user_id).await?;
    let upload_dir = PathBuf::from(&state.config.storage.upload_dir);

    let mut name: Option<String> = None;
    let mut context = String::new();
    let mut description = String::new();
    let mut picture: Option<UploadedFile> = None;
    let mut training_paths: Vec<PathBuf> = Vec::new();

    while let Some(field) = next_field(&mut multipart).await? {
        let field_name = field.name().unwrap_or("").to_string();
        match field_name.as_str() {
            "agentName" => name = Some(read_text(field).await?),
            "context" => context = read_text(field).await?,
            "description" => description = read_text(field).await?,
            "agentPic" => picture = Some(read_upload(field).await?),
            "trainFiles" => {
                let upload = read_upload(field).await?;
                training_paths.push(save_upload(&upload_dir, &upload).await?);
            }
            other => warn!(field = other, "Ignoring unknown multipart field"),
        }
    }

    let name = name.ok_or_else(|| AppError::Validation("agentName is required".to_string()))?;

    let service = AgentService::from_state(&state);
    let result = service
        .create(&owner, &name, &context, &description, picture, &training_paths)
        .await;
    cleanup_uploads(&training_paths).await;
    result?;

    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({ "message": "success" })),
    ))
}

async fn edit_agent(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(agent_id): Path<Uuid>,
    mut multipart: Multipart,
) -> AppResult<Json<serde_json::Value>> {
    let owner = DatabaseOperations::find_user(&state.pool, user_id).await?;

    let mut update = AgentUpdate::default();
    while let Some(field) = next_field(&mut multipart).await? {
        let field_name = field.name().unwrap_or("").to_string();
        match field_name.as_str() {
            "agentName" => update.name = Some(read_text(field).await?),
            "context" => update.context = Some(read_text(field).await?),
            "description" => update.description = Some(read_text(field).await?),
            "agentPic" => update.picture = Some(read_upload(field).await?),
            other => warn!(field = other, "Ignoring unknown multipart field"),
        }
    }

    let service = AgentService::from_state(&state);
    let agent = service.update(agent_id, &owner, update).await?;

    Ok(Json(serde_json::json!({
        "message": "success",
        "response": AgentSummary::from(agent),
    })))
}

async fn next_field(multipart: &mut Multipart) -> AppResult<Option<Field<'_>>> {
    multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("malformed multipart body: {e}")))
}

async fn read_text(field: Field<'_>) -> AppResult<String> {
    field
        .text()
        .await
        .map_err(|e| AppError::Validation(format!("unreadable multipart field: {e}")))
}

async fn read_upload(field: Field<'_>) -> AppResult<UploadedFile> {
    let filename = field
        .file_name()
        .unwrap_or("upload")
        .replace(['/', '\\'], "_");
    let content_type = field
        .content_type()
        .map(str::to_string)
        .unwrap_or_else(|| {
            mime_guess::from_path(&filename)
                .first_or_octet_stream()
                .to_string()
        });
    let bytes = field
        .bytes()
        .await
        .map_err(|e| AppError::Validation(format!("unreadable upload: {e}")))?;

    Ok(UploadedFile {
        filename,
        content_type,
        bytes,
    })
}

/// Park an upload in the scratch directory so ingestion can read it by
/// path; callers clean up after themselves.
async fn save_upload(upload_dir: &PathBuf, upload: &UploadedFile) -> AppResult<PathBuf> {
    tokio::fs::create_dir_all(upload_dir)
        .await
        .map_err(|e| AppError::Internal(format!("cannot create upload dir: {e}")))?;
    let path = upload_dir.join(format!("{}_{}", Uuid::new_v4(), upload.filename));
    tokio::fs::write(&path, &upload.bytes)
        .await
        .map_err(|e| AppError::Internal(format!("cannot save upload: {e}")))?;
    Ok(path)
}

async fn cleanup_uploads(paths: &[PathBuf]) {
    for path in paths {
        if let Err(error) = tokio::fs::remove_file(path).await {
            warn!(path = %path.display(), error = %error, "Could not delete local upload");
        }
    }
}
