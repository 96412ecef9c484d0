use crate::blog::BlogGenerator;
use crate::images::ImageGenerator;
use crate::middleware::AuthUser;
use crate::models::{AppState, BlogRequest};
use crate::types::{AppError, AppResult};
use crate::utils::retry::RetryPolicy;
use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use tracing::warn;
use validator::Validate;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/blog", post(create_blog))
        .with_state(state)
}

async fn create_blog(
    State(state): State<AppState>,
    AuthUser(_user_id): AuthUser,
    Json(request): Json<BlogRequest>,
) -> AppResult<Json<serde_json::Value>> {
    request
        .validate()
        .map_err(|_| AppError::Validation("no blog instructions supplied".to_string()))?;

    let generator = BlogGenerator::new(state.generator.clone(), state.config.blog.concurrency);
    let post = generator.generate(&request.user_instructions).await?;

    // Cover image is best-effort: a failure past the retry budget is
    // reported as a null image, never as a failed blog.
    let cover_image = if state.config.image.hf_api_key.is_empty() {
        None
    } else {
        let retry = RetryPolicy::from_config(&state.config.retry);
        let images = ImageGenerator::from_config(&state.config.image, retry, state.storage.clone())?;
        match images.generate(&post.heading).await {
            Ok(location) => Some(location),
            Err(error) => {
                warn!(error = %error, "Cover image generation failed");
                None
            }
        }
    };

    Ok(Json(serde_json::json!({
        "message": "success",
        "blogHeading": post.heading,
        "sections": post.sections,
        "coverImage": cover_image,
    })))
}
