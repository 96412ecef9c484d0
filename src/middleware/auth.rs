// Authenticated-user extraction.
// Authentication itself lives in an upstream gateway, which injects the
// verified user id as a header; this extractor is the interface to it.

use crate::models::AppState;
use crate::types::AppError;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use uuid::Uuid;

pub const USER_ID_HEADER: &str = "x-user-id";

/// The verified identity attached to the request by the auth gateway.
#[derive(Debug, Clone, Copy)]
pub struct AuthUser(pub Uuid);

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| {
                AppError::Validation(format!("missing {USER_ID_HEADER} header"))
            })?;

        let user_id = header
            .parse::<Uuid>()
            .map_err(|_| AppError::Validation(format!("invalid {USER_ID_HEADER} header")))?;

        Ok(AuthUser(user_id))
    }
}
