// Shared error taxonomy and result alias

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("{service} error: {message}")]
    ExternalService {
        service: &'static str,
        message: String,
        transient: bool,
    },

    #[error("Rate limited by {service}")]
    RateLimited { service: &'static str },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn external(service: &'static str, message: impl Into<String>) -> Self {
        AppError::ExternalService {
            service,
            message: message.into(),
            transient: false,
        }
    }

    pub fn external_transient(service: &'static str, message: impl Into<String>) -> Self {
        AppError::ExternalService {
            service,
            message: message.into(),
            transient: true,
        }
    }

    /// Whether a bounded retry is worth attempting. Only upstream rate
    /// limits and transient service failures qualify; validation and
    /// not-found errors never do.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            AppError::RateLimited { .. } | AppError::ExternalService { transient: true, .. }
        )
    }

    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            AppError::ExternalService { .. } => StatusCode::BAD_GATEWAY,
            AppError::Database(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        }
        let body = serde_json::json!({
            "message": "failed",
            "error": self.to_string(),
        });
        (status, Json(body)).into_response()
    }
}

pub type AppResult<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(AppError::RateLimited { service: "images" }.is_transient());
        assert!(AppError::external_transient("llm", "503").is_transient());
        assert!(!AppError::external("llm", "bad request").is_transient());
        assert!(!AppError::Validation("empty".into()).is_transient());
        assert!(!AppError::NotFound("agent".into()).is_transient());
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            AppError::Validation("x".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::NotFound("x".into()).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            AppError::RateLimited { service: "hf" }.status_code(),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(
            AppError::external("llm", "boom").status_code(),
            StatusCode::BAD_GATEWAY
        );
    }
}
