use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use crate::progress::ProgressError;
use crate::quiz::QuizError;
use crate::store::StoreError;

/// Error type for HTTP handlers, rendered as `{"error": ..., "code": ...}`.
///
/// A denied access check is not an error; it is a normal `AccessDecision`.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Not enrolled in this course")]
    NotEnrolled,

    #[error("{0} not found")]
    NotFound(&'static str),

    /// Quiz shape or submission problems.
    #[error(transparent)]
    Quiz(#[from] QuizError),

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

pub type AppResult<T> = Result<T, AppError>;

impl From<ProgressError> for AppError {
    fn from(err: ProgressError) -> Self {
        match err {
            ProgressError::LessonNotFound => AppError::NotFound("Lesson"),
            ProgressError::Quiz(e) => AppError::Quiz(e),
            ProgressError::Store(e) => AppError::Store(e),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::NotEnrolled => (StatusCode::FORBIDDEN, "NOT_ENROLLED", self.to_string()),
            AppError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND", self.to_string()),
            AppError::Quiz(e) if e.is_quiz_state() => {
                (StatusCode::BAD_REQUEST, "INVALID_QUIZ_STATE", e.to_string())
            }
            AppError::Quiz(e) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", e.to_string()),
            AppError::Validation(msg) => {
                (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone())
            }
            AppError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg.clone()),
            AppError::Unauthorized(msg) => {
                (StatusCode::UNAUTHORIZED, "UNAUTHORIZED", msg.clone())
            }
            AppError::Store(err) => classify_store_error(err),
        };

        let body = json!({
            "error": message,
            "code": code,
        });

        (status, axum::Json(body)).into_response()
    }
}

fn classify_store_error(err: &StoreError) -> (StatusCode, &'static str, String) {
    match err {
        StoreError::Database(sqlx::Error::RowNotFound) => (
            StatusCode::NOT_FOUND,
            "NOT_FOUND",
            "Resource not found".to_string(),
        ),
        StoreError::Duplicate(entity) => (
            StatusCode::CONFLICT,
            "CONFLICT",
            format!("Duplicate {entity}"),
        ),
        other => {
            tracing::error!(error = %other, "internal error");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                "An internal error occurred".to_string(),
            )
        }
    }
}
