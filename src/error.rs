// src/error.rs

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::fmt;

/// Global Application Error Enum.
/// Shared by the HTTP handlers, the stores and the batch jobs.
#[derive(Debug, Clone, PartialEq)]
pub enum AppError {
    // 500 Internal Server Error
    InternalServerError(String),

    // 400 Bad Request
    BadRequest(String),

    // 401 Unauthorized
    AuthError(String),

    // 403 Forbidden
    Forbidden(String),

    // 404 Not Found
    NotFound(String),

    // 409 Conflict (e.g., attempt already submitted, stale bank version)
    Conflict(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::InternalServerError(msg) => write!(f, "internal error: {}", msg),
            AppError::BadRequest(msg) => write!(f, "bad request: {}", msg),
            AppError::AuthError(msg) => write!(f, "unauthorized: {}", msg),
            AppError::Forbidden(msg) => write!(f, "forbidden: {}", msg),
            AppError::NotFound(msg) => write!(f, "not found: {}", msg),
            AppError::Conflict(msg) => write!(f, "conflict: {}", msg),
        }
    }
}

impl std::error::Error for AppError {}

/// Converts the error into a JSON response with appropriate HTTP status code.
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::InternalServerError(msg) => {
                tracing::error!("Internal Server Error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal Server Error".to_string(),
                )
            }
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::AuthError(msg) => (StatusCode::UNAUTHORIZED, msg),
            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg),
        };
        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

/// Allows using `?` on database queries.
impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => AppError::NotFound("Record not found".to_string()),
            other => AppError::InternalServerError(other.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for AppError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        AppError::InternalServerError(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::BadRequest(err.to_string())
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::BadRequest(err.to_string())
    }
}
