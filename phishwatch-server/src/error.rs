//! Error handling

use axum::{
    response::{IntoResponse, Response},
    http::StatusCode,
    Json,
};
use serde_json::json;

use crate::monitor::MonitorError;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug)]
pub enum AppError {
    // Resource errors
    NotFound(String),

    // Validation errors
    ValidationError(String),

    // Database errors
    DatabaseError(String),

    // External service errors
    ExternalServiceError(String),

    // Generic errors
    InternalError(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.as_str()),
            AppError::ValidationError(msg) => (StatusCode::BAD_REQUEST, msg.as_str()),
            AppError::DatabaseError(msg) => {
                tracing::error!("Database error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "Database error occurred")
            }
            AppError::ExternalServiceError(msg) => {
                tracing::error!("External service error: {}", msg);
                (StatusCode::SERVICE_UNAVAILABLE, "Classification service unavailable, try again")
            }
            AppError::InternalError(msg) => {
                tracing::error!("Internal error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
            }
        };

        let body = Json(json!({
            "error": error_message,
            "status": status.as_u16()
        }));

        (status, body).into_response()
    }
}

impl From<MonitorError> for AppError {
    fn from(err: MonitorError) -> Self {
        match err {
            MonitorError::ClassificationUnavailable { .. } => AppError::ExternalServiceError(err.to_string()),
            MonitorError::StoreUnavailable(msg) => AppError::DatabaseError(msg),
            MonitorError::InvalidInput(msg) => AppError::ValidationError(msg),
            MonitorError::NotFound(_) => AppError::NotFound("Record not found".to_string()),
            MonitorError::DuplicateRecord { .. } | MonitorError::AlertDelivery(_) => {
                AppError::InternalError(err.to_string())
            }
        }
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::DatabaseError(err.to_string())
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::ValidationError(err.to_string())
    }
}
