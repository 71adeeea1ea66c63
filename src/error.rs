use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, AppError>;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Forbidden")]
    Forbidden,

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("Payment gateway error: {0}")]
    Gateway(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message, details) = match self {
            AppError::Database(ref msg) => {
                tracing::error!("Database error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "Database error occurred", None)
            }
            AppError::NotFound(ref msg) => (StatusCode::NOT_FOUND, msg.as_str(), None),
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, "Unauthorized", None),
            AppError::Forbidden => (StatusCode::FORBIDDEN, "Forbidden", None),
            AppError::BadRequest(ref msg) => (StatusCode::BAD_REQUEST, msg.as_str(), None),
            AppError::Conflict(ref msg) => (StatusCode::CONFLICT, msg.as_str(), None),
            AppError::Internal(ref msg) => {
                tracing::error!("Internal error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error", None)
            }
            AppError::Gateway(ref msg) => {
                tracing::error!("Payment gateway error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Payment initiation failed",
                    Some(msg.as_str()),
                )
            }
            AppError::Validation(ref msg) => (StatusCode::UNPROCESSABLE_ENTITY, msg.as_str(), None),
            AppError::ServiceUnavailable(ref msg) => {
                (StatusCode::SERVICE_UNAVAILABLE, msg.as_str(), None)
            }
        };

        let body = match details {
            Some(details) => Json(json!({
                "error": error_message,
                "details": details,
            })),
            None => Json(json!({
                "error": error_message,
            })),
        };

        (status, body).into_response()
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
                AppError::Conflict(db_err.message().to_string())
            }
            _ => AppError::Database(err.to_string()),
        }
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::Validation(err.to_string())
    }
}
