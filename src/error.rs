use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

/// Errors surfaced by the embedding provider contract
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum EmbedError {
    #[error("embedding provider rate limited")]
    RateLimited,

    #[error("embedding input rejected: {0}")]
    InvalidInput(String),

    #[error("embedding provider unavailable: {0}")]
    Unavailable(String),
}

/// Application-level errors
#[derive(thiserror::Error, Debug)]
pub enum AppError {
    #[error("Upstream unavailable: {0}")]
    Upstream(String),

    #[error("Embedding error: {0}")]
    Embedding(#[from] EmbedError),

    #[error("Cache error: {0}")]
    Cache(#[from] redis::RedisError),

    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Failure of a single-flight computation, observed by every caller
    /// that was waiting on the same fingerprint.
    #[error("Compute failed for fingerprint {fingerprint}: {message}")]
    ComputeFailed { fingerprint: String, message: String },

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::InvalidInput(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Embedding(EmbedError::RateLimited) => {
                (StatusCode::TOO_MANY_REQUESTS, self.to_string())
            }
            AppError::Embedding(EmbedError::InvalidInput(_)) => {
                (StatusCode::BAD_REQUEST, self.to_string())
            }
            AppError::Embedding(_) | AppError::Upstream(_) | AppError::HttpClient(_) => {
                (StatusCode::BAD_GATEWAY, self.to_string())
            }
            AppError::Cache(_) | AppError::Internal(_) | AppError::ComputeFailed { .. } => {
                (StatusCode::INTERNAL_SERVER_ERROR, self.to_string())
            }
        };

        let body = Json(json!({
            "error": message
        }));

        (status, body).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;
