use axum::{http::StatusCode, Json};
use serde_json::json;
use thiserror::Error;
use tracing::error;

#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub message: String,
}

impl AppError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: message.into(),
        }
    }

    pub fn internal(err: impl std::error::Error) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: err.to_string(),
        }
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        Self::internal(err)
    }
}

impl axum::response::IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        if self.status.is_server_error() {
            error!("request failed: {}", self.message);
        }
        let body = json!({ "success": false, "message": self.message });
        (self.status, Json(body)).into_response()
    }
}

/// Failures of the hosted model integration. Callers recover from every
/// variant locally; none of these reach an HTTP client.
#[derive(Debug, Error)]
pub enum AiError {
    #[error("request to model failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("model API returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("model returned malformed output: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("model returned no content")]
    EmptyResponse,

    #[error("model call timed out after {0}s")]
    Timeout(u64),

    #[error("no API key configured for live model calls")]
    NotConfigured,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {key}: {value}")]
    Invalid { key: &'static str, value: String },

    #[error("AI_MODE=live requires OPENAI_API_KEY")]
    MissingApiKey,
}
