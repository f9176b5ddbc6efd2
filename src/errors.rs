use crate::services::{
    artifact_cache::CacheError, blob_store::BlobError, generation::GenerationError,
    metadata_store::StoreError,
};
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::fmt;

/// A request-level failure: an HTTP status plus a message that is safe to
/// show to the user. Internal detail is logged where the error is converted.
#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub message: String,
}

impl AppError {
    /// Create a new AppError with a specific status and message.
    pub fn new(status: StatusCode, msg: impl Into<String>) -> Self {
        Self {
            status,
            message: msg.into(),
        }
    }

    /// Shortcut for a 500 Internal Server Error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, msg)
    }

    /// Shortcut for 404 Not Found
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, msg)
    }

    /// Shortcut for 400 Bad Request on a missing or malformed field.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, msg)
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "success": false,
            "error": self.message,
        }));

        (self.status, body).into_response()
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        tracing::error!(error = %err, "internal error");
        AppError::internal("Internal server error")
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::FileNotFound(_) => AppError::not_found("File not found"),
            StoreError::ArtifactNotFound(_) | StoreError::NoArtifactForFile { .. } => {
                AppError::not_found(err.to_string())
            }
            StoreError::Sqlx(err) => {
                tracing::error!(error = %err, "database error");
                AppError::internal("Database error")
            }
        }
    }
}

impl From<BlobError> for AppError {
    fn from(err: BlobError) -> Self {
        match err {
            BlobError::NotConfigured => AppError::internal(
                "File storage is not configured. Set BOT_TOKEN and CHAT_ID.",
            ),
            BlobError::Upstream(detail) => {
                tracing::warn!(error = %detail, "blob store failure");
                AppError::new(StatusCode::BAD_GATEWAY, "File storage is unavailable")
            }
        }
    }
}

impl From<GenerationError> for AppError {
    fn from(err: GenerationError) -> Self {
        match err {
            GenerationError::NotConfigured => {
                AppError::internal("AI generation is not configured. Set GEMINI_API_KEY.")
            }
            GenerationError::UnsupportedInput => AppError::validation(
                "This file type cannot be processed by the AI service",
            ),
            GenerationError::RateLimited => AppError::new(
                StatusCode::TOO_MANY_REQUESTS,
                "The AI service is busy. Please try again in a minute.",
            ),
            GenerationError::ContentBlocked => AppError::new(
                StatusCode::UNPROCESSABLE_ENTITY,
                "The AI service declined to process this content",
            ),
            GenerationError::Upstream(detail) => {
                tracing::warn!(error = %detail, "AI provider failure");
                AppError::new(StatusCode::BAD_GATEWAY, "The AI service failed to respond")
            }
        }
    }
}

impl From<CacheError> for AppError {
    fn from(err: CacheError) -> Self {
        match err {
            CacheError::Store(err) => err.into(),
            CacheError::Source(err) => err.into(),
            CacheError::Generation(err) => err.into(),
        }
    }
}
