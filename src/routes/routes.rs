//! Defines the HTTP routes of the file vault.
//!
//! ## Structure
//! - **Files**
//!   - `POST   /upload`                -> multipart upload
//!   - `GET    /view/{id}`             -> stream inline
//!   - `GET    /download/{id}`         -> stream as attachment
//!   - `GET    /api/files`             -> list (limit, offset)
//!   - `GET    /api/files/search`      -> name search (`q`)
//!   - `DELETE /api/files/{id}`        -> delete record, release blob
//!
//! - **AI artifacts**
//!   - `POST   /api/ai/generate`               -> summary or quiz
//!   - `GET    /api/summary/content/{fileId}`  -> current summary as Markdown
//!   - `GET    /api/quiz/content/{id}`         -> quiz as Markdown
//!   - `GET    /api/convert/{kind}/{id}/{fmt}` -> artifact export (md, txt)
//!
//! - **Stats & health**
//!   - `GET /api/stats`, `/api/stats/summaries`, `/api/stats/quizzes`, `/api/stats/system`
//!   - `GET /health`, `/healthz`, `/readyz`

use crate::{
    handlers::{
        ai_handlers::{export_artifact, generate, quiz_content, summary_content},
        file_handlers::{delete_file, download_file, list_files, search_files, upload_file, view_file},
        health_handlers::{health, healthz, readyz},
        stats_handlers::{file_stats, quiz_stats, summary_stats, system_stats},
    },
    state::AppState,
};
use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{delete, get, post},
};

/// Largest accepted upload.
pub const MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;

/// Build and return the router for all routes.
///
/// The router carries shared state (`AppState`) to all handlers.
pub fn routes() -> Router<AppState> {
    Router::new()
        // health endpoints (mounted at root)
        .route("/health", get(health))
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        // file routes
        .route(
            "/upload",
            post(upload_file).layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES)),
        )
        .route("/view/{id}", get(view_file))
        .route("/download/{id}", get(download_file))
        .route("/api/files", get(list_files))
        .route("/api/files/search", get(search_files))
        .route("/api/files/{id}", delete(delete_file))
        // AI artifact routes
        .route("/api/ai/generate", post(generate))
        .route("/api/summary/content/{file_id}", get(summary_content))
        .route("/api/quiz/content/{id}", get(quiz_content))
        .route("/api/convert/{kind}/{id}/{format}", get(export_artifact))
        // stats
        .route("/api/stats", get(file_stats))
        .route("/api/stats/summaries", get(summary_stats))
        .route("/api/stats/quizzes", get(quiz_stats))
        .route("/api/stats/system", get(system_stats))
}
