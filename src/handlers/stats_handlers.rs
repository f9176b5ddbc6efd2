//! Aggregate statistics endpoints.

use crate::{errors::AppError, models::artifact::ArtifactKind, state::AppState};
use axum::{Json, extract::State};
use serde_json::{Value, json};

/// `GET /api/stats`
pub async fn file_stats(State(state): State<AppState>) -> Result<Json<Value>, AppError> {
    let stats = state.store.file_stats().await?;
    Ok(Json(json!({ "success": true, "stats": stats })))
}

/// `GET /api/stats/summaries`
pub async fn summary_stats(State(state): State<AppState>) -> Result<Json<Value>, AppError> {
    let stats = state.store.artifact_stats(ArtifactKind::Summary).await?;
    Ok(Json(json!({ "success": true, "stats": stats })))
}

/// `GET /api/stats/quizzes`
pub async fn quiz_stats(State(state): State<AppState>) -> Result<Json<Value>, AppError> {
    let stats = state.store.artifact_stats(ArtifactKind::Quiz).await?;
    Ok(Json(json!({ "success": true, "stats": stats })))
}

/// `GET /api/stats/system`: dashboard totals plus process facts and which
/// capabilities are wired. Totals fall back to zero when the database is
/// unreachable so the endpoint still answers.
pub async fn system_stats(State(state): State<AppState>) -> Json<Value> {
    let database_ok = state.store.ping().await.is_ok();
    let files = state.store.file_stats().await.unwrap_or_default();
    let summaries = state
        .store
        .artifact_stats(ArtifactKind::Summary)
        .await
        .unwrap_or_default();
    let quizzes = state
        .store
        .artifact_stats(ArtifactKind::Quiz)
        .await
        .unwrap_or_default();

    Json(json!({
        "success": true,
        "totalFiles": files.total_files,
        "totalStorage": files.total_size,
        "totalSummaries": summaries.total,
        "totalQuizzes": quizzes.total,
        "system": {
            "version": env!("CARGO_PKG_VERSION"),
            "uptime_secs": state.started_at.elapsed().as_secs(),
            "database": database_ok,
            "blob_store_configured": state.relay.is_configured(),
            "ai_configured": state.generator().is_configured(),
            "ai_model": state.generator().model_name(),
        }
    }))
}
