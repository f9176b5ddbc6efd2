//! AI generation and generated-content endpoints.

use super::parse_id;
use crate::{
    errors::AppError,
    models::artifact::{ArtifactKind, DerivedArtifact},
    services::{
        export::ExportFormat,
        generation::{Action, QuizStructure},
        metadata_store::StoreError,
        relay::{Disposition, MARKDOWN_CONTENT_TYPE, ResponseHead, content_disposition},
    },
    state::AppState,
};
use axum::{
    Json,
    extract::{Path, State, rejection::JsonRejection},
    http::{HeaderValue, header},
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use serde_json::{Value, json};

/// Body of `POST /api/ai/generate`. Fields are optional here so missing
/// ones can be reported as validation errors in the JSON envelope.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateRequest {
    pub file_id: Option<Value>,
    pub action: Option<String>,
    pub quiz_structure: Option<QuizStructure>,
}

fn parse_file_id(raw: Option<&Value>) -> Result<i64, AppError> {
    match raw {
        Some(Value::Number(n)) => n
            .as_i64()
            .ok_or_else(|| AppError::validation("fileId must be an integer")),
        Some(Value::String(s)) => parse_id(s),
        _ => Err(AppError::validation("fileId is required")),
    }
}

fn parse_action(raw: Option<&str>) -> Result<Action, AppError> {
    match raw.map(str::trim) {
        Some("summarize") | Some("summary") => Ok(Action::Summarize),
        Some("quiz") => Ok(Action::Quiz),
        Some(other) => Err(AppError::validation(format!(
            "Unknown action `{}`; expected `summarize` or `quiz`",
            other
        ))),
        None => Err(AppError::validation("action is required")),
    }
}

/// `POST /api/ai/generate`: summary or quiz for an uploaded file.
pub async fn generate(
    State(state): State<AppState>,
    body: Result<Json<GenerateRequest>, JsonRejection>,
) -> Result<Json<Value>, AppError> {
    let Json(body) = body.map_err(|e| AppError::validation(e.body_text()))?;
    let file_id = parse_file_id(body.file_id.as_ref())?;
    let action = parse_action(body.action.as_deref())?;
    if let Some(structure) = body.quiz_structure.as_ref() {
        structure.validate().map_err(AppError::validation)?;
    }

    let generated = state
        .cache
        .get_or_generate(file_id, action, body.quiz_structure.as_ref())
        .await?;

    Ok(Json(json!({
        "success": true,
        "result": generated.text,
        "cached": generated.was_cached,
        "artifactId": generated.artifact_id,
    })))
}

async fn stream_artifact(state: &AppState, artifact: &DerivedArtifact) -> Result<Response, AppError> {
    let head = ResponseHead {
        content_type: Some(MARKDOWN_CONTENT_TYPE.to_string()),
        disposition: Disposition::Inline,
        file_name: artifact.name.clone(),
        etag: None,
    };
    Ok(state.relay.stream_to_client(&artifact.blob_handle, &head).await?)
}

/// `GET /api/summary/content/{fileId}`: the current summary of a file.
pub async fn summary_content(
    State(state): State<AppState>,
    Path(file_id): Path<String>,
) -> Result<Response, AppError> {
    let file_id = parse_id(&file_id)?;
    state.store.get_file(file_id).await?;

    let artifact = state
        .store
        .latest_artifact(file_id, ArtifactKind::Summary)
        .await?
        .ok_or(StoreError::NoArtifactForFile {
            file_id,
            kind: ArtifactKind::Summary.as_str(),
        })?;
    stream_artifact(&state, &artifact).await
}

/// `GET /api/quiz/content/{id}`: a generated quiz by artifact id.
pub async fn quiz_content(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, AppError> {
    let id = parse_id(&id)?;
    let artifact = state.store.get_artifact(id).await?;
    if artifact.kind != ArtifactKind::Quiz {
        return Err(StoreError::ArtifactNotFound(id).into());
    }
    stream_artifact(&state, &artifact).await
}

fn parse_kind(raw: &str) -> Result<ArtifactKind, AppError> {
    match raw.trim() {
        "summary" | "summaries" => Ok(ArtifactKind::Summary),
        "quiz" | "quizzes" => Ok(ArtifactKind::Quiz),
        other => Err(AppError::validation(format!(
            "Unknown artifact type `{}`; expected `summary` or `quiz`",
            other
        ))),
    }
}

/// `GET /api/convert/{kind}/{id}/{format}`: download a generated artifact as
/// Markdown (`md`) or plain text (`txt`).
pub async fn export_artifact(
    State(state): State<AppState>,
    Path((kind, id, format)): Path<(String, String, String)>,
) -> Result<Response, AppError> {
    let kind = parse_kind(&kind)?;
    let format = ExportFormat::parse(&format).ok_or_else(|| {
        AppError::validation(format!(
            "Unsupported export format `{}`; use `md` or `txt`",
            format
        ))
    })?;
    let id = parse_id(&id)?;

    let artifact = state.store.get_artifact(id).await?;
    if artifact.kind != kind {
        return Err(StoreError::ArtifactNotFound(id).into());
    }

    let bytes = state.relay.fetch_bytes(&artifact.blob_handle).await?;
    let body = format.render(&String::from_utf8_lossy(&bytes));
    let file_name = format.file_name(&artifact.name);

    Ok((
        [
            (header::CONTENT_TYPE, HeaderValue::from_static(format.content_type())),
            (
                header::CONTENT_DISPOSITION,
                content_disposition(Disposition::Attachment, &file_name),
            ),
        ],
        body,
    )
        .into_response())
}
