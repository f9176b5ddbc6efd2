//! HTTP handlers for file upload, listing, deletion and the view/download
//! bridge. File bodies are streamed through the relay, never buffered on the
//! way out.

use super::parse_id;
use crate::{
    errors::AppError,
    models::file::{FileCategory, NewFile},
    services::{
        blob_store::{BlobUpload, MessageRef, sanitize_content_type, upload_caption},
        relay::{Disposition, ResponseHead},
    },
    state::AppState,
};
use axum::{
    Json,
    extract::{
        Multipart, Path, Query, State,
        multipart::MultipartRejection,
    },
    response::Response,
};
use bytes::Bytes;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{info, warn};

/// Query params accepted by `GET /api/files`.
#[derive(Debug, Deserialize)]
pub struct ListFilesQuery {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub q: Option<String>,
}

struct IncomingFile {
    name: String,
    content_type: Option<String>,
    bytes: Bytes,
}

/// `POST /upload`: multipart `file` plus optional `description`.
pub async fn upload_file(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<Value>, AppError> {
    let mut multipart = multipart.map_err(|e| AppError::validation(e.body_text()))?;

    let mut incoming = None;
    let mut description = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::new(e.status(), e.body_text()))?
    {
        let name = field.name().map(str::to_owned);
        match name.as_deref() {
            Some("file") => {
                let file_name = field
                    .file_name()
                    .filter(|n| !n.is_empty())
                    .unwrap_or("upload.bin")
                    .to_string();
                let content_type = sanitize_content_type(field.content_type());
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::new(e.status(), e.body_text()))?;
                incoming = Some(IncomingFile {
                    name: file_name,
                    content_type,
                    bytes,
                });
            }
            Some("description") => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| AppError::new(e.status(), e.body_text()))?;
                description = Some(text.trim().to_string()).filter(|d| !d.is_empty());
            }
            _ => {}
        }
    }

    let file = incoming.ok_or_else(|| AppError::validation("No file was sent"))?;
    let size = file.bytes.len() as u64;
    let checksum = format!("{:x}", md5::compute(&file.bytes));
    info!(file = %file.name, size, "uploading file");

    let uploaded = state
        .relay
        .upload(BlobUpload {
            file_name: file.name.clone(),
            content_type: file.content_type.clone(),
            bytes: file.bytes,
            caption: upload_caption(&file.name, size, description.as_deref()),
        })
        .await?;

    let record = NewFile {
        file_name: file.name.clone(),
        file_type: FileCategory::from_mime(file.content_type.as_deref()),
        file_size: size as i64,
        mime_type: file.content_type,
        blob_handle: uploaded.handle,
        chat_id: Some(uploaded.message.chat_id.clone()),
        message_id: Some(uploaded.message.message_id),
        description: description.clone(),
        checksum: Some(checksum.clone()),
    };

    let saved = match state.store.insert_file(record).await {
        Ok(saved) => saved,
        Err(err) => {
            // Nothing references the blob now; try not to leave it behind.
            state.relay.release(&uploaded.message).await;
            return Err(err.into());
        }
    };

    info!(id = saved.id, file = %saved.file_name, "upload complete");
    Ok(Json(json!({
        "success": true,
        "db_id": saved.id,
        "file_name": saved.file_name,
        "file_size": saved.file_size,
        "description": saved.description,
        "checksum": checksum,
        "message": "File uploaded successfully",
    })))
}

/// `GET /view/{id}`: stream the file inline.
pub async fn view_file(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, AppError> {
    stream_file(&state, &id, Disposition::Inline).await
}

/// `GET /download/{id}`: stream the file as an attachment under its
/// original name.
pub async fn download_file(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, AppError> {
    stream_file(&state, &id, Disposition::Attachment).await
}

async fn stream_file(
    state: &AppState,
    raw_id: &str,
    disposition: Disposition,
) -> Result<Response, AppError> {
    let id = parse_id(raw_id)?;
    let file = state.store.get_file(id).await?;

    let head = ResponseHead {
        content_type: file.mime_type.clone(),
        disposition,
        file_name: file.file_name.clone(),
        etag: file.checksum.clone(),
    };
    let response = state.relay.stream_to_client(&file.blob_handle, &head).await?;
    info!(id, file = %file.file_name, ?disposition, "streaming file");
    Ok(response)
}

/// `GET /api/files`: newest first, paginated.
pub async fn list_files(
    State(state): State<AppState>,
    Query(q): Query<ListFilesQuery>,
) -> Result<Json<Value>, AppError> {
    let limit = q.limit.filter(|l| *l > 0).unwrap_or(100).min(1000);
    let offset = q.offset.unwrap_or(0).max(0);

    let page = state.store.list_files(limit, offset).await?;
    Ok(Json(json!({
        "success": true,
        "files": page.files,
        "total": page.total,
        "limit": limit,
        "offset": offset,
    })))
}

/// `GET /api/files/search?q=`: case-insensitive name search.
pub async fn search_files(
    State(state): State<AppState>,
    Query(q): Query<SearchQuery>,
) -> Result<Json<Value>, AppError> {
    let query = q.q.unwrap_or_default().trim().to_string();
    if query.is_empty() {
        return Err(AppError::validation("Please enter a search term"));
    }

    let files = state.store.search_files(&query).await?;
    Ok(Json(json!({
        "success": true,
        "files": files,
        "query": query,
    })))
}

/// `DELETE /api/files/{id}`: remove the record and its artifacts, then try to
/// release every chat message they used. Failed releases do not fail the
/// request.
pub async fn delete_file(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let id = parse_id(&id)?;
    // Artifact rows go with the cascade; remember their messages first.
    let artifacts = state.store.artifacts_for_file(id).await?;
    let removed = state.store.delete_file(id).await?;

    let released = match message_ref(removed.chat_id.clone(), removed.message_id) {
        Some(message) => state.relay.release(&message).await,
        None => false,
    };
    if !released {
        warn!(id, "file record deleted but its chat message was kept");
    }

    let mut artifacts_released = 0;
    for artifact in artifacts {
        if let Some(message) = message_ref(artifact.chat_id, artifact.message_id) {
            if state.relay.release(&message).await {
                artifacts_released += 1;
            }
        }
    }

    Ok(Json(json!({
        "success": true,
        "message": "File deleted successfully",
        "blob_released": released,
        "artifacts_released": artifacts_released,
        "file": removed,
    })))
}

fn message_ref(chat_id: Option<String>, message_id: Option<i64>) -> Option<MessageRef> {
    Some(MessageRef {
        chat_id: chat_id?,
        message_id: message_id?,
    })
}
