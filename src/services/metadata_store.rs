//! src/services/metadata_store.rs
//!
//! MetadataStore: record access for files and derived artifacts. The
//! production implementation keeps everything in SQLite; payload bytes are
//! never stored here, only blob handles.

use crate::models::{
    artifact::{ArtifactKind, DerivedArtifact, NewArtifact},
    file::{NewFile, StoredFile},
    stats::{ArtifactStats, FileStats},
};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{SqlitePool, types::Json};
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("file `{0}` not found")]
    FileNotFound(i64),
    #[error("artifact `{0}` not found")]
    ArtifactNotFound(i64),
    #[error("no {kind} found for file `{file_id}`")]
    NoArtifactForFile { file_id: i64, kind: &'static str },
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Maximum rows returned by a name search.
pub const SEARCH_LIMIT: i64 = 50;

/// A page of files plus the total number of files.
#[derive(Debug)]
pub struct FilePage {
    pub files: Vec<StoredFile>,
    pub total: i64,
}

#[async_trait]
pub trait MetadataStore: Send + Sync {
    async fn insert_file(&self, file: NewFile) -> StoreResult<StoredFile>;
    async fn get_file(&self, id: i64) -> StoreResult<StoredFile>;
    /// Newest first.
    async fn list_files(&self, limit: i64, offset: i64) -> StoreResult<FilePage>;
    /// Case-insensitive substring match on the file name, newest first.
    async fn search_files(&self, query: &str) -> StoreResult<Vec<StoredFile>>;
    /// Remove a file record (and its artifacts) and return what was removed.
    async fn delete_file(&self, id: i64) -> StoreResult<StoredFile>;

    async fn insert_artifact(&self, artifact: NewArtifact) -> StoreResult<DerivedArtifact>;
    async fn get_artifact(&self, id: i64) -> StoreResult<DerivedArtifact>;
    /// Every artifact of a file, oldest first.
    async fn artifacts_for_file(&self, file_id: i64) -> StoreResult<Vec<DerivedArtifact>>;
    /// The authoritative artifact of `kind` for a file: the most recent one.
    async fn latest_artifact(
        &self,
        file_id: i64,
        kind: ArtifactKind,
    ) -> StoreResult<Option<DerivedArtifact>>;

    async fn file_stats(&self) -> StoreResult<FileStats>;
    async fn artifact_stats(&self, kind: ArtifactKind) -> StoreResult<ArtifactStats>;
    /// Cheap connectivity check.
    async fn ping(&self) -> StoreResult<()>;
}

const FILE_COLUMNS: &str = "id, file_name, file_type, file_size, mime_type, blob_handle, \
     chat_id, message_id, description, checksum, created_at";

const ARTIFACT_COLUMNS: &str = "id, file_id, kind, name, blob_handle, chat_id, message_id, \
     word_count, metadata, created_at";

#[derive(Clone)]
pub struct SqliteMetadataStore {
    /// Shared SQLite connection pool.
    pub db: Arc<SqlitePool>,
}

impl SqliteMetadataStore {
    pub fn new(db: Arc<SqlitePool>) -> Self {
        Self { db }
    }
}

/// Escape LIKE wildcards so user input only matches literally.
fn like_pattern(query: &str) -> String {
    let mut escaped = String::with_capacity(query.len() + 2);
    escaped.push('%');
    for c in query.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

#[async_trait]
impl MetadataStore for SqliteMetadataStore {
    async fn insert_file(&self, file: NewFile) -> StoreResult<StoredFile> {
        let description = file.description.filter(|d| !d.trim().is_empty());
        let stored = sqlx::query_as::<_, StoredFile>(&format!(
            "INSERT INTO files (
                file_name, file_type, file_size, mime_type, blob_handle,
                chat_id, message_id, description, checksum, created_at
             ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             RETURNING {}",
            FILE_COLUMNS
        ))
        .bind(&file.file_name)
        .bind(file.file_type)
        .bind(file.file_size)
        .bind(&file.mime_type)
        .bind(&file.blob_handle)
        .bind(&file.chat_id)
        .bind(file.message_id)
        .bind(description)
        .bind(&file.checksum)
        .bind(Utc::now())
        .fetch_one(&*self.db)
        .await?;

        debug!(id = stored.id, "file record saved");
        Ok(stored)
    }

    async fn get_file(&self, id: i64) -> StoreResult<StoredFile> {
        sqlx::query_as::<_, StoredFile>(&format!("SELECT {} FROM files WHERE id = ?", FILE_COLUMNS))
            .bind(id)
            .fetch_optional(&*self.db)
            .await?
            .ok_or(StoreError::FileNotFound(id))
    }

    async fn list_files(&self, limit: i64, offset: i64) -> StoreResult<FilePage> {
        let files = sqlx::query_as::<_, StoredFile>(&format!(
            "SELECT {} FROM files ORDER BY created_at DESC, id DESC LIMIT ? OFFSET ?",
            FILE_COLUMNS
        ))
        .bind(limit)
        .bind(offset)
        .fetch_all(&*self.db)
        .await?;

        let total = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM files")
            .fetch_one(&*self.db)
            .await?;

        Ok(FilePage { files, total })
    }

    async fn search_files(&self, query: &str) -> StoreResult<Vec<StoredFile>> {
        let files = sqlx::query_as::<_, StoredFile>(&format!(
            "SELECT {} FROM files
             WHERE file_name LIKE ? ESCAPE '\\'
             ORDER BY created_at DESC, id DESC
             LIMIT ?",
            FILE_COLUMNS
        ))
        .bind(like_pattern(query))
        .bind(SEARCH_LIMIT)
        .fetch_all(&*self.db)
        .await?;
        Ok(files)
    }

    async fn delete_file(&self, id: i64) -> StoreResult<StoredFile> {
        let removed = sqlx::query_as::<_, StoredFile>(&format!(
            "DELETE FROM files WHERE id = ? RETURNING {}",
            FILE_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&*self.db)
        .await?
        .ok_or(StoreError::FileNotFound(id))?;

        debug!(id, "file record removed");
        Ok(removed)
    }

    async fn insert_artifact(&self, artifact: NewArtifact) -> StoreResult<DerivedArtifact> {
        let stored = sqlx::query_as::<_, DerivedArtifact>(&format!(
            "INSERT INTO artifacts (
                file_id, kind, name, blob_handle, chat_id, message_id,
                word_count, metadata, created_at
             ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
             RETURNING {}",
            ARTIFACT_COLUMNS
        ))
        .bind(artifact.file_id)
        .bind(artifact.kind)
        .bind(&artifact.name)
        .bind(&artifact.blob_handle)
        .bind(&artifact.chat_id)
        .bind(artifact.message_id)
        .bind(artifact.word_count)
        .bind(Json(&artifact.metadata))
        .bind(Utc::now())
        .fetch_one(&*self.db)
        .await?;

        debug!(id = stored.id, file_id = stored.file_id, kind = stored.kind.as_str(), "artifact saved");
        Ok(stored)
    }

    async fn get_artifact(&self, id: i64) -> StoreResult<DerivedArtifact> {
        sqlx::query_as::<_, DerivedArtifact>(&format!(
            "SELECT {} FROM artifacts WHERE id = ?",
            ARTIFACT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&*self.db)
        .await?
        .ok_or(StoreError::ArtifactNotFound(id))
    }

    async fn artifacts_for_file(&self, file_id: i64) -> StoreResult<Vec<DerivedArtifact>> {
        let artifacts = sqlx::query_as::<_, DerivedArtifact>(&format!(
            "SELECT {} FROM artifacts WHERE file_id = ? ORDER BY created_at, id",
            ARTIFACT_COLUMNS
        ))
        .bind(file_id)
        .fetch_all(&*self.db)
        .await?;
        Ok(artifacts)
    }

    async fn latest_artifact(
        &self,
        file_id: i64,
        kind: ArtifactKind,
    ) -> StoreResult<Option<DerivedArtifact>> {
        let artifact = sqlx::query_as::<_, DerivedArtifact>(&format!(
            "SELECT {} FROM artifacts
             WHERE file_id = ? AND kind = ?
             ORDER BY created_at DESC, id DESC
             LIMIT 1",
            ARTIFACT_COLUMNS
        ))
        .bind(file_id)
        .bind(kind)
        .fetch_optional(&*self.db)
        .await?;
        Ok(artifact)
    }

    async fn file_stats(&self) -> StoreResult<FileStats> {
        let stats = sqlx::query_as::<_, FileStats>(
            "SELECT
                COUNT(*) AS total_files,
                COALESCE(SUM(file_size), 0) AS total_size,
                COALESCE(SUM(CASE WHEN file_type = 'image' THEN 1 ELSE 0 END), 0) AS images,
                COALESCE(SUM(CASE WHEN file_type = 'video' THEN 1 ELSE 0 END), 0) AS videos,
                COALESCE(SUM(CASE WHEN file_type = 'audio' THEN 1 ELSE 0 END), 0) AS audios,
                COALESCE(SUM(CASE WHEN file_type = 'document' THEN 1 ELSE 0 END), 0) AS documents,
                MAX(created_at) AS last_upload
             FROM files",
        )
        .fetch_one(&*self.db)
        .await?;
        Ok(stats)
    }

    async fn artifact_stats(&self, kind: ArtifactKind) -> StoreResult<ArtifactStats> {
        let stats = sqlx::query_as::<_, ArtifactStats>(
            "SELECT
                COUNT(*) AS total,
                COALESCE(SUM(word_count), 0) AS total_words,
                COUNT(DISTINCT file_id) AS files_covered,
                MAX(created_at) AS last_generated
             FROM artifacts WHERE kind = ?",
        )
        .bind(kind)
        .fetch_one(&*self.db)
        .await?;
        Ok(stats)
    }

    async fn ping(&self) -> StoreResult<()> {
        sqlx::query_scalar::<_, i64>("SELECT 1")
            .fetch_one(&*self.db)
            .await?;
        Ok(())
    }
}
