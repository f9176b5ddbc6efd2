//! Aggregates served by the `/api/stats*` endpoints.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;

#[derive(Serialize, Clone, FromRow, Debug, Default)]
pub struct FileStats {
    pub total_files: i64,
    pub total_size: i64,
    pub images: i64,
    pub videos: i64,
    pub audios: i64,
    pub documents: i64,
    pub last_upload: Option<DateTime<Utc>>,
}

#[derive(Serialize, Clone, FromRow, Debug, Default)]
pub struct ArtifactStats {
    pub total: i64,
    pub total_words: i64,
    /// Number of distinct source files with at least one artifact.
    pub files_covered: i64,
    pub last_generated: Option<DateTime<Utc>>,
}
