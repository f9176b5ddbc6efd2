//! Represents an uploaded file whose bytes live in the chat-backed blob store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Coarse category inferred from the MIME type at upload time.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum FileCategory {
    Image,
    Video,
    Audio,
    Document,
}

impl FileCategory {
    /// Infer the category from a MIME type prefix. Unknown or missing types
    /// are treated as documents.
    pub fn from_mime(mime: Option<&str>) -> Self {
        match mime {
            Some(m) if m.starts_with("image/") => Self::Image,
            Some(m) if m.starts_with("video/") => Self::Video,
            Some(m) if m.starts_with("audio/") => Self::Audio,
            _ => Self::Document,
        }
    }
}

/// A single uploaded file.
///
/// `blob_handle` is set once at creation and never rewritten. The
/// `chat_id`/`message_id` pair points at the chat message carrying the bytes
/// and is only used to release that message when the file is deleted.
#[derive(Serialize, Deserialize, Clone, FromRow, Debug)]
pub struct StoredFile {
    /// Store-assigned identity.
    pub id: i64,

    /// Original filename as sent by the client.
    pub file_name: String,

    pub file_type: FileCategory,

    /// Size in bytes.
    pub file_size: i64,

    /// Content type (MIME type) reported by the client.
    pub mime_type: Option<String>,

    /// Opaque handle issued by the blob store.
    pub blob_handle: String,

    pub chat_id: Option<String>,
    pub message_id: Option<i64>,

    /// Free-text description supplied with the upload.
    pub description: Option<String>,

    /// MD5 of the uploaded bytes, hex encoded.
    pub checksum: Option<String>,

    pub created_at: DateTime<Utc>,
}

/// Fields needed to insert a new file record.
#[derive(Clone, Debug)]
pub struct NewFile {
    pub file_name: String,
    pub file_type: FileCategory,
    pub file_size: i64,
    pub mime_type: Option<String>,
    pub blob_handle: String,
    pub chat_id: Option<String>,
    pub message_id: Option<i64>,
    pub description: Option<String>,
    pub checksum: Option<String>,
}
