//! The blob-store capability: upload bytes, get a handle; resolve a handle to
//! a short-lived direct URL; release the message that carries a blob.
//!
//! The production implementation is [`TelegramBlobStore`](super::telegram::TelegramBlobStore).
//! Everything above this trait treats the store as opaque.

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BlobError {
    #[error("blob store is not configured")]
    NotConfigured,
    #[error("blob store request failed: {0}")]
    Upstream(String),
}

pub type BlobResult<T> = Result<T, BlobError>;

impl From<reqwest::Error> for BlobError {
    fn from(err: reqwest::Error) -> Self {
        // reqwest includes the request URL in its Display output, and the URL
        // may carry the bot token.
        BlobError::Upstream(err.without_url().to_string())
    }
}

/// Reference to the chat message that carries a blob.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct MessageRef {
    pub chat_id: String,
    pub message_id: i64,
}

/// Bytes to upload plus the presentation details the chat platform shows.
#[derive(Clone, Debug)]
pub struct BlobUpload {
    pub file_name: String,
    pub content_type: Option<String>,
    pub bytes: Bytes,
    pub caption: String,
}

/// Result of a successful upload.
#[derive(Clone, Debug)]
pub struct UploadedBlob {
    pub handle: String,
    pub message: MessageRef,
}

#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Upload bytes and return the issued handle.
    async fn upload(&self, upload: BlobUpload) -> BlobResult<UploadedBlob>;

    /// Resolve a handle to a transient direct-download URL. Callers must not
    /// persist or log the URL.
    async fn resolve_url(&self, handle: &str) -> BlobResult<String>;

    /// Delete the message carrying a blob.
    async fn release(&self, message: &MessageRef) -> BlobResult<()>;
}

/// Normalize a client-supplied MIME type. Returns `None` unless it has the
/// `type/subtype` shape with RFC 7230 token characters on both sides;
/// parameters after `;` are kept as sent.
pub fn sanitize_content_type(raw: Option<&str>) -> Option<String> {
    let raw = raw?.trim();
    let essence = raw.split(';').next().unwrap_or_default().trim();
    let (kind, subtype) = essence.split_once('/')?;

    let is_token = |part: &str| {
        !part.is_empty()
            && part
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || b"!#$%&'*+-.^_`|~".contains(&b))
    };
    (is_token(kind) && is_token(subtype)).then(|| raw.to_ascii_lowercase())
}

/// Human-readable byte size with 1024 steps, e.g. `1.5 KB`.
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["Bytes", "KB", "MB", "GB"];
    if bytes == 0 {
        return "0 Bytes".into();
    }
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    let rounded = (value * 100.0).round() / 100.0;
    format!("{} {}", rounded, UNITS[unit])
}

/// Caption attached to uploaded files: name, size and optional description.
pub fn upload_caption(file_name: &str, size: u64, description: Option<&str>) -> String {
    let mut caption = format!("📁 {}\n📊 Size: {}", file_name, format_bytes(size));
    if let Some(desc) = description.filter(|d| !d.trim().is_empty()) {
        caption.push_str("\n\n📝 ");
        caption.push_str(desc);
    }
    caption
}
