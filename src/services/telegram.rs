//! Telegram Bot API used as a blob store.
//!
//! - `sendDocument` uploads bytes; the returned `document.file_id` is the handle.
//! - `getFile` resolves a handle to a `file_path` under `/file/bot<token>/`.
//! - `deleteMessage` releases the message carrying the document.
//!
//! Bot API downloads are limited to 20 MB; larger files upload fine but fail
//! to resolve, which surfaces as an upstream error.

use super::{
    blob_store::{BlobError, BlobResult, BlobStore, BlobUpload, MessageRef, UploadedBlob},
    relay::DEFAULT_CONTENT_TYPE,
};
use async_trait::async_trait;
use reqwest::{Client, multipart};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, instrument, warn};

pub const DEFAULT_TELEGRAM_API_URL: &str = "https://api.telegram.org";

/// Envelope every Bot API method answers with.
#[derive(Debug, Deserialize)]
struct TelegramResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
    error_code: Option<i64>,
}

impl<T> TelegramResponse<T> {
    fn into_result(self, method: &str) -> BlobResult<T> {
        match (self.ok, self.result) {
            (true, Some(result)) => Ok(result),
            _ => Err(BlobError::Upstream(format!(
                "{} failed ({}): {}",
                method,
                self.error_code.unwrap_or_default(),
                self.description.unwrap_or_else(|| "no description".into())
            ))),
        }
    }
}

#[derive(Debug, Deserialize)]
struct SentMessage {
    message_id: i64,
    document: Option<Document>,
}

#[derive(Debug, Deserialize)]
struct Document {
    file_id: String,
}

#[derive(Debug, Deserialize)]
struct FileInfo {
    file_path: Option<String>,
}

/// Bot API client bound to a single chat.
#[derive(Clone)]
pub struct TelegramBlobStore {
    client: Client,
    api_url: String,
    token: String,
    chat_id: String,
}

impl std::fmt::Debug for TelegramBlobStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramBlobStore")
            .field("api_url", &self.api_url)
            .field("chat_id", &self.chat_id)
            .finish_non_exhaustive()
    }
}

impl TelegramBlobStore {
    pub fn new(
        client: Client,
        api_url: impl Into<String>,
        token: impl Into<String>,
        chat_id: impl Into<String>,
    ) -> Self {
        Self {
            client,
            api_url: api_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
            chat_id: chat_id.into(),
        }
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.api_url, self.token, method)
    }
}

#[async_trait]
impl BlobStore for TelegramBlobStore {
    #[instrument(skip(self, upload), fields(file = %upload.file_name, size = upload.bytes.len()))]
    async fn upload(&self, upload: BlobUpload) -> BlobResult<UploadedBlob> {
        let len = upload.bytes.len() as u64;
        let build_part = |mime: &str| {
            multipart::Part::stream_with_length(upload.bytes.clone(), len)
                .file_name(upload.file_name.clone())
                .mime_str(mime)
        };
        let part = match upload.content_type.as_deref().map(build_part) {
            Some(Ok(part)) => part,
            Some(Err(err)) => {
                warn!(error = %err.without_url(), "unparsable content type; sending as octet-stream");
                build_part(DEFAULT_CONTENT_TYPE)?
            }
            None => build_part(DEFAULT_CONTENT_TYPE)?,
        };
        let form = multipart::Form::new()
            .text("chat_id", self.chat_id.clone())
            .text("caption", upload.caption)
            .part("document", part);

        let response: TelegramResponse<SentMessage> = self
            .client
            .post(self.method_url("sendDocument"))
            .multipart(form)
            .send()
            .await?
            .json()
            .await?;
        let sent = response.into_result("sendDocument")?;

        let document = sent
            .document
            .ok_or_else(|| BlobError::Upstream("sendDocument returned no document".into()))?;
        debug!(message_id = sent.message_id, "document stored");

        Ok(UploadedBlob {
            handle: document.file_id,
            message: MessageRef {
                chat_id: self.chat_id.clone(),
                message_id: sent.message_id,
            },
        })
    }

    async fn resolve_url(&self, handle: &str) -> BlobResult<String> {
        let response: TelegramResponse<FileInfo> = self
            .client
            .get(self.method_url("getFile"))
            .query(&[("file_id", handle)])
            .send()
            .await?
            .json()
            .await?;
        let file_path = response
            .into_result("getFile")?
            .file_path
            .ok_or_else(|| BlobError::Upstream("getFile returned no file_path".into()))?;

        Ok(format!("{}/file/bot{}/{}", self.api_url, self.token, file_path))
    }

    async fn release(&self, message: &MessageRef) -> BlobResult<()> {
        let response: TelegramResponse<bool> = self
            .client
            .post(self.method_url("deleteMessage"))
            .json(&json!({
                "chat_id": message.chat_id,
                "message_id": message.message_id,
            }))
            .send()
            .await?
            .json()
            .await?;

        match response.into_result("deleteMessage") {
            Ok(true) => Ok(()),
            Ok(false) => Err(BlobError::Upstream("deleteMessage returned false".into())),
            Err(err) => {
                warn!(message_id = message.message_id, "telegram refused to delete message");
                Err(err)
            }
        }
    }
}
