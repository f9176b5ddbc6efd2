//! BlobRelay: moves bytes between HTTP clients and the blob store.
//!
//! The relay is stateless: it never caches handles or resolved URLs. Large
//! payloads are streamed chunk by chunk through [`RelayStream`]; only artifact
//! text and generation sources are read fully into memory.

use super::blob_store::{BlobError, BlobResult, BlobStore, BlobUpload, MessageRef, UploadedBlob};
use axum::{
    body::Body,
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::Response,
};
use bytes::Bytes;
use futures::{Stream, StreamExt, stream::BoxStream};
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use reqwest::Client;
use std::{
    io,
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
};
use tracing::{debug, instrument, warn};

pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";
pub const MARKDOWN_CONTENT_TYPE: &str = "text/markdown; charset=utf-8";

/// Upper bound on buffer pre-allocation from an upstream `Content-Length`.
/// Matches the Bot API download limit.
const MAX_PREALLOC_BYTES: u64 = 20 * 1024 * 1024;

fn prealloc_hint(content_length: Option<u64>) -> usize {
    content_length.unwrap_or(0).min(MAX_PREALLOC_BYTES) as usize
}

/// Characters left unescaped in an RFC 5987 `ext-value` (`attr-char`).
const ATTR_CHAR: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'!')
    .remove(b'#')
    .remove(b'$')
    .remove(b'&')
    .remove(b'+')
    .remove(b'-')
    .remove(b'.')
    .remove(b'^')
    .remove(b'_')
    .remove(b'`')
    .remove(b'|')
    .remove(b'~');

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Disposition {
    /// Render in the browser.
    Inline,
    /// Save under the original filename.
    Attachment,
}

/// Response metadata written before the first body byte.
#[derive(Clone, Debug)]
pub struct ResponseHead {
    pub content_type: Option<String>,
    pub disposition: Disposition,
    pub file_name: String,
    pub etag: Option<String>,
}

/// Build a `Content-Disposition` value. Attachments carry the filename as an
/// RFC 5987 `filename*` parameter so non-ASCII names survive.
pub fn content_disposition(disposition: Disposition, file_name: &str) -> HeaderValue {
    match disposition {
        Disposition::Inline => HeaderValue::from_static("inline"),
        Disposition::Attachment => {
            let encoded = utf8_percent_encode(file_name, ATTR_CHAR);
            HeaderValue::from_str(&format!("attachment; filename*=UTF-8''{}", encoded))
                .unwrap_or_else(|_| HeaderValue::from_static("attachment"))
        }
    }
}

/// Upstream body relayed to a client.
///
/// Owns the upstream response: when the client goes away axum drops the body,
/// which drops this stream and closes the upstream connection. An upstream
/// error is passed on once and ends the stream, so the in-flight client
/// response is cut off rather than continued.
pub struct RelayStream {
    inner: BoxStream<'static, reqwest::Result<Bytes>>,
    relayed: u64,
    done: bool,
}

impl RelayStream {
    fn new(inner: BoxStream<'static, reqwest::Result<Bytes>>) -> Self {
        Self {
            inner,
            relayed: 0,
            done: false,
        }
    }
}

impl Stream for RelayStream {
    type Item = io::Result<Bytes>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = &mut *self;
        if this.done {
            return Poll::Ready(None);
        }
        match this.inner.as_mut().poll_next(cx) {
            Poll::Ready(Some(Ok(chunk))) => {
                this.relayed += chunk.len() as u64;
                Poll::Ready(Some(Ok(chunk)))
            }
            Poll::Ready(Some(Err(err))) => {
                this.done = true;
                warn!(relayed = this.relayed, error = %err.without_url(), "upstream stream failed mid-transfer");
                Poll::Ready(Some(Err(io::Error::other("upstream stream failed"))))
            }
            Poll::Ready(None) => {
                this.done = true;
                debug!(relayed = this.relayed, "relay complete");
                Poll::Ready(None)
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

impl Drop for RelayStream {
    fn drop(&mut self) {
        if !self.done {
            debug!(relayed = self.relayed, "client went away; closing upstream");
        }
    }
}

/// A resolved, opened blob ready to be relayed.
pub struct OpenedBlob {
    pub stream: RelayStream,
    pub content_length: Option<u64>,
}

#[derive(Clone)]
pub struct BlobRelay {
    store: Option<Arc<dyn BlobStore>>,
    http: Client,
}

impl BlobRelay {
    /// `store` is `None` when no blob-store credentials were configured; every
    /// operation then reports [`BlobError::NotConfigured`].
    pub fn new(store: Option<Arc<dyn BlobStore>>, http: Client) -> Self {
        Self { store, http }
    }

    pub fn is_configured(&self) -> bool {
        self.store.is_some()
    }

    fn store(&self) -> BlobResult<&Arc<dyn BlobStore>> {
        self.store.as_ref().ok_or(BlobError::NotConfigured)
    }

    /// Resolve a handle to a time-limited direct URL.
    pub async fn resolve_download_url(&self, handle: &str) -> BlobResult<String> {
        self.store()?.resolve_url(handle).await
    }

    /// Resolve and open a streaming read. Fails before any byte is relayed if
    /// the upstream does not answer with a success status.
    pub async fn open(&self, handle: &str) -> BlobResult<OpenedBlob> {
        let url = self.resolve_download_url(handle).await?;
        let response = self.http.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(BlobError::Upstream(format!(
                "blob download answered {}",
                status
            )));
        }
        let content_length = response.content_length();
        Ok(OpenedBlob {
            stream: RelayStream::new(response.bytes_stream().boxed()),
            content_length,
        })
    }

    /// Resolve `handle` and build a streaming response for it.
    ///
    /// All headers are set on the returned response; the body is pulled from
    /// upstream only as the client reads it.
    #[instrument(skip(self, head), fields(file = %head.file_name))]
    pub async fn stream_to_client(&self, handle: &str, head: &ResponseHead) -> BlobResult<Response> {
        let opened = self.open(handle).await?;

        let mut headers = HeaderMap::new();
        let content_type = head.content_type.as_deref().unwrap_or(DEFAULT_CONTENT_TYPE);
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_str(content_type)
                .unwrap_or_else(|_| HeaderValue::from_static(DEFAULT_CONTENT_TYPE)),
        );
        headers.insert(
            header::CONTENT_DISPOSITION,
            content_disposition(head.disposition, &head.file_name),
        );
        if let Some(len) = opened.content_length {
            headers.insert(header::CONTENT_LENGTH, HeaderValue::from(len));
        }
        if let Some(etag) = head.etag.as_ref() {
            if let Ok(value) = HeaderValue::from_str(&format!("\"{}\"", etag)) {
                headers.insert(header::ETAG, value);
            }
        }

        let mut response = Response::new(Body::from_stream(opened.stream));
        *response.status_mut() = StatusCode::OK;
        *response.headers_mut() = headers;
        Ok(response)
    }

    /// Upload caller-supplied bytes. Errors propagate; see [`Self::upload_text`]
    /// for the best-effort variant.
    pub async fn upload(&self, upload: BlobUpload) -> BlobResult<UploadedBlob> {
        self.store()?.upload(upload).await
    }

    /// Upload generated text as a Markdown document. Returns `None` on any
    /// failure; callers use this on paths that must not fail the request.
    pub async fn upload_text(&self, text: &str, name: &str, caption: &str) -> Option<UploadedBlob> {
        let upload = BlobUpload {
            file_name: name.to_string(),
            content_type: Some("text/markdown".into()),
            bytes: Bytes::copy_from_slice(text.as_bytes()),
            caption: caption.to_string(),
        };
        match self.upload(upload).await {
            Ok(uploaded) => Some(uploaded),
            Err(err) => {
                warn!(error = %err, name, "text upload failed");
                None
            }
        }
    }

    /// Read a blob fully into memory.
    pub async fn fetch_bytes(&self, handle: &str) -> BlobResult<Bytes> {
        let mut opened = self.open(handle).await?;
        let mut buf = Vec::with_capacity(prealloc_hint(opened.content_length));
        while let Some(chunk) = opened.stream.next().await {
            let chunk = chunk.map_err(|err| BlobError::Upstream(err.to_string()))?;
            buf.extend_from_slice(&chunk);
        }
        Ok(Bytes::from(buf))
    }

    /// Read a small text blob. Returns `None` on any resolution or read
    /// failure.
    pub async fn fetch_text(&self, handle: &str) -> Option<String> {
        match self.fetch_bytes(handle).await {
            Ok(bytes) => Some(String::from_utf8_lossy(&bytes).into_owned()),
            Err(err) => {
                warn!(error = %err, "could not fetch text blob");
                None
            }
        }
    }

    /// Best-effort release of the message carrying a blob. Returns whether
    /// the release succeeded.
    pub async fn release(&self, message: &MessageRef) -> bool {
        let store = match self.store() {
            Ok(store) => store,
            Err(err) => {
                debug!(error = %err, "skipping blob release");
                return false;
            }
        };
        match store.release(message).await {
            Ok(()) => true,
            Err(err) => {
                warn!(error = %err, message_id = message.message_id, "blob release failed");
                false
            }
        }
    }
}
