#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    extract::{Path, State},
    http::{Request, Response, StatusCode, header},
    routing::get,
};
use bytes::Bytes;
use chat_vault::{
    db,
    models::file::{FileCategory, NewFile},
    services::{
        blob_store::{BlobError, BlobResult, BlobStore, BlobUpload, MessageRef, UploadedBlob},
        generation::{GenerationAdapter, GenerativeModel, Prompt, ProviderError},
        metadata_store::{MetadataStore, SqliteMetadataStore},
        relay::BlobRelay,
    },
    state::AppState,
};
use serde_json::Value;
use std::{
    collections::{HashMap, HashSet},
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering},
    },
};
use tokio::net::TcpListener;
use tower::ServiceExt;

pub const TEST_CHAT: &str = "-100test";

// -- Fake blob store ------------------------------------------------------

#[derive(Default)]
struct BlobsInner {
    blobs: Mutex<HashMap<String, Bytes>>,
    broken: Mutex<HashSet<String>>,
    released: Mutex<Vec<MessageRef>>,
    fail_uploads: AtomicBool,
    fail_release: AtomicBool,
    next_id: AtomicI64,
}

/// In-memory blob store whose download URLs are served by a real local HTTP
/// listener, so the relay's streaming path runs end to end.
pub struct FakeBlobStore {
    inner: Arc<BlobsInner>,
    base_url: String,
}

async fn serve_blob(State(inner): State<Arc<BlobsInner>>, Path(handle): Path<String>) -> Response<Body> {
    let blob = inner.blobs.lock().unwrap().get(&handle).cloned();
    match blob {
        Some(bytes) => Response::builder()
            .status(StatusCode::OK)
            .header(header::CONTENT_LENGTH, bytes.len())
            .body(Body::from(bytes))
            .unwrap(),
        None => Response::builder()
            .status(StatusCode::NOT_FOUND)
            .body(Body::empty())
            .unwrap(),
    }
}

impl FakeBlobStore {
    pub async fn start() -> Arc<Self> {
        let inner = Arc::new(BlobsInner::default());
        let router = Router::new()
            .route("/blobs/{handle}", get(serve_blob))
            .with_state(inner.clone());
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        Arc::new(Self {
            inner,
            base_url: format!("http://{}", addr),
        })
    }

    fn next_message(&self) -> i64 {
        self.inner.next_id.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Store bytes directly and return their handle.
    pub fn put(&self, bytes: impl Into<Bytes>) -> String {
        let handle = format!("blob-{}", self.next_message());
        self.inner
            .blobs
            .lock()
            .unwrap()
            .insert(handle.clone(), bytes.into());
        handle
    }

    pub fn get(&self, handle: &str) -> Option<Bytes> {
        self.inner.blobs.lock().unwrap().get(handle).cloned()
    }

    pub fn blob_count(&self) -> usize {
        self.inner.blobs.lock().unwrap().len()
    }

    /// Make `resolve_url` fail for one handle.
    pub fn break_handle(&self, handle: &str) {
        self.inner.broken.lock().unwrap().insert(handle.to_string());
    }

    pub fn fail_uploads(&self, fail: bool) {
        self.inner.fail_uploads.store(fail, Ordering::SeqCst);
    }

    pub fn fail_release(&self, fail: bool) {
        self.inner.fail_release.store(fail, Ordering::SeqCst);
    }

    pub fn released(&self) -> Vec<MessageRef> {
        self.inner.released.lock().unwrap().clone()
    }
}

#[async_trait]
impl BlobStore for FakeBlobStore {
    async fn upload(&self, upload: BlobUpload) -> BlobResult<UploadedBlob> {
        if self.inner.fail_uploads.load(Ordering::SeqCst) {
            return Err(BlobError::Upstream("upload refused".into()));
        }
        let handle = self.put(upload.bytes);
        Ok(UploadedBlob {
            handle,
            message: MessageRef {
                chat_id: TEST_CHAT.into(),
                message_id: self.next_message(),
            },
        })
    }

    async fn resolve_url(&self, handle: &str) -> BlobResult<String> {
        if self.inner.broken.lock().unwrap().contains(handle) {
            return Err(BlobError::Upstream("getFile failed".into()));
        }
        Ok(format!("{}/blobs/{}", self.base_url, handle))
    }

    async fn release(&self, message: &MessageRef) -> BlobResult<()> {
        if self.inner.fail_release.load(Ordering::SeqCst) {
            return Err(BlobError::Upstream("deleteMessage failed".into()));
        }
        self.inner.released.lock().unwrap().push(message.clone());
        Ok(())
    }
}

// -- Fake model -----------------------------------------------------------

pub struct FakeModel {
    reply: Mutex<Result<String, ProviderError>>,
    calls: AtomicUsize,
    prompts: Mutex<Vec<Prompt>>,
}

impl FakeModel {
    pub fn replying(text: &str) -> Arc<Self> {
        Arc::new(Self {
            reply: Mutex::new(Ok(text.to_string())),
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        })
    }

    pub fn failing(status: u16, message: &str) -> Arc<Self> {
        let model = Self::replying("");
        *model.reply.lock().unwrap() = Err(ProviderError::new(Some(status), message));
        model
    }

    pub fn set_reply(&self, text: &str) {
        *self.reply.lock().unwrap() = Ok(text.to_string());
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_prompt(&self) -> Option<Prompt> {
        self.prompts.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl GenerativeModel for FakeModel {
    fn model_name(&self) -> &str {
        "fake-model"
    }

    async fn generate(&self, prompt: &Prompt) -> Result<String, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(prompt.clone());
        self.reply.lock().unwrap().clone()
    }
}

// -- Harness --------------------------------------------------------------

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub blobs: Arc<FakeBlobStore>,
    pub model: Arc<FakeModel>,
}

pub struct Options {
    pub with_blob_store: bool,
    pub with_model: bool,
    pub model: Arc<FakeModel>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            with_blob_store: true,
            with_model: true,
            model: FakeModel::replying("TEXT"),
        }
    }
}

pub async fn spawn_app() -> TestApp {
    spawn_app_with(Options::default()).await
}

pub async fn spawn_app_with(options: Options) -> TestApp {
    let pool = db::connect("sqlite::memory:").await.unwrap();
    db::run_migrations(&pool).await.unwrap();
    let store: Arc<dyn MetadataStore> = Arc::new(SqliteMetadataStore::new(Arc::new(pool)));

    let blobs = FakeBlobStore::start().await;
    let blob_store = options
        .with_blob_store
        .then(|| blobs.clone() as Arc<dyn BlobStore>);
    let model = options
        .with_model
        .then(|| options.model.clone() as Arc<dyn GenerativeModel>);

    let state = AppState::new(
        store,
        BlobRelay::new(blob_store, reqwest::Client::new()),
        GenerationAdapter::new(model),
    );

    TestApp {
        router: chat_vault::app(state.clone()),
        state,
        blobs,
        model: options.model,
    }
}

impl TestApp {
    /// Put bytes in the blob store and record them, bypassing `/upload`.
    pub async fn seed_file(&self, name: &str, mime: &str, bytes: &'static [u8]) -> i64 {
        let handle = self.blobs.put(Bytes::from_static(bytes));
        let saved = self
            .state
            .store
            .insert_file(NewFile {
                file_name: name.into(),
                file_type: FileCategory::from_mime(Some(mime)),
                file_size: bytes.len() as i64,
                mime_type: Some(mime.into()),
                blob_handle: handle,
                chat_id: Some(TEST_CHAT.into()),
                message_id: Some(999),
                description: None,
                checksum: Some(format!("{:x}", md5_digest(bytes))),
            })
            .await
            .unwrap();
        saved.id
    }

    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.router.clone().oneshot(request).await.unwrap()
    }

    pub async fn get(&self, uri: &str) -> Response<Body> {
        self.send(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
    }

    pub async fn delete(&self, uri: &str) -> Response<Body> {
        self.send(
            Request::builder()
                .method("DELETE")
                .uri(uri)
                .body(Body::empty())
                .unwrap(),
        )
        .await
    }

    pub async fn post_json(&self, uri: &str, body: Value) -> Response<Body> {
        self.send(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
    }

    /// `POST /upload` with a hand-built multipart body.
    pub async fn upload(
        &self,
        file: Option<(&str, &str, &[u8])>,
        description: Option<&str>,
    ) -> Response<Body> {
        const BOUNDARY: &str = "----chatvaulttestboundary";
        let mut body = Vec::new();
        if let Some(desc) = description {
            body.extend_from_slice(
                format!(
                    "--{}\r\nContent-Disposition: form-data; name=\"description\"\r\n\r\n{}\r\n",
                    BOUNDARY, desc
                )
                .as_bytes(),
            );
        }
        if let Some((name, mime, bytes)) = file {
            body.extend_from_slice(
                format!(
                    "--{}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{}\"\r\nContent-Type: {}\r\n\r\n",
                    BOUNDARY, name, mime
                )
                .as_bytes(),
            );
            body.extend_from_slice(bytes);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());

        self.send(
            Request::builder()
                .method("POST")
                .uri("/upload")
                .header(
                    header::CONTENT_TYPE,
                    format!("multipart/form-data; boundary={}", BOUNDARY),
                )
                .body(Body::from(body))
                .unwrap(),
        )
        .await
    }
}

fn md5_digest(bytes: &[u8]) -> md5::Digest {
    md5::compute(bytes)
}

pub async fn body_bytes(response: Response<Body>) -> Bytes {
    axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap()
}

pub async fn body_json(response: Response<Body>) -> Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}
