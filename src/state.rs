//! Shared request state: the capability objects built once at startup.

use crate::{
    config::AppConfig,
    services::{
        artifact_cache::ArtifactCache,
        blob_store::BlobStore,
        gemini::GeminiClient,
        generation::{GenerationAdapter, GenerativeModel},
        metadata_store::{MetadataStore, SqliteMetadataStore},
        relay::BlobRelay,
        telegram::TelegramBlobStore,
    },
};
use reqwest::Client;
use sqlx::SqlitePool;
use std::{sync::Arc, time::Instant};

/// Cheap to clone; every field is reference counted.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn MetadataStore>,
    pub relay: BlobRelay,
    pub cache: ArtifactCache,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(
        store: Arc<dyn MetadataStore>,
        relay: BlobRelay,
        generator: GenerationAdapter,
    ) -> Self {
        let cache = ArtifactCache::new(store.clone(), relay.clone(), generator);
        Self {
            store,
            relay,
            cache,
            started_at: Instant::now(),
        }
    }

    /// Wire production implementations from configuration. Missing
    /// credentials leave the matching capability unconfigured.
    pub fn from_config(cfg: &AppConfig, db: Arc<SqlitePool>) -> Self {
        let http = Client::new();

        let blob_store = cfg.telegram.as_ref().map(|t| {
            Arc::new(TelegramBlobStore::new(
                http.clone(),
                &t.api_url,
                &t.bot_token,
                &t.chat_id,
            )) as Arc<dyn BlobStore>
        });
        let model = cfg.gemini.as_ref().map(|g| {
            Arc::new(GeminiClient::new(http.clone(), &g.api_url, &g.api_key, &g.model))
                as Arc<dyn GenerativeModel>
        });

        Self::new(
            Arc::new(SqliteMetadataStore::new(db)),
            BlobRelay::new(blob_store, http),
            GenerationAdapter::new(model),
        )
    }

    pub fn generator(&self) -> &GenerationAdapter {
        self.cache.generator()
    }
}
