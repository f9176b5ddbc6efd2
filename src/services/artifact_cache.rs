//! Artifact cache: reuse a previously generated summary instead of calling
//! the model again.
//!
//! The cache is a pure optimization: a failed lookup, an unreachable cached
//! blob or a failed write-back never prevents the caller from getting text.
//! Concurrent misses for the same file are not coordinated, so two requests
//! racing on a fresh file may both generate and both persist; lookups then
//! pick the most recent record.

use super::{
    blob_store::BlobError,
    generation::{Action, GenerationAdapter, GenerationError, QuizStructure},
    metadata_store::{MetadataStore, StoreError},
    relay::BlobRelay,
};
use crate::models::{
    artifact::{ArtifactKind, NewArtifact},
    file::StoredFile,
};
use serde_json::json;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, instrument, warn};

#[derive(Debug, Error)]
pub enum CacheError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("could not read source file: {0}")]
    Source(#[from] BlobError),
    #[error(transparent)]
    Generation(#[from] GenerationError),
}

/// Outcome of [`ArtifactCache::get_or_generate`].
#[derive(Debug, Clone)]
pub struct Generated {
    pub text: String,
    pub was_cached: bool,
    /// Record id of the served or newly persisted artifact, if any.
    pub artifact_id: Option<i64>,
}

#[derive(Clone)]
pub struct ArtifactCache {
    store: Arc<dyn MetadataStore>,
    relay: BlobRelay,
    generator: GenerationAdapter,
}

impl ArtifactCache {
    pub fn new(store: Arc<dyn MetadataStore>, relay: BlobRelay, generator: GenerationAdapter) -> Self {
        Self {
            store,
            relay,
            generator,
        }
    }

    pub fn generator(&self) -> &GenerationAdapter {
        &self.generator
    }

    /// Return cached text for `(file_id, action)` when available, otherwise
    /// generate it and persist it on a best-effort basis.
    ///
    /// Only summaries are served from cache; quizzes always regenerate but are
    /// still persisted so they can be fetched later by artifact id.
    #[instrument(skip(self, structure))]
    pub async fn get_or_generate(
        &self,
        file_id: i64,
        action: Action,
        structure: Option<&QuizStructure>,
    ) -> Result<Generated, CacheError> {
        let file = self.store.get_file(file_id).await?;
        let kind = action.kind();

        if kind == ArtifactKind::Summary {
            if let Some(hit) = self.lookup(file_id, kind).await {
                return Ok(hit);
            }
        }

        // Fail fast before pulling the source bytes.
        if !self.generator.is_configured() {
            return Err(GenerationError::NotConfigured.into());
        }

        let source = self.relay.fetch_bytes(&file.blob_handle).await?;
        let mime_type = file.mime_type.as_deref().unwrap_or("application/octet-stream");
        let text = self
            .generator
            .generate(&source, mime_type, action, structure)
            .await?;

        let artifact_id = self.persist(&file, action, structure, &text).await;

        Ok(Generated {
            text,
            was_cached: false,
            artifact_id,
        })
    }

    async fn lookup(&self, file_id: i64, kind: ArtifactKind) -> Option<Generated> {
        let artifact = match self.store.latest_artifact(file_id, kind).await {
            Ok(Some(artifact)) => artifact,
            Ok(None) => return None,
            Err(err) => {
                warn!(error = %err, file_id, "artifact lookup failed; treating as miss");
                return None;
            }
        };

        match self.relay.fetch_text(&artifact.blob_handle).await {
            Some(text) => {
                info!(file_id, artifact_id = artifact.id, "serving cached {}", kind.as_str());
                Some(Generated {
                    text,
                    was_cached: true,
                    artifact_id: Some(artifact.id),
                })
            }
            None => {
                warn!(file_id, artifact_id = artifact.id, "cached artifact unreachable; regenerating");
                None
            }
        }
    }

    /// Upload the text and record it. Failures are logged and swallowed.
    async fn persist(
        &self,
        file: &StoredFile,
        action: Action,
        structure: Option<&QuizStructure>,
        text: &str,
    ) -> Option<i64> {
        let kind = action.kind();
        let name = format!("{}_{}.md", kind.as_str(), file.file_name);
        let caption = format!("🤖 {} of {}", kind.as_str(), file.file_name);

        let uploaded = self.relay.upload_text(text, &name, &caption).await?;

        let artifact = NewArtifact {
            file_id: file.id,
            kind,
            name,
            blob_handle: uploaded.handle,
            chat_id: Some(uploaded.message.chat_id),
            message_id: Some(uploaded.message.message_id),
            word_count: text.split_whitespace().count() as i64,
            metadata: json!({
                "action": action,
                "model": self.generator.model_name(),
                "quiz_structure": structure,
            }),
        };

        match self.store.insert_artifact(artifact).await {
            Ok(saved) => Some(saved.id),
            Err(err) => {
                warn!(error = %err, file_id = file.id, "could not record generated artifact");
                None
            }
        }
    }
}
