pub mod artifact_cache;
pub mod blob_store;
pub mod export;
pub mod gemini;
pub mod generation;
pub mod metadata_store;
pub mod relay;
pub mod telegram;
