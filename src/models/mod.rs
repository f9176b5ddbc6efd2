//! Core data models for the file vault.
//!
//! Records map to SQLite rows via `sqlx::FromRow` and serialize as JSON via
//! `serde`. Payload bytes never live here; records only carry the opaque blob
//! handle issued by the chat-backed blob store.

pub mod artifact;
pub mod file;
pub mod stats;
