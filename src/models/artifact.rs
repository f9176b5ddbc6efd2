//! AI-generated text tied to exactly one source file.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, types::Json};

/// The kind of derived artifact.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum ArtifactKind {
    Summary,
    Quiz,
}

impl ArtifactKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Summary => "summary",
            Self::Quiz => "quiz",
        }
    }
}

/// A generated summary or quiz.
///
/// The text itself is stored as a blob through the relay; this record only
/// keeps its handle plus a few descriptive fields. Records are immutable.
#[derive(Serialize, Deserialize, Clone, FromRow, Debug)]
pub struct DerivedArtifact {
    pub id: i64,

    /// Source file this artifact was generated from.
    pub file_id: i64,

    pub kind: ArtifactKind,

    /// Human-readable name, e.g. `summary_report.pdf.md`.
    pub name: String,

    pub blob_handle: String,
    pub chat_id: Option<String>,
    pub message_id: Option<i64>,

    pub word_count: i64,

    /// Generation parameters (model, action, quiz structure).
    pub metadata: Json<serde_json::Value>,

    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug)]
pub struct NewArtifact {
    pub file_id: i64,
    pub kind: ArtifactKind,
    pub name: String,
    pub blob_handle: String,
    pub chat_id: Option<String>,
    pub message_id: Option<i64>,
    pub word_count: i64,
    pub metadata: serde_json::Value,
}
