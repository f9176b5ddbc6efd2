//! AI generation adapter.
//!
//! Turns `(file bytes, MIME type, action)` into generated Markdown through a
//! [`GenerativeModel`], and folds whatever the provider reports into the small
//! [`GenerationError`] taxonomy. Provider text is logged, never returned.

use crate::models::artifact::ArtifactKind;
use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose};
use serde::{Deserialize, Serialize};
use std::{fmt::Write as _, sync::Arc};
use thiserror::Error;
use tracing::{info, instrument, warn};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum GenerationError {
    #[error("AI generation is not configured")]
    NotConfigured,
    #[error("the AI provider rejected this file")]
    UnsupportedInput,
    #[error("the AI provider is rate limiting requests")]
    RateLimited,
    #[error("the AI provider blocked this content")]
    ContentBlocked,
    #[error("AI provider request failed: {0}")]
    Upstream(String),
}

/// Raw failure reported by a provider, before classification.
#[derive(Debug, Clone)]
pub struct ProviderError {
    /// HTTP status when the provider answered at all.
    pub status: Option<u16>,
    pub message: String,
}

impl ProviderError {
    pub fn new(status: Option<u16>, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}

/// What the caller asked for.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Summarize,
    Quiz,
}

impl Action {
    pub fn kind(&self) -> ArtifactKind {
        match self {
            Self::Summarize => ArtifactKind::Summary,
            Self::Quiz => ArtifactKind::Quiz,
        }
    }
}

/// One block of a caller-defined quiz, e.g. five multiple-choice questions
/// worth two points each.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct QuizSection {
    #[serde(rename = "type")]
    pub question_type: String,
    pub count: u32,
    #[serde(default)]
    pub score: f64,
}

/// Per-question breakdown that replaces the default quiz plan.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Default)]
#[serde(transparent)]
pub struct QuizStructure(pub Vec<QuizSection>);

/// Upper bound on the questions a custom quiz may ask for.
pub const MAX_QUIZ_QUESTIONS: u64 = 200;

impl QuizStructure {
    pub fn is_empty(&self) -> bool {
        self.0.iter().all(|s| s.count == 0)
    }

    /// Total number of questions requested, saturating instead of wrapping.
    pub fn total_questions(&self) -> u64 {
        self.0
            .iter()
            .fold(0u64, |acc, s| acc.saturating_add(u64::from(s.count)))
    }

    /// Reject plans no model could reasonably follow.
    pub fn validate(&self) -> Result<(), String> {
        let total = self.total_questions();
        if total > MAX_QUIZ_QUESTIONS {
            return Err(format!(
                "quizStructure asks for {} questions; at most {} are allowed",
                total, MAX_QUIZ_QUESTIONS
            ));
        }
        if let Some(section) = self.0.iter().find(|s| !s.score.is_finite() || s.score < 0.0) {
            return Err(format!(
                "quizStructure score for `{}` must be a non-negative number",
                section.question_type
            ));
        }
        Ok(())
    }
}

/// A single stateless multimodal request.
#[derive(Clone, Debug)]
pub struct Prompt {
    pub instruction: String,
    pub mime_type: String,
    /// File bytes, standard base64.
    pub data_base64: String,
}

#[async_trait]
pub trait GenerativeModel: Send + Sync {
    fn model_name(&self) -> &str;

    async fn generate(&self, prompt: &Prompt) -> Result<String, ProviderError>;
}

const SUMMARY_INSTRUCTION: &str = "\
You are an expert study assistant. Read the attached document and write a \
structured report in Markdown, in the same language as the document.

Use exactly these sections:
# Title
## Overview
A short paragraph describing what the document is about.
## Key Points
A bulleted list of the most important ideas.
## Details
The main arguments, definitions, formulas or figures, grouped under ### sub-headings.
## Conclusion
The takeaways a student should remember.";

const DEFAULT_QUIZ_INSTRUCTION: &str = "\
You are an expert examiner. Read the attached document and write a \
multiple-choice quiz in Markdown, in the same language as the document.

Write 10 questions. Number each question, give exactly four options labelled \
A) to D), and make exactly one option correct. After all questions add a \
section `## Answer Key` listing the correct letter for every question with a \
one-line explanation.";

/// Build the instruction for `action`. A non-empty `structure` replaces the
/// default quiz plan; it is ignored for summaries.
pub fn build_instruction(action: Action, structure: Option<&QuizStructure>) -> String {
    match (action, structure.filter(|s| !s.is_empty())) {
        (Action::Summarize, _) => SUMMARY_INSTRUCTION.to_string(),
        (Action::Quiz, None) => DEFAULT_QUIZ_INSTRUCTION.to_string(),
        (Action::Quiz, Some(structure)) => {
            let mut out = String::from(
                "You are an expert examiner. Read the attached document and write a quiz \
                 in Markdown, in the same language as the document.\n\n\
                 Follow this structure exactly, in order:\n",
            );
            let mut total_score = 0.0;
            for (i, section) in structure.0.iter().filter(|s| s.count > 0).enumerate() {
                let _ = writeln!(
                    out,
                    "{}. {} question(s) of type \"{}\", {} point(s) each",
                    i + 1,
                    section.count,
                    section.question_type,
                    section.score
                );
                total_score += section.score * f64::from(section.count);
            }
            let _ = write!(
                out,
                "\nThat is {} questions for a total of {} points. Put each section under its own \
                 ## heading showing the points per question. Number the questions continuously. \
                 After all questions add a section `## Answer Key` with the correct answer for \
                 every question.",
                structure.total_questions(),
                total_score
            );
            out
        }
    }
}

/// Map a provider failure to exactly one category. A rejected credential
/// counts as missing configuration.
pub fn classify(err: &ProviderError) -> GenerationError {
    let message = err.message.to_ascii_lowercase();
    let has = |needle: &str| message.contains(needle);

    if has("api key not valid") || has("api_key_invalid") {
        GenerationError::NotConfigured
    } else if err.status == Some(429) || has("resource_exhausted") || has("quota") || has("rate limit") {
        GenerationError::RateLimited
    } else if has("safety") || has("blocked") || has("blockreason") || has("prohibited_content") {
        GenerationError::ContentBlocked
    } else if err.status == Some(400)
        || has("invalid_argument")
        || has("unsupported mime")
        || has("failed_precondition")
    {
        GenerationError::UnsupportedInput
    } else {
        GenerationError::Upstream(match err.status {
            Some(status) => format!("status {}: {}", status, err.message),
            None => err.message.clone(),
        })
    }
}

/// Prompt assembly plus error normalization in front of a model.
#[derive(Clone)]
pub struct GenerationAdapter {
    model: Option<Arc<dyn GenerativeModel>>,
}

impl GenerationAdapter {
    /// `model` is `None` when no credential was configured.
    pub fn new(model: Option<Arc<dyn GenerativeModel>>) -> Self {
        Self { model }
    }

    pub fn is_configured(&self) -> bool {
        self.model.is_some()
    }

    pub fn model_name(&self) -> Option<&str> {
        self.model.as_deref().map(|m| m.model_name())
    }

    /// Generate text for `action` from the given file. The model output is
    /// returned unmodified.
    #[instrument(skip(self, file_bytes, structure), fields(size = file_bytes.len()))]
    pub async fn generate(
        &self,
        file_bytes: &[u8],
        mime_type: &str,
        action: Action,
        structure: Option<&QuizStructure>,
    ) -> Result<String, GenerationError> {
        let model = self.model.as_ref().ok_or(GenerationError::NotConfigured)?;

        let prompt = Prompt {
            instruction: build_instruction(action, structure),
            mime_type: mime_type.to_string(),
            data_base64: general_purpose::STANDARD.encode(file_bytes),
        };

        match model.generate(&prompt).await {
            Ok(text) => {
                info!(model = model.model_name(), chars = text.len(), "generation complete");
                Ok(text)
            }
            Err(err) => {
                let category = classify(&err);
                warn!(
                    model = model.model_name(),
                    status = ?err.status,
                    provider_message = %err.message,
                    category = ?category,
                    "generation failed"
                );
                Err(category)
            }
        }
    }
}
