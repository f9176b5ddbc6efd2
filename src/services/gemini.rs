//! Gemini `generateContent` client.

use super::generation::{GenerativeModel, Prompt, ProviderError};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, error, instrument};

pub const DEFAULT_GEMINI_API_URL: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.0-flash";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<Content>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

/// Gemini REST client for one model.
#[derive(Clone)]
pub struct GeminiClient {
    client: Client,
    api_url: String,
    api_key: String,
    model: String,
}

impl std::fmt::Debug for GeminiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiClient")
            .field("api_url", &self.api_url)
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

impl GeminiClient {
    pub fn new(
        client: Client,
        api_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            client,
            api_url: api_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            model: model.into(),
        }
    }

    fn request_body(prompt: &Prompt) -> Value {
        json!({
            "contents": [{
                "role": "user",
                "parts": [
                    { "text": prompt.instruction },
                    { "inline_data": { "mime_type": prompt.mime_type, "data": prompt.data_base64 } }
                ]
            }]
        })
    }
}

/// Pull the generated text out of a response, turning safety stops and empty
/// answers into provider errors.
fn extract_text(response: GenerateContentResponse) -> Result<String, ProviderError> {
    if let Some(reason) = response.prompt_feedback.and_then(|f| f.block_reason) {
        return Err(ProviderError::new(None, format!("prompt blocked: {}", reason)));
    }

    let candidate = response
        .candidates
        .into_iter()
        .next()
        .ok_or_else(|| ProviderError::new(None, "response contained no candidates"))?;

    let text: String = candidate
        .content
        .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
        .unwrap_or_default();

    match candidate.finish_reason.as_deref() {
        Some(reason @ ("SAFETY" | "PROHIBITED_CONTENT" | "BLOCKLIST" | "SPII")) => Err(
            ProviderError::new(None, format!("response blocked: {}", reason)),
        ),
        _ if text.is_empty() => Err(ProviderError::new(None, "response contained no text")),
        _ => Ok(text),
    }
}

#[async_trait]
impl GenerativeModel for GeminiClient {
    fn model_name(&self) -> &str {
        &self.model
    }

    #[instrument(skip(self, prompt), fields(model = %self.model, mime = %prompt.mime_type))]
    async fn generate(&self, prompt: &Prompt) -> Result<String, ProviderError> {
        let url = format!("{}/v1beta/models/{}:generateContent", self.api_url, self.model);
        debug!("Sending request to Gemini API");

        let response = self
            .client
            .post(url)
            .header("x-goog-api-key", &self.api_key)
            .json(&Self::request_body(prompt))
            .send()
            .await
            .map_err(|e| {
                error!(error = %e, "Failed to send request to Gemini API");
                ProviderError::new(None, e.to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::new(Some(status.as_u16()), body));
        }

        let parsed: GenerateContentResponse = response.json().await.map_err(|e| {
            error!(error = %e, "Failed to parse Gemini response");
            ProviderError::new(Some(status.as_u16()), format!("unparsable response: {}", e))
        })?;

        extract_text(parsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(body: &str) -> GenerateContentResponse {
        serde_json::from_str(body).unwrap()
    }

    #[test]
    fn joins_text_parts() {
        let text = extract_text(parse(
            r##"{"candidates":[{"content":{"parts":[{"text":"# A"},{"text":"\nB"}]},"finishReason":"STOP"}]}"##,
        ))
        .unwrap();
        assert_eq!(text, "# A\nB");
    }

    #[test]
    fn blocked_prompt_is_reported() {
        let err = extract_text(parse(r#"{"promptFeedback":{"blockReason":"SAFETY"}}"#)).unwrap_err();
        assert!(err.message.contains("blocked"));
    }

    #[test]
    fn safety_finish_reason_is_reported() {
        let err = extract_text(parse(
            r#"{"candidates":[{"content":{"parts":[]},"finishReason":"SAFETY"}]}"#,
        ))
        .unwrap_err();
        assert!(err.message.contains("SAFETY"));
    }

    #[test]
    fn request_body_carries_inline_data() {
        let body = GeminiClient::request_body(&Prompt {
            instruction: "do it".into(),
            mime_type: "application/pdf".into(),
            data_base64: "AAAA".into(),
        });
        assert_eq!(body["contents"][0]["parts"][0]["text"], "do it");
        assert_eq!(body["contents"][0]["parts"][1]["inline_data"]["mime_type"], "application/pdf");
        assert_eq!(body["contents"][0]["parts"][1]["inline_data"]["data"], "AAAA");
    }
}
