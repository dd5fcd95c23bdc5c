//! Gemini REST providers for the [`TextModel`] and [`VisionModel`] traits.
//!
//! Both providers speak the `generateContent` endpoint of the Generative
//! Language API directly over HTTPS. Responses are reduced to the first
//! candidate's first text part; retry classification happens here by
//! mapping HTTP status codes and body markers onto
//! [`ProviderError`](crate::error::ProviderError) variants, so the retry
//! layer never needs to understand HTTP.

use crate::error::ProviderError;
use crate::provider::{TextModel, VisionModel};
use async_trait::async_trait;
use base64::Engine as _;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Model used when the caller does not name one.
pub const DEFAULT_MODEL: &str = "gemini-2.0-flash-exp";

const API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";

// ── Wire types ───────────────────────────────────────────────────────────

#[derive(Serialize)]
struct GenerateRequest {
    contents: Vec<Content>,
}

#[derive(Serialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum Part {
    Text {
        text: String,
    },
    InlineData {
        inline_data: InlineData,
    },
}

#[derive(Serialize)]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: CandidateContent,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: String,
}

// ── Shared call path ─────────────────────────────────────────────────────

struct GeminiClient {
    http: reqwest::Client,
    api_key: String,
    model: String,
}

impl GeminiClient {
    fn new(api_key: String, model: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key,
            model,
        }
    }

    async fn generate(&self, parts: Vec<Part>) -> Result<String, ProviderError> {
        let url = format!(
            "{API_BASE}/{}:generateContent?key={}",
            self.model, self.api_key
        );
        let body = GenerateRequest {
            contents: vec![Content { parts }],
        };

        let response = self
            .http
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderError::Api {
                message: format!("request failed: {e}"),
            })?;

        let status = response.status();
        let text = response.text().await.map_err(|e| ProviderError::Api {
            message: format!("failed to read response body: {e}"),
        })?;

        if !status.is_success() {
            return Err(classify_failure(status, &text));
        }

        debug!("model {} responded with {} bytes", self.model, text.len());
        extract_text(&text)
    }
}

/// Map a non-2xx response onto the retry taxonomy.
fn classify_failure(status: StatusCode, body: &str) -> ProviderError {
    if status == StatusCode::TOO_MANY_REQUESTS {
        return ProviderError::RateLimited {
            message: format!("HTTP 429: {}", snippet(body)),
        };
    }
    if body.contains("SERVICE_DISABLED") {
        return ProviderError::ServiceDisabled {
            message: snippet(body),
        };
    }
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return ProviderError::AuthDenied {
            message: format!("HTTP {}: {}", status.as_u16(), snippet(body)),
        };
    }
    ProviderError::Api {
        message: format!("HTTP {}: {}", status.as_u16(), snippet(body)),
    }
}

/// Pull the first candidate's first text part out of the response JSON.
fn extract_text(body: &str) -> Result<String, ProviderError> {
    let parsed: GenerateResponse =
        serde_json::from_str(body).map_err(|e| ProviderError::Api {
            message: format!("unparseable model response: {e}"),
        })?;

    parsed
        .candidates
        .into_iter()
        .next()
        .and_then(|c| c.content.parts.into_iter().next())
        .map(|p| p.text)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| ProviderError::Api {
            message: "model response contained no text candidates".into(),
        })
}

fn snippet(body: &str) -> String {
    body.chars().take(300).collect()
}

// ── Providers ────────────────────────────────────────────────────────────

/// Text-generation provider backed by the Gemini REST API.
pub struct GeminiTextModel {
    client: GeminiClient,
}

impl GeminiTextModel {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::with_model(api_key, DEFAULT_MODEL)
    }

    pub fn with_model(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: GeminiClient::new(api_key.into(), model.into()),
        }
    }
}

#[async_trait]
impl TextModel for GeminiTextModel {
    async fn generate(&self, prompt: &str) -> Result<String, ProviderError> {
        self.client
            .generate(vec![Part::Text {
                text: prompt.to_string(),
            }])
            .await
    }
}

/// Vision provider backed by the same endpoint, with the image attached as
/// inline base64 data.
pub struct GeminiVisionModel {
    client: GeminiClient,
}

impl GeminiVisionModel {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::with_model(api_key, DEFAULT_MODEL)
    }

    pub fn with_model(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: GeminiClient::new(api_key.into(), model.into()),
        }
    }
}

#[async_trait]
impl VisionModel for GeminiVisionModel {
    async fn describe(
        &self,
        image: &[u8],
        mime: &str,
        prompt: &str,
    ) -> Result<String, ProviderError> {
        let encoded = base64::engine::general_purpose::STANDARD.encode(image);
        self.client
            .generate(vec![
                Part::Text {
                    text: prompt.to_string(),
                },
                Part::InlineData {
                    inline_data: InlineData {
                        mime_type: mime.to_string(),
                        data: encoded,
                    },
                },
            ])
            .await
    }
}
