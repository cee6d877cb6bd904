//! Gemini (Google) client, calling the generative-language API directly.

use crate::client::provider::GenerationClient;
use crate::client::types::{ClientKind, GenerationRequest};
use crate::error::{sanitize_error_message, PfpError, Result};
use crate::image::EncodedImage;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Instant;

const API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Gemini image model variants.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum GeminiModel {
    /// Nano Banana - Gemini 2.5 Flash Image.
    #[default]
    NanoBanana,
}

impl GeminiModel {
    /// Returns the API model identifier.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NanoBanana => "gemini-2.5-flash-image",
        }
    }
}

/// Builder for GeminiClient.
#[derive(Debug, Clone, Default)]
pub struct GeminiClientBuilder {
    api_key: Option<String>,
    model: GeminiModel,
    api_base: Option<String>,
}

impl GeminiClientBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the API key. Falls back to `GOOGLE_API_KEY`, then `API_KEY`.
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Sets the Gemini model variant.
    pub fn model(mut self, model: GeminiModel) -> Self {
        self.model = model;
        self
    }

    /// Overrides the API base URL.
    pub fn api_base(mut self, url: impl Into<String>) -> Self {
        self.api_base = Some(url.into());
        self
    }

    /// Builds the client, resolving the API key.
    pub fn build(self) -> Result<GeminiClient> {
        let api_key = self
            .api_key
            .or_else(|| std::env::var("GOOGLE_API_KEY").ok())
            .or_else(|| std::env::var("API_KEY").ok())
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| {
                PfpError::Auth("GOOGLE_API_KEY not set and no API key provided".into())
            })?;

        Ok(GeminiClient {
            client: reqwest::Client::new(),
            api_key,
            model: self.model,
            api_base: self
                .api_base
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or_else(|| API_BASE.to_string()),
        })
    }
}

/// Gemini image generation client.
pub struct GeminiClient {
    client: reqwest::Client,
    api_key: String,
    model: GeminiModel,
    api_base: String,
}

impl GeminiClient {
    /// Creates a new `GeminiClientBuilder`.
    pub fn builder() -> GeminiClientBuilder {
        GeminiClientBuilder::new()
    }

    fn parse_error(&self, status: u16, text: &str) -> PfpError {
        if status == 401 || status == 403 {
            return PfpError::Auth(sanitize_error_message(text));
        }
        let message = serde_json::from_str::<GeminiErrorEnvelope>(text)
            .ok()
            .and_then(|envelope| envelope.error.message)
            .map(|msg| sanitize_error_message(&msg))
            .filter(|msg| !msg.is_empty())
            .unwrap_or_else(|| crate::error::GENERIC_REJECTION.to_string());
        PfpError::Rejected(message)
    }
}

#[async_trait]
impl GenerationClient for GeminiClient {
    async fn generate(&self, request: &GenerationRequest) -> Result<EncodedImage> {
        let start = Instant::now();
        let url = format!(
            "{}/models/{}:generateContent",
            self.api_base,
            self.model.as_str()
        );

        let body = GeminiRequest::from_generation_request(request);

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(PfpError::from_transport)?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(self.parse_error(status.as_u16(), &text));
        }

        let gemini_response: GeminiResponse = response.json().await?;
        let image = gemini_response.into_image()?;

        tracing::debug!(
            model = self.model.as_str(),
            duration_ms = start.elapsed().as_millis() as u64,
            "gemini generation complete"
        );
        Ok(image)
    }

    fn kind(&self) -> ClientKind {
        ClientKind::Gemini
    }
}

// Request/Response types
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: GeminiContent,
}

#[derive(Debug, Serialize)]
struct GeminiContent {
    parts: Vec<GeminiRequestPart>,
}

/// A part in a Gemini request - can be text or inline image data.
#[derive(Debug, Serialize)]
#[serde(untagged)]
enum GeminiRequestPart {
    Text {
        text: String,
    },
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: InlineData,
    },
}

impl GeminiRequest {
    fn from_generation_request(req: &GenerationRequest) -> Self {
        let mut parts = Vec::new();

        // Source image goes first, the instruction after it
        if let Some(ref image) = req.image {
            parts.push(GeminiRequestPart::InlineData {
                inline_data: InlineData {
                    mime_type: image.mime_type().unwrap_or("image/jpeg").to_string(),
                    data: image.base64_body().to_string(),
                },
            });
        }

        parts.push(GeminiRequestPart::Text {
            text: req.prompt.clone(),
        });

        Self {
            contents: GeminiContent { parts },
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
}

impl GeminiResponse {
    fn into_image(self) -> Result<EncodedImage> {
        if let Some(reason) = self.prompt_feedback.and_then(|f| f.block_reason) {
            return Err(PfpError::Rejected(format!("Prompt blocked: {reason}")));
        }

        self.candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .and_then(|content| content.parts.into_iter().find_map(|p| p.inline_data))
            .filter(|inline| !inline.data.is_empty())
            .map(|inline| {
                let mime = if inline.mime_type.is_empty() {
                    "image/png"
                } else {
                    inline.mime_type.as_str()
                };
                EncodedImage::new(format!("data:{};base64,{}", mime, inline.data))
            })
            .ok_or_else(|| PfpError::UnexpectedResponse("No image generated.".into()))
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiCandidate {
    #[serde(default)]
    content: Option<GeminiContentResponse>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeminiContentResponse {
    #[serde(default)]
    parts: Vec<GeminiPartResponse>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiPartResponse {
    #[serde(default)]
    inline_data: Option<InlineData>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    #[serde(default)]
    mime_type: String,
    data: String,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorEnvelope {
    error: GeminiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorDetail {
    #[serde(default)]
    message: Option<String>,
}
