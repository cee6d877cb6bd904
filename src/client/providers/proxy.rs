//! HTTP proxy client (`POST {base}/api/generate`).

use crate::client::provider::GenerationClient;
use crate::client::types::{ClientKind, GenerationRequest};
use crate::config::{Config, DEFAULT_API_URL};
use crate::error::{PfpError, Result, GENERIC_REJECTION};
use crate::image::EncodedImage;
use async_trait::async_trait;
use serde::Deserialize;
use std::time::{Duration, Instant};

const GENERATE_PATH: &str = "/api/generate";

/// Builder for ProxyClient.
#[derive(Debug, Clone, Default)]
pub struct ProxyClientBuilder {
    base_url: Option<String>,
    timeout: Option<Duration>,
}

impl ProxyClientBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the base URL. Falls back to [`Config::api_url_from_env`], then the
    /// local development address.
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Sets a transport timeout. Unset means the transport default applies.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Builds the client, resolving the base URL.
    pub fn build(self) -> Result<ProxyClient> {
        let base_url = self
            .base_url
            .map(|url| url.trim().trim_end_matches('/').to_string())
            .filter(|url| !url.is_empty())
            .or_else(Config::api_url_from_env)
            .unwrap_or_else(|| DEFAULT_API_URL.to_string());

        let mut http = reqwest::Client::builder();
        if let Some(timeout) = self.timeout {
            http = http.timeout(timeout);
        }

        Ok(ProxyClient {
            client: http.build()?,
            base_url,
        })
    }
}

/// Client for the generation proxy.
pub struct ProxyClient {
    client: reqwest::Client,
    base_url: String,
}

impl ProxyClient {
    /// Creates a new `ProxyClientBuilder`.
    pub fn builder() -> ProxyClientBuilder {
        ProxyClientBuilder::new()
    }

    /// Returns the resolved base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self) -> String {
        format!("{}{}", self.base_url, GENERATE_PATH)
    }

    /// The body's `error` string is shown to the user exactly as sent.
    fn parse_error(&self, status: u16, text: &str) -> PfpError {
        let message = serde_json::from_str::<ErrorBody>(text)
            .ok()
            .and_then(|body| body.error)
            .filter(|msg| !msg.is_empty())
            .unwrap_or_else(|| GENERIC_REJECTION.to_string());

        tracing::debug!(status, message = %message, "generation rejected");
        PfpError::Rejected(message)
    }
}

#[async_trait]
impl GenerationClient for ProxyClient {
    async fn generate(&self, request: &GenerationRequest) -> Result<EncodedImage> {
        let start = Instant::now();
        let url = self.endpoint();

        tracing::debug!(
            url = %url,
            prompt_len = request.prompt.len(),
            has_image = request.is_edit(),
            "sending generation request"
        );

        let response = self
            .client
            .post(&url)
            .json(request)
            .send()
            .await
            .map_err(PfpError::from_transport)?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(self.parse_error(status.as_u16(), &text));
        }

        let text = response.text().await.map_err(PfpError::from_transport)?;
        let body: SuccessBody = serde_json::from_str(&text)?;
        let result = body
            .result
            .filter(|r| !r.is_empty())
            .ok_or_else(|| PfpError::UnexpectedResponse("no result in response".into()))?;

        tracing::debug!(
            duration_ms = start.elapsed().as_millis() as u64,
            size = result.len(),
            "generation complete"
        );

        Ok(EncodedImage::new(result))
    }

    fn kind(&self) -> ClientKind {
        ClientKind::Proxy
    }
}

#[derive(Debug, Deserialize)]
struct SuccessBody {
    #[serde(default)]
    result: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    error: Option<String>,
}
