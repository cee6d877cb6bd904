//! Request types shared by the generation clients.

use crate::image::EncodedImage;
use serde::{Deserialize, Serialize};

/// Which backend a client talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClientKind {
    /// The HTTP proxy exposing `POST /api/generate`.
    #[default]
    Proxy,
    /// Google generative-language API, called directly.
    Gemini,
}

impl std::fmt::Display for ClientKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Proxy => write!(f, "proxy"),
            Self::Gemini => write!(f, "gemini"),
        }
    }
}

impl std::str::FromStr for ClientKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "proxy" => Ok(Self::Proxy),
            "gemini" => Ok(Self::Gemini),
            other => Err(format!("unknown backend: {other}")),
        }
    }
}

/// A single generation attempt as sent over the wire.
///
/// Serialises to `{"prompt": "...", "image": "data:..."}`; the `image` key is
/// omitted entirely when there is no source image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationRequest {
    /// The effective prompt. May be empty at this layer.
    pub prompt: String,
    /// Optional source image as a data URI.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<EncodedImage>,
}

impl GenerationRequest {
    /// Creates a request with the given prompt and no image.
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            image: None,
        }
    }

    /// Attaches a source image.
    pub fn with_image(mut self, image: EncodedImage) -> Self {
        self.image = Some(image);
        self
    }

    /// Returns true if this request transforms an existing image.
    pub fn is_edit(&self) -> bool {
        self.image.is_some()
    }
}
