//! Generation client trait.

use crate::client::types::{ClientKind, GenerationRequest};
use crate::error::Result;
use crate::image::EncodedImage;
use async_trait::async_trait;

/// A remote capability that turns a prompt (and optional image) into a new image.
///
/// Implementations send exactly one request per call and never retry.
#[async_trait]
pub trait GenerationClient: Send + Sync {
    /// Runs one generation attempt, returning the encoded result unmodified.
    async fn generate(&self, request: &GenerationRequest) -> Result<EncodedImage>;

    /// Returns the kind of this client.
    fn kind(&self) -> ClientKind;

    /// Returns the name of this client for display.
    fn name(&self) -> &str {
        match self.kind() {
            ClientKind::Proxy => "Generation proxy",
            ClientKind::Gemini => "Gemini (Google)",
        }
    }
}

#[async_trait]
impl<T: GenerationClient + ?Sized> GenerationClient for Box<T> {
    async fn generate(&self, request: &GenerationRequest) -> Result<EncodedImage> {
        (**self).generate(request).await
    }

    fn kind(&self) -> ClientKind {
        (**self).kind()
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}
