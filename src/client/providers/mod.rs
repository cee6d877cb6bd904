//! Generation client implementations.

#[cfg(feature = "gemini")]
mod gemini;
mod proxy;

#[cfg(feature = "gemini")]
pub use gemini::{GeminiClient, GeminiClientBuilder, GeminiModel};

pub use proxy::{ProxyClient, ProxyClientBuilder};
