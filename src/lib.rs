#![warn(missing_docs)]
//! pfpgen - AI profile-picture generation with a daily usage cap.
//!
//! A session takes a prompt and/or a source image, sends one request to a
//! generation backend and keeps the most recent result. A small client-side
//! quota limits how many successful generations a user gets per day.
//!
//! # Quick Start
//!
//! ```no_run
//! use pfpgen::{FileQuotaStore, ProxyClient, QuotaTracker, SessionController};
//!
//! #[tokio::main]
//! async fn main() -> pfpgen::Result<()> {
//!     let client = ProxyClient::builder().build()?;
//!     let quota = QuotaTracker::new(FileQuotaStore::new("quota.json"));
//!     let session = SessionController::new(client, quota);
//!
//!     session.refresh_quota()?;
//!     session.set_prompt("A baby astronaut on mars");
//!     session.generate().await?;
//!     session.download(".")?;
//!     Ok(())
//! }
//! ```
//!
//! # Backends
//!
//! - [`ProxyClient`]: `POST {base}/api/generate` on an HTTP proxy (default)
//! - `GeminiClient`: Google generative-language API, direct (feature `gemini`)
//!
//! # Features
//!
//! - `gemini`: direct Gemini backend
//! - `cli`: the `pfpgen` command-line tool

mod error;

pub mod client;
pub mod config;
pub mod download;
pub mod image;
pub mod quota;
pub mod session;

// Re-export error types at crate root
pub use error::{PfpError, Result};

pub use client::providers::{ProxyClient, ProxyClientBuilder};
pub use client::{ClientKind, GenerationClient, GenerationRequest};
pub use config::Config;
pub use image::{EncodedImage, ImageFormat, MAX_UPLOAD_BYTES};
pub use quota::{
    Clock, FileQuotaStore, FixedClock, MemoryQuotaStore, QuotaRecord, QuotaStore, QuotaTracker,
    SystemClock, DAILY_LIMIT,
};
pub use session::{
    AssetLoader, FsAssetLoader, Phase, SessionController, SessionState, SourceImage,
    BUNDLED_PLACEHOLDER, DEFAULT_PROMPT,
};

#[cfg(feature = "gemini")]
pub use client::providers::{GeminiClient, GeminiClientBuilder, GeminiModel};

/// Builds the client selected by `config.backend`.
pub fn client_from_config(config: &Config) -> Result<Box<dyn GenerationClient>> {
    match config.backend {
        ClientKind::Proxy => Ok(Box::new(
            ProxyClient::builder().base_url(&config.api_url).build()?,
        )),
        ClientKind::Gemini => {
            #[cfg(feature = "gemini")]
            {
                Ok(Box::new(GeminiClient::builder().build()?))
            }
            #[cfg(not(feature = "gemini"))]
            {
                Err(PfpError::BackendNotAvailable("gemini".into()))
            }
        }
    }
}

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::client::{GenerationClient, GenerationRequest};
    pub use crate::error::{PfpError, Result};
    pub use crate::image::EncodedImage;
    pub use crate::quota::{FileQuotaStore, QuotaTracker};
    pub use crate::session::{SessionController, SessionState};
    pub use crate::ProxyClient;

    #[cfg(feature = "gemini")]
    pub use crate::GeminiClient;
}
