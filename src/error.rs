//! Error types for profile-picture generation.

/// Message used when the remote side rejects a request without saying why.
pub const GENERIC_REJECTION: &str = "Failed to generate image";

/// Errors that can occur while preparing, sending or recording a generation.
///
/// The `Display` text of the user-facing variants is the message shown to the
/// user as-is.
#[derive(Debug, thiserror::Error)]
pub enum PfpError {
    /// The daily allowance is used up. No request was sent.
    #[error("You have reached your daily limit of {limit} generations. Please come back tomorrow!")]
    QuotaExhausted {
        /// Attempts allowed per day.
        limit: u32,
    },

    /// Neither a prompt nor a source image was supplied.
    #[error("Please write a prompt or upload an image to start.")]
    InvalidInput,

    /// Selected file exceeds the upload ceiling.
    #[error("Image size too large. Please upload an image under {}MB.", .limit / (1024 * 1024))]
    FileTooLarge {
        /// Size of the rejected file in bytes.
        size: u64,
        /// Upload ceiling in bytes.
        limit: u64,
    },

    /// The remote endpoint answered with a non-success status.
    #[error("{0}")]
    Rejected(String),

    /// The remote endpoint could not be reached at all.
    #[error("Cannot connect to server. If testing on mobile, ensure you are using your computer's IP address, not localhost.")]
    Connectivity,

    /// The bundled placeholder image could not be loaded or encoded.
    #[error("Failed to process default image")]
    AssetPreparation(String),

    /// Another generation is already in flight for this session.
    #[error("A generation is already in progress. Please wait for it to finish.")]
    Busy,

    /// The endpoint reported success but the body held no image.
    #[error("unexpected response: {0}")]
    UnexpectedResponse(String),

    /// API key missing or invalid (direct backend only).
    #[error("authentication failed: {0}")]
    Auth(String),

    /// Backend not available (feature not enabled).
    #[error("backend not available: {0}")]
    BackendNotAvailable(String),

    /// Failed to decode an encoded payload.
    #[error("failed to decode: {0}")]
    Decode(String),

    /// The persisted quota record could not be read or written.
    #[error("quota storage error: {0}")]
    Storage(String),

    /// Network or HTTP error that is not a plain connection failure.
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// I/O error (e.g., reading an upload, writing a download).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl PfpError {
    /// Returns true for the failure kinds the user is expected to see and act on.
    pub fn is_user_facing(&self) -> bool {
        matches!(
            self,
            Self::QuotaExhausted { .. }
                | Self::InvalidInput
                | Self::FileTooLarge { .. }
                | Self::Rejected(_)
                | Self::Connectivity
                | Self::AssetPreparation(_)
                | Self::Busy
        )
    }

    /// Returns true if the failure happened before anything was sent.
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            Self::QuotaExhausted { .. } | Self::InvalidInput | Self::FileTooLarge { .. } | Self::Busy
        )
    }

    /// Maps a transport error, singling out failures to reach the endpoint.
    pub(crate) fn from_transport(err: reqwest::Error) -> Self {
        if err.is_connect() {
            tracing::debug!("endpoint unreachable: {err}");
            Self::Connectivity
        } else {
            Self::Network(err)
        }
    }
}

/// Result type alias for generation operations.
pub type Result<T> = std::result::Result<T, PfpError>;

/// Trims a Google API error body so it can be shown to a user.
///
/// Collapses whitespace and cuts overly long bodies (HTML error pages from
/// reverse proxies, stack traces) down to a readable length. Proxy messages
/// are never passed through here.
#[cfg(feature = "gemini")]
pub(crate) fn sanitize_error_message(text: &str) -> String {
    const MAX_CHARS: usize = 300;

    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.chars().count() <= MAX_CHARS {
        return collapsed;
    }
    let truncated: String = collapsed.chars().take(MAX_CHARS).collect();
    format!("{truncated}...")
}
