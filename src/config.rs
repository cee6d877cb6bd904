//! Runtime configuration, resolved from the environment.

use crate::client::ClientKind;
use std::path::PathBuf;

/// Base URL used when no proxy address is configured.
pub const DEFAULT_API_URL: &str = "http://localhost:3000";

/// Placeholder file looked up under `PFP_ASSET_ROOT` when only the root is set.
pub const DEFAULT_IMAGE: &str = "assets/default-baby.png";

/// Application configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Proxy base URL, without a trailing slash.
    pub api_url: String,
    /// Backend used for generation.
    pub backend: ClientKind,
    /// File holding the persisted quota record.
    pub quota_file: PathBuf,
    /// Placeholder file, relative to `asset_root` unless absolute. `None`
    /// selects the image compiled into the crate.
    pub default_image: Option<PathBuf>,
    /// Directory bundled assets are resolved against.
    pub asset_root: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            backend: ClientKind::Proxy,
            quota_file: Self::default_quota_file(),
            default_image: None,
            asset_root: PathBuf::from("."),
        }
    }
}

impl Config {
    /// Builds the configuration from `PFP_*` environment variables.
    ///
    /// - `PFP_API_URL` (or `VITE_API_URL`): proxy base URL
    /// - `PFP_BACKEND`: `proxy` or `gemini`
    /// - `PFP_QUOTA_FILE`: quota record location
    /// - `PFP_DEFAULT_IMAGE`: placeholder source image file
    /// - `PFP_ASSET_ROOT`: directory for asset files. Setting only the root
    ///   selects [`DEFAULT_IMAGE`] inside it.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };
        let defaults = Self::default();

        let backend = match get("PFP_BACKEND").map(|raw| raw.parse::<ClientKind>()) {
            Some(Ok(kind)) => kind,
            Some(Err(e)) => {
                tracing::warn!("{e}, using {}", defaults.backend);
                defaults.backend
            }
            None => defaults.backend,
        };

        let asset_root = get("PFP_ASSET_ROOT").map(PathBuf::from);
        let default_image = get("PFP_DEFAULT_IMAGE")
            .map(PathBuf::from)
            .or_else(|| asset_root.as_ref().map(|_| PathBuf::from(DEFAULT_IMAGE)));

        Self {
            api_url: Self::api_url_from(&get).unwrap_or(defaults.api_url),
            backend,
            quota_file: get("PFP_QUOTA_FILE")
                .map(PathBuf::from)
                .unwrap_or(defaults.quota_file),
            default_image,
            asset_root: asset_root.unwrap_or(defaults.asset_root),
        }
    }

    /// Resolves the proxy base URL from `PFP_API_URL`, then `VITE_API_URL`.
    ///
    /// Returns `None` when neither is set to a non-blank value.
    pub fn api_url_from_env() -> Option<String> {
        Self::api_url_from(&|key: &str| {
            std::env::var(key)
                .ok()
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        })
    }

    fn api_url_from(get: &dyn Fn(&str) -> Option<String>) -> Option<String> {
        get("PFP_API_URL")
            .or_else(|| get("VITE_API_URL"))
            .map(|url| url.trim_end_matches('/').to_string())
    }

    /// Returns the default quota file under the platform data directory.
    pub fn default_quota_file() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("pfpgen")
            .join("quota.json")
    }
}
