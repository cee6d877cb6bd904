//! Generation session controller.
//!
//! Owns the state of one user session (source image, prompt, loading flag,
//! last error, last result, remaining allowance) and runs generation attempts
//! against a [`GenerationClient`]. State is published through a
//! [`tokio::sync::watch`] channel; front ends read it and call the intent
//! methods, never mutate it directly.
//!
//! An attempt moves through `Validating → (Rejected | Preparing) → Requesting
//! → (Succeeded | Failed)` and always settles back to `Idle`. Quota is only
//! consumed after a confirmed success.

use crate::client::{GenerationClient, GenerationRequest};
use crate::config::Config;
use crate::download;
use crate::error::{PfpError, Result};
use crate::image::{self, EncodedImage, ImageFormat};
use crate::quota::QuotaTracker;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::watch;

/// Prompt sent when the user supplied an image but no text.
pub const DEFAULT_PROMPT: &str = "Make this into a cute 3D baby character style pfp";

/// Placeholder source image compiled into the crate.
pub const BUNDLED_PLACEHOLDER: &[u8] = include_bytes!("../assets/default-baby.png");

/// Where the source image for the next attempt comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceImage {
    /// The placeholder compiled into the crate ([`BUNDLED_PLACEHOLDER`]).
    Bundled,
    /// An asset on disk, loaded and encoded only when an attempt needs it.
    Asset(PathBuf),
    /// An uploaded image, already encoded.
    Encoded(EncodedImage),
}

/// Lifecycle phase of the current attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    /// No attempt in flight.
    #[default]
    Idle,
    /// Checking quota and inputs.
    Validating,
    /// Preconditions failed; nothing was sent.
    Rejected,
    /// Substituting the default prompt and encoding the source image.
    Preparing,
    /// Waiting for the remote exchange.
    Requesting,
    /// Result stored and quota consumed.
    Succeeded,
    /// The attempt failed after validation.
    Failed,
}

/// Snapshot of a session as seen by the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionState {
    /// Phase of the current attempt.
    pub phase: Phase,
    /// Selected source image, if any.
    pub source: Option<SourceImage>,
    /// Prompt text as typed.
    pub prompt: String,
    /// True while an attempt is preparing or requesting.
    pub loading: bool,
    /// Message from the last failed intent.
    pub error: Option<String>,
    /// Most recent generated image.
    pub result: Option<EncodedImage>,
    /// Generations left today.
    pub remaining: u32,
}

/// Loads bundled assets such as the placeholder source image.
#[async_trait]
pub trait AssetLoader: Send + Sync {
    /// Returns the raw bytes of the asset at `path`.
    async fn load(&self, path: &Path) -> Result<Vec<u8>>;
}

/// Loads assets from a directory on disk.
#[derive(Debug, Clone)]
pub struct FsAssetLoader {
    root: PathBuf,
}

impl FsAssetLoader {
    /// Resolves relative asset paths against `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }
}

#[async_trait]
impl AssetLoader for FsAssetLoader {
    async fn load(&self, path: &Path) -> Result<Vec<u8>> {
        let full = self.resolve(path);
        Ok(tokio::fs::read(&full).await?)
    }
}

/// Clears the in-flight flag when an attempt ends, however it ends.
struct InFlight<'a>(&'a AtomicBool);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Drives generation attempts for one session.
pub struct SessionController {
    client: Box<dyn GenerationClient>,
    quota: QuotaTracker,
    assets: Box<dyn AssetLoader>,
    placeholder: SourceImage,
    in_flight: AtomicBool,
    state: watch::Sender<SessionState>,
}

impl SessionController {
    /// Creates a session with the bundled placeholder selected.
    ///
    /// Asset paths set through [`with_placeholder`](Self::with_placeholder)
    /// are read relative to the working directory until
    /// [`with_assets`](Self::with_assets) says otherwise. The quota is not read
    /// until [`refresh_quota`](Self::refresh_quota) or the first attempt.
    pub fn new(client: impl GenerationClient + 'static, quota: QuotaTracker) -> Self {
        let placeholder = SourceImage::Bundled;
        let (state, _) = watch::channel(SessionState {
            phase: Phase::Idle,
            source: Some(placeholder.clone()),
            prompt: String::new(),
            loading: false,
            error: None,
            result: None,
            remaining: quota.limit(),
        });

        Self {
            client: Box::new(client),
            quota,
            assets: Box::new(FsAssetLoader::new(".")),
            placeholder,
            in_flight: AtomicBool::new(false),
            state,
        }
    }

    /// Replaces the asset loader.
    pub fn with_assets(mut self, assets: impl AssetLoader + 'static) -> Self {
        self.assets = Box::new(assets);
        self
    }

    /// Replaces the placeholder with an asset file and selects it.
    pub fn with_placeholder(mut self, path: impl Into<PathBuf>) -> Self {
        self.placeholder = SourceImage::Asset(path.into());
        let source = self.placeholder.clone();
        self.state.send_modify(|s| s.source = Some(source));
        self
    }

    /// Applies the asset settings from `config`.
    ///
    /// Without a configured placeholder file the bundled image stays selected,
    /// so the session works from any working directory.
    pub fn with_config(self, config: &Config) -> Self {
        let session = self.with_assets(FsAssetLoader::new(&config.asset_root));
        match &config.default_image {
            Some(path) => session.with_placeholder(path),
            None => session,
        }
    }

    /// Returns a copy of the current state.
    pub fn snapshot(&self) -> SessionState {
        self.state.borrow().clone()
    }

    /// Subscribes to state changes.
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    /// Returns the name of the backend in use.
    pub fn client_name(&self) -> &str {
        self.client.name()
    }

    /// Re-reads the quota record (resetting it on a new day) and publishes
    /// the remaining allowance.
    pub fn refresh_quota(&self) -> Result<u32> {
        let remaining = self.quota.check_and_refresh()?;
        self.state.send_modify(|s| s.remaining = remaining);
        Ok(remaining)
    }

    /// Replaces the prompt text.
    pub fn set_prompt(&self, prompt: impl Into<String>) {
        let prompt = prompt.into();
        self.state.send_modify(|s| s.prompt = prompt);
    }

    /// Selects an image file from disk as the source.
    ///
    /// Files above the upload ceiling are rejected before they are read; the
    /// previous selection stays in place. A successful upload clears the
    /// previous result.
    pub async fn select_upload(&self, path: impl AsRef<Path>) -> Result<()> {
        let loaded = image::load_upload(path).await;
        self.apply_upload(loaded)
    }

    /// Selects in-memory image bytes as the source.
    pub fn select_upload_bytes(&self, data: &[u8], file_name: Option<&str>) -> Result<()> {
        self.apply_upload(image::encode_upload(data, file_name))
    }

    fn apply_upload(&self, upload: Result<EncodedImage>) -> Result<()> {
        match upload {
            Ok(encoded) => {
                self.state.send_modify(|s| {
                    s.source = Some(SourceImage::Encoded(encoded));
                    s.error = None;
                    s.result = None;
                });
                Ok(())
            }
            Err(e) => {
                tracing::debug!("upload rejected: {e}");
                let message = e.to_string();
                self.state.send_modify(|s| s.error = Some(message));
                Err(e)
            }
        }
    }

    /// Goes back to the bundled placeholder image.
    pub fn reset_source(&self) {
        let source = self.placeholder.clone();
        self.state.send_modify(|s| s.source = Some(source));
    }

    /// Removes the source image entirely, leaving a prompt-only session.
    pub fn clear_source(&self) {
        self.state.send_modify(|s| s.source = None);
    }

    /// Writes the current result into `dir`.
    ///
    /// Returns `None` when there is nothing to export.
    pub fn download(&self, dir: impl AsRef<Path>) -> Result<Option<PathBuf>> {
        let Some(result) = self.state.borrow().result.clone() else {
            return Ok(None);
        };
        download::export(&result, dir, chrono::Utc::now()).map(Some)
    }

    /// Runs one generation attempt with the current prompt and source image.
    ///
    /// Only one attempt may be in flight; a second call while one is running
    /// fails with [`PfpError::Busy`] and leaves the session untouched.
    pub async fn generate(&self) -> Result<EncodedImage> {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tracing::warn!("generation already in flight, ignoring request");
            return Err(PfpError::Busy);
        }
        let _guard = InFlight(&self.in_flight);

        self.state.send_modify(|s| s.phase = Phase::Validating);
        let (prompt, source) = match self.validate() {
            Ok(inputs) => inputs,
            Err(e) => {
                tracing::debug!("generation rejected: {e}");
                let message = e.to_string();
                self.state.send_modify(|s| {
                    s.phase = Phase::Rejected;
                    s.error = Some(message);
                });
                self.settle();
                return Err(e);
            }
        };

        self.state.send_modify(|s| {
            s.phase = Phase::Preparing;
            s.loading = true;
            s.error = None;
        });

        match self.run(prompt, source).await {
            Ok(result) => {
                let remaining = match self.quota.consume() {
                    Ok(remaining) => remaining,
                    Err(e) => {
                        tracing::warn!("failed to record quota usage: {e}");
                        self.state.borrow().remaining.saturating_sub(1)
                    }
                };
                let published = result.clone();
                self.state.send_modify(|s| {
                    s.phase = Phase::Succeeded;
                    s.result = Some(published);
                    s.error = None;
                    s.remaining = remaining;
                });
                tracing::info!(remaining, "generation succeeded");
                self.settle();
                Ok(result)
            }
            Err(e) => {
                tracing::warn!("generation failed: {e}");
                let message = e.to_string();
                self.state.send_modify(|s| {
                    s.phase = Phase::Failed;
                    s.error = Some(message);
                });
                self.settle();
                Err(e)
            }
        }
    }

    /// Checks the allowance and inputs, returning the prompt and source to use.
    fn validate(&self) -> Result<(String, Option<SourceImage>)> {
        let remaining = self.quota.check_and_refresh()?;
        self.state.send_modify(|s| s.remaining = remaining);
        if remaining == 0 {
            return Err(PfpError::QuotaExhausted {
                limit: self.quota.limit(),
            });
        }

        let state = self.state.borrow();
        if state.prompt.trim().is_empty() && state.source.is_none() {
            return Err(PfpError::InvalidInput);
        }
        Ok((state.prompt.clone(), state.source.clone()))
    }

    async fn run(&self, prompt: String, source: Option<SourceImage>) -> Result<EncodedImage> {
        let request = self.prepare(prompt, source).await?;

        self.state.send_modify(|s| s.phase = Phase::Requesting);
        tracing::debug!(
            client = self.client.name(),
            has_image = request.is_edit(),
            "requesting generation"
        );
        self.client.generate(&request).await
    }

    async fn prepare(&self, prompt: String, source: Option<SourceImage>) -> Result<GenerationRequest> {
        let prompt = match prompt.trim() {
            "" => DEFAULT_PROMPT.to_string(),
            trimmed => trimmed.to_string(),
        };

        let image = match source {
            None => None,
            Some(SourceImage::Encoded(encoded)) => Some(encoded),
            Some(SourceImage::Bundled) => Some(encode_asset(BUNDLED_PLACEHOLDER, None)?),
            Some(SourceImage::Asset(path)) => Some(self.load_asset(&path).await?),
        };

        Ok(GenerationRequest { prompt, image })
    }

    async fn load_asset(&self, path: &Path) -> Result<EncodedImage> {
        let data = self.assets.load(path).await.map_err(|e| {
            tracing::warn!(path = %path.display(), "failed to load asset: {e}");
            PfpError::AssetPreparation(e.to_string())
        })?;
        encode_asset(&data, Some(path))
    }

    fn settle(&self) {
        self.state.send_modify(|s| {
            s.phase = Phase::Idle;
            s.loading = false;
        });
    }
}

/// Encodes placeholder bytes, falling back to the file extension when the
/// content has no recognisable signature.
fn encode_asset(data: &[u8], path: Option<&Path>) -> Result<EncodedImage> {
    if data.is_empty() {
        let name = path.map_or_else(
            || "bundled placeholder".to_string(),
            |p| p.display().to_string(),
        );
        return Err(PfpError::AssetPreparation(format!("{name} is empty")));
    }

    let format = ImageFormat::from_magic_bytes(data).or_else(|| {
        path.and_then(|p| p.extension())
            .and_then(|ext| ext.to_str())
            .and_then(ImageFormat::from_extension)
    });
    Ok(match format {
        Some(format) => EncodedImage::from_bytes_with_mime(data, format.mime_type()),
        None => EncodedImage::from_bytes(data),
    })
}

impl std::fmt::Debug for SessionController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionController")
            .field("client", &self.client.name())
            .field("quota", &self.quota)
            .field("state", &*self.state.borrow())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::ClientKind;
    use crate::quota::{FixedClock, MemoryQuotaStore, QuotaRecord, DAILY_LIMIT};
    use chrono::NaiveDate;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    const PNG: [u8; 12] = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 1];

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 5, 20).unwrap()
    }

    /// Scripted client that records every request it receives.
    #[derive(Clone, Default)]
    struct FakeClient {
        responses: Arc<Mutex<VecDeque<Result<EncodedImage>>>>,
        requests: Arc<Mutex<Vec<GenerationRequest>>>,
        yield_first: bool,
    }

    impl FakeClient {
        fn respond(&self, response: Result<EncodedImage>) -> &Self {
            self.responses.lock().unwrap().push_back(response);
            self
        }

        fn requests(&self) -> Vec<GenerationRequest> {
            self.requests.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl GenerationClient for FakeClient {
        async fn generate(&self, request: &GenerationRequest) -> Result<EncodedImage> {
            self.requests.lock().unwrap().push(request.clone());
            if self.yield_first {
                tokio::task::yield_now().await;
            }
            let next = self.responses.lock().unwrap().pop_front();
            next.unwrap_or_else(|| Ok(EncodedImage::new("data:image/png;base64,AAA")))
        }

        fn kind(&self) -> ClientKind {
            ClientKind::Proxy
        }
    }

    struct FakeAssets(Option<Vec<u8>>);

    #[async_trait]
    impl AssetLoader for FakeAssets {
        async fn load(&self, path: &Path) -> Result<Vec<u8>> {
            self.0.clone().ok_or_else(|| {
                PfpError::Io(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    format!("{} not found", path.display()),
                ))
            })
        }
    }

    fn session_with(client: &FakeClient, store: Arc<MemoryQuotaStore>) -> SessionController {
        let quota = QuotaTracker::new(store).with_clock(FixedClock::new(today()));
        SessionController::new(client.clone(), quota).with_assets(FakeAssets(Some(PNG.to_vec())))
    }

    fn session(client: &FakeClient) -> SessionController {
        session_with(client, Arc::new(MemoryQuotaStore::new()))
    }

    #[test]
    fn test_initial_state() {
        let controller = session(&FakeClient::default());
        let state = controller.snapshot();
        assert_eq!(state.phase, Phase::Idle);
        assert_eq!(state.source, Some(SourceImage::Bundled));
        assert!(!state.loading);
        assert_eq!(state.remaining, DAILY_LIMIT);
    }

    #[tokio::test]
    async fn test_successive_generations_consume_quota() {
        let client = FakeClient::default();
        let store = Arc::new(MemoryQuotaStore::new());
        let controller = session_with(&client, store.clone());
        controller.set_prompt("A baby astronaut on mars");

        for n in 1..=DAILY_LIMIT {
            controller.generate().await.unwrap();
            assert_eq!(controller.snapshot().remaining, DAILY_LIMIT - n);
        }

        let err = controller.generate().await.unwrap_err();
        assert!(matches!(err, PfpError::QuotaExhausted { limit: DAILY_LIMIT }));
        assert_eq!(client.requests().len(), DAILY_LIMIT as usize);
        assert_eq!(store.peek().map(|r| r.count), Some(DAILY_LIMIT));

        let state = controller.snapshot();
        assert_eq!(state.error.as_deref(), Some(err.to_string().as_str()));
        assert_eq!(state.phase, Phase::Idle);
        assert!(!state.loading);
    }

    #[tokio::test]
    async fn test_exhausted_stored_quota_blocks_first_attempt() {
        let client = FakeClient::default();
        let store = Arc::new(MemoryQuotaStore::with_record(QuotaRecord {
            date: today(),
            count: DAILY_LIMIT,
        }));
        let controller = session_with(&client, store);

        assert_eq!(controller.refresh_quota().unwrap(), 0);
        assert!(matches!(
            controller.generate().await,
            Err(PfpError::QuotaExhausted { .. })
        ));
        assert!(client.requests().is_empty());
    }

    #[tokio::test]
    async fn test_failed_call_keeps_quota_and_previous_result() {
        let client = FakeClient::default();
        client
            .respond(Ok(EncodedImage::new("data:image/png;base64,FIRST")))
            .respond(Err(PfpError::Rejected("model overloaded".into())));
        let store = Arc::new(MemoryQuotaStore::new());
        let controller = session_with(&client, store.clone());
        controller.set_prompt("first");

        controller.generate().await.unwrap();
        let before = store.peek();

        let err = controller.generate().await.unwrap_err();
        assert_eq!(err.to_string(), "model overloaded");
        assert_eq!(store.peek(), before);

        let state = controller.snapshot();
        assert_eq!(state.remaining, DAILY_LIMIT - 1);
        assert_eq!(
            state.result,
            Some(EncodedImage::new("data:image/png;base64,FIRST"))
        );
        assert_eq!(state.error.as_deref(), Some("model overloaded"));
        assert!(!state.loading);
    }

    #[tokio::test]
    async fn test_empty_prompt_uses_default_description() {
        let client = FakeClient::default();
        let controller = session(&client);
        controller
            .select_upload_bytes(&PNG, Some("me.png"))
            .unwrap();
        controller.set_prompt("   ");

        controller.generate().await.unwrap();
        let requests = client.requests();
        assert_eq!(requests[0].prompt, DEFAULT_PROMPT);
        assert!(requests[0].image.is_some());
    }

    #[tokio::test]
    async fn test_prompt_is_trimmed() {
        let client = FakeClient::default();
        let controller = session(&client);
        controller.set_prompt("  A baby pirate ");

        controller.generate().await.unwrap();
        assert_eq!(client.requests()[0].prompt, "A baby pirate");
    }

    #[tokio::test]
    async fn test_no_prompt_and_no_image_is_rejected() {
        let client = FakeClient::default();
        let store = Arc::new(MemoryQuotaStore::new());
        let controller = session_with(&client, store.clone());
        controller.clear_source();

        let err = controller.generate().await.unwrap_err();
        assert!(matches!(err, PfpError::InvalidInput));
        assert!(client.requests().is_empty());
        assert_eq!(store.peek().map(|r| r.count), Some(0));
        assert_eq!(
            controller.snapshot().error.as_deref(),
            Some("Please write a prompt or upload an image to start.")
        );
    }

    #[tokio::test]
    async fn test_prompt_only_sends_no_image() {
        let client = FakeClient::default();
        let controller = session(&client);
        controller.clear_source();
        controller.set_prompt("A baby astronaut");

        controller.generate().await.unwrap();
        assert_eq!(
            client.requests()[0],
            GenerationRequest::new("A baby astronaut")
        );
    }

    #[tokio::test]
    async fn test_oversized_upload_is_discarded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("huge.png");
        std::fs::File::create(&path)
            .unwrap()
            .set_len(image::MAX_UPLOAD_BYTES + 1)
            .unwrap();

        let client = FakeClient::default();
        let controller = session(&client);
        let before = controller.snapshot().source;

        let err = controller.select_upload(&path).await.unwrap_err();
        assert!(matches!(err, PfpError::FileTooLarge { .. }));

        let state = controller.snapshot();
        assert_eq!(state.source, before);
        assert_eq!(
            state.error.as_deref(),
            Some("Image size too large. Please upload an image under 5MB.")
        );
        assert!(client.requests().is_empty());
    }

    #[tokio::test]
    async fn test_upload_clears_previous_result_and_error() {
        let client = FakeClient::default();
        let controller = session(&client);
        controller.set_prompt("x");
        controller.generate().await.unwrap();
        assert!(controller.snapshot().result.is_some());

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("me.png");
        std::fs::write(&path, PNG).unwrap();
        controller.select_upload(&path).await.unwrap();

        let state = controller.snapshot();
        assert!(state.result.is_none());
        assert!(state.error.is_none());
        assert!(matches!(state.source, Some(SourceImage::Encoded(_))));
    }

    #[tokio::test]
    async fn test_success_replaces_result_exactly() {
        let client = FakeClient::default();
        client
            .respond(Ok(EncodedImage::new("data:image/png;base64,OLD")))
            .respond(Ok(EncodedImage::new("data:image/png;base64,AAA")));
        let controller = session(&client);
        controller.set_prompt("x");

        controller.generate().await.unwrap();
        let result = controller.generate().await.unwrap();

        assert_eq!(result.as_str(), "data:image/png;base64,AAA");
        let state = controller.snapshot();
        assert_eq!(state.result, Some(result));
        assert_eq!(state.phase, Phase::Idle);
        assert!(state.error.is_none());
    }

    #[tokio::test]
    async fn test_connectivity_failure_message() {
        let client = FakeClient::default();
        client.respond(Err(PfpError::Connectivity));
        let controller = session(&client);
        controller.set_prompt("x");

        controller.generate().await.unwrap_err();
        assert_eq!(
            controller.snapshot().error.as_deref(),
            Some("Cannot connect to server. If testing on mobile, ensure you are using your computer's IP address, not localhost.")
        );
    }

    #[tokio::test]
    async fn test_placeholder_asset_is_encoded_before_sending() {
        let client = FakeClient::default();
        let controller = session(&client).with_placeholder("assets/default-baby.png");

        controller.generate().await.unwrap();
        let image = client.requests()[0].image.clone().unwrap();
        assert!(image.as_str().starts_with("data:image/png;base64,"));
        assert_eq!(image.decode().unwrap(), PNG.to_vec());
    }

    #[tokio::test]
    async fn test_default_config_uses_bundled_placeholder() {
        // An empty asset root stands in for running from an unrelated directory
        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            asset_root: dir.path().to_path_buf(),
            ..Config::default()
        };
        let client = FakeClient::default();
        let store = Arc::new(MemoryQuotaStore::new());
        let quota = QuotaTracker::new(store.clone()).with_clock(FixedClock::new(today()));
        let controller = SessionController::new(client.clone(), quota).with_config(&config);

        controller.generate().await.unwrap();
        let image = client.requests()[0].image.clone().unwrap();
        assert!(image.as_str().starts_with("data:image/png;base64,"));
        assert_eq!(image.decode().unwrap(), BUNDLED_PLACEHOLDER.to_vec());
        assert_eq!(store.peek().map(|r| r.count), Some(1));
    }

    #[tokio::test]
    async fn test_configured_placeholder_file_is_loaded() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("me.png"), PNG).unwrap();
        let config = Config {
            asset_root: dir.path().to_path_buf(),
            default_image: Some(PathBuf::from("me.png")),
            ..Config::default()
        };
        let client = FakeClient::default();
        let quota = QuotaTracker::new(MemoryQuotaStore::new()).with_clock(FixedClock::new(today()));
        let controller = SessionController::new(client.clone(), quota).with_config(&config);

        assert_eq!(
            controller.snapshot().source,
            Some(SourceImage::Asset(PathBuf::from("me.png")))
        );
        controller.generate().await.unwrap();
        assert_eq!(
            client.requests()[0].image.as_ref().unwrap().decode().unwrap(),
            PNG.to_vec()
        );
    }

    #[tokio::test]
    async fn test_asset_failure_is_processing_error() {
        let client = FakeClient::default();
        let store = Arc::new(MemoryQuotaStore::new());
        let quota = QuotaTracker::new(store.clone()).with_clock(FixedClock::new(today()));
        let controller = SessionController::new(client.clone(), quota)
            .with_assets(FakeAssets(None))
            .with_placeholder("assets/missing.png");

        let err = controller.generate().await.unwrap_err();
        assert!(matches!(err, PfpError::AssetPreparation(_)));
        assert!(client.requests().is_empty());
        assert_eq!(store.peek().map(|r| r.count), Some(0));

        let state = controller.snapshot();
        assert_eq!(state.error.as_deref(), Some("Failed to process default image"));
        assert!(!state.loading);
    }

    #[tokio::test]
    async fn test_fs_asset_loader_resolves_against_root() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("assets")).unwrap();
        std::fs::write(dir.path().join("assets/default-baby.png"), PNG).unwrap();

        let client = FakeClient::default();
        let quota = QuotaTracker::new(MemoryQuotaStore::new()).with_clock(FixedClock::new(today()));
        let controller = SessionController::new(client.clone(), quota)
            .with_assets(FsAssetLoader::new(dir.path()))
            .with_placeholder("assets/default-baby.png");

        controller.generate().await.unwrap();
        assert_eq!(
            client.requests()[0].image.as_ref().unwrap().decode().unwrap(),
            PNG.to_vec()
        );
    }

    #[tokio::test]
    async fn test_reentrant_attempt_is_rejected() {
        let client = FakeClient {
            yield_first: true,
            ..FakeClient::default()
        };
        let store = Arc::new(MemoryQuotaStore::new());
        let controller = session_with(&client, store.clone());
        controller.set_prompt("x");

        let (first, second) = tokio::join!(controller.generate(), controller.generate());
        assert!(first.is_ok());
        assert!(matches!(second, Err(PfpError::Busy)));
        assert_eq!(client.requests().len(), 1);
        assert_eq!(store.peek().map(|r| r.count), Some(1));
        assert!(controller.snapshot().error.is_none());

        // The guard is released once the attempt settles
        controller.generate().await.unwrap();
        assert_eq!(store.peek().map(|r| r.count), Some(2));
    }

    #[tokio::test]
    async fn test_subscribers_see_settled_state() {
        let client = FakeClient::default();
        let controller = session(&client);
        controller.set_prompt("x");
        let mut rx = controller.subscribe();

        controller.generate().await.unwrap();
        assert!(rx.has_changed().unwrap());
        let state = rx.borrow_and_update().clone();
        assert_eq!(state.phase, Phase::Idle);
        assert!(!state.loading);
        assert!(state.result.is_some());
    }

    #[tokio::test]
    async fn test_reset_source_selects_placeholder() {
        let controller = session(&FakeClient::default()).with_placeholder("assets/other.png");
        controller.select_upload_bytes(&PNG, None).unwrap();
        controller.reset_source();
        assert_eq!(
            controller.snapshot().source,
            Some(SourceImage::Asset(PathBuf::from("assets/other.png")))
        );
    }

    #[tokio::test]
    async fn test_download() {
        let dir = tempfile::tempdir().unwrap();
        let client = FakeClient::default();
        client.respond(Ok(EncodedImage::from_bytes_with_mime(b"baby", "image/png")));
        let controller = session(&client);

        assert_eq!(controller.download(dir.path()).unwrap(), None);

        controller.set_prompt("x");
        controller.generate().await.unwrap();
        let path = controller.download(dir.path()).unwrap().unwrap();
        assert_eq!(std::fs::read(path).unwrap(), b"baby".to_vec());
    }
}
