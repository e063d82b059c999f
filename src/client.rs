//! Provider client: text generation with credential rotation and model
//! discovery, image generation with a WebSocket primary and a URL-only
//! fallback.
//!
//! ## Contracts
//! - [`ProviderClient::generate_text`] never returns an error; failures come
//!   back as an `"Error: …"` string.
//! - [`ProviderClient::generate_image`] never returns an empty vector; any
//!   primary failure (timeout, error frame, transport) yields a fallback image.
//! - [`ProviderClient::discover_models`] never raises; failure keeps the
//!   current model.
//!
//! ## Discovery races
//! Rotation spawns a discovery pass without waiting for it, so two passes can
//! overlap. Each pass records the rotation epoch it started under and only
//! applies its result if no rotation happened in between: the selected model
//! always belongs to the most recent credential.

use std::sync::{Arc, Mutex, MutexGuard};

use futures_util::{SinkExt, StreamExt};
use rand::Rng;
use serde::{Deserialize, Serialize};
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, info, warn};
use url::Url;

use crate::config::ClientConfig;
use crate::error::ChatError;
use crate::providers::{
    ClientTask, GenerateContentRequest, GenerateContentResponse, ModelInfo, ModelList,
    ServerFrame, IMAGE_CFG_SCALE, IMAGE_MODEL_ID, IMAGE_STEPS, TASK_AUTHENTICATION,
    TASK_IMAGE_INFERENCE,
};
use crate::selection::{
    choose_dimensions, compose_prompt, extract_error_message, select_model, should_rotate,
    ImageDimensions, DEFAULT_MODEL,
};

/// Glyph shown while an image loads.
pub const IMAGE_PLACEHOLDER: &str = "🎨";
/// Model tag requested from the fallback image endpoint.
pub const FALLBACK_MODEL: &str = "flux";

const PRIMARY_SEED_RANGE: u64 = 1_000_000_000;
const FALLBACK_SEED_RANGE: u64 = 1_000_000;

/// Handle to a detached discovery pass. Resolves to the newly selected model.
pub type DiscoveryHandle = JoinHandle<Option<String>>;

type ImageSocket = WebSocketStream<MaybeTlsStream<TcpStream>>;

// ---------------------------------------------------------------------------
// Credential pool
// ---------------------------------------------------------------------------

/// Ordered credentials with a wrapping cursor.
#[derive(Clone)]
pub struct CredentialPool {
    keys: Vec<String>,
    index: usize,
}

impl CredentialPool {
    pub fn new(keys: Vec<String>) -> Result<Self, ChatError> {
        if keys.is_empty() {
            return Err(ChatError::EmptyCredentialPool);
        }
        Ok(CredentialPool { keys, index: 0 })
    }

    pub fn current(&self) -> &str {
        &self.keys[self.index]
    }

    pub fn index(&self) -> usize {
        self.index
    }

    /// Never zero: construction rejects an empty pool.
    pub(crate) fn len(&self) -> usize {
        self.keys.len()
    }

    /// Move to the next credential, wrapping at the end. Returns the new index.
    pub fn advance(&mut self) -> usize {
        self.index = (self.index + 1) % self.keys.len();
        self.index
    }
}

impl std::fmt::Debug for CredentialPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialPool")
            .field("len", &self.keys.len())
            .field("index", &self.index)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Generated images
// ---------------------------------------------------------------------------

/// Which provider produced an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageSource {
    Primary,
    Fallback,
}

impl std::fmt::Display for ImageSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ImageSource::Primary => write!(f, "primary"),
            ImageSource::Fallback => write!(f, "fallback"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedImage {
    pub id: u32,
    pub url: String,
    pub width: u32,
    pub height: u32,
    pub placeholder: String,
    pub source: ImageSource,
}

impl GeneratedImage {
    fn new(url: String, dims: ImageDimensions, source: ImageSource) -> Self {
        GeneratedImage {
            id: 1,
            url,
            width: dims.width,
            height: dims.height,
            placeholder: IMAGE_PLACEHOLDER.to_string(),
            source,
        }
    }

    pub fn is_portrait(&self) -> bool {
        self.width < self.height
    }
}

/// Progress of one primary image request, reported when it fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImagePhase {
    Connecting,
    Authenticating,
    Requesting,
    Completed,
}

impl std::fmt::Display for ImagePhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ImagePhase::Connecting => write!(f, "connecting"),
            ImagePhase::Authenticating => write!(f, "authenticating"),
            ImagePhase::Requesting => write!(f, "requesting"),
            ImagePhase::Completed => write!(f, "completed"),
        }
    }
}

// ---------------------------------------------------------------------------
// ProviderClient
// ---------------------------------------------------------------------------

struct ClientState {
    pool: CredentialPool,
    model: String,
    /// Bumped on every rotation; discovery results from older epochs are dropped.
    epoch: u64,
}

struct Inner {
    http: reqwest::Client,
    config: ClientConfig,
    text_base: String,
    fallback_base: Url,
    state: Mutex<ClientState>,
}

/// Cheaply cloneable handle; clones share credential and model state.
#[derive(Clone)]
pub struct ProviderClient {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for ProviderClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state();
        f.debug_struct("ProviderClient")
            .field("pool", &state.pool)
            .field("model", &state.model)
            .field("epoch", &state.epoch)
            .finish()
    }
}

impl ProviderClient {
    /// Validate `config` and build a client on the default model.
    ///
    /// No network traffic happens here; call [`ProviderClient::init`] to run
    /// the first discovery pass.
    pub fn new(config: ClientConfig) -> Result<Self, ChatError> {
        let pool = CredentialPool::new(config.gemini_api_keys.clone())?;
        let text_base = parse_base_url(&config.text_base_url)?
            .as_str()
            .trim_end_matches('/')
            .to_string();
        let fallback_base = parse_base_url(&config.fallback_base_url)?;
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()?;

        Ok(ProviderClient {
            inner: Arc::new(Inner {
                http,
                config,
                text_base,
                fallback_base,
                state: Mutex::new(ClientState {
                    pool,
                    model: DEFAULT_MODEL.to_string(),
                    epoch: 0,
                }),
            }),
        })
    }

    /// Start the first discovery pass. Awaiting the handle is optional.
    pub fn init(&self) -> Option<DiscoveryHandle> {
        self.spawn_discovery()
    }

    fn state(&self) -> MutexGuard<'_, ClientState> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    pub fn current_credential(&self) -> String {
        self.state().pool.current().to_string()
    }

    pub fn credential_index(&self) -> usize {
        self.state().pool.index()
    }

    pub fn pool_size(&self) -> usize {
        self.state().pool.len()
    }

    pub fn current_model(&self) -> String {
        self.state().model.clone()
    }

    /// Advance to the next credential and re-run discovery in the background.
    ///
    /// Returns the discovery handle, or `None` outside a tokio runtime (the
    /// rotation itself still happens).
    pub fn rotate_credential(&self) -> Option<DiscoveryHandle> {
        {
            let mut state = self.state();
            let index = state.pool.advance();
            state.epoch += 1;
            info!(
                key_number = index + 1,
                pool_size = state.pool.len(),
                "rotating text provider credential"
            );
        }
        self.spawn_discovery()
    }

    fn spawn_discovery(&self) -> Option<DiscoveryHandle> {
        let handle = tokio::runtime::Handle::try_current().ok()?;
        let client = self.clone();
        Some(handle.spawn(async move { client.discover_models().await }))
    }

    // -----------------------------------------------------------------------
    // Model discovery
    // -----------------------------------------------------------------------

    /// Query the model catalog with the current credential and select a model.
    ///
    /// Returns the newly selected model, or `None` when discovery failed, the
    /// catalog had no usable entry, or a rotation superseded this pass. The
    /// current model is left unchanged in every `None` case.
    pub async fn discover_models(&self) -> Option<String> {
        let (key, epoch) = {
            let state = self.state();
            (state.pool.current().to_string(), state.epoch)
        };

        debug!("discovering available text models");
        let catalog = match self.fetch_catalog(&key).await {
            Ok(catalog) => catalog,
            Err(e) => {
                warn!(error = %e, "model discovery failed, keeping current model");
                return None;
            }
        };

        let names: Vec<&str> = catalog
            .iter()
            .filter(|m| m.supports_generate_content())
            .map(|m| m.name.as_str())
            .collect();
        debug!(models = ?names, "available models");

        let Some(selected) = select_model(&catalog) else {
            warn!("model catalog has no generateContent models, keeping current model");
            return None;
        };

        let mut state = self.state();
        if state.epoch != epoch {
            debug!(model = %selected, "discarding discovery result from a rotated credential");
            return None;
        }
        state.model = selected.clone();
        info!(model = %selected, "selected text model");
        Some(selected)
    }

    async fn fetch_catalog(&self, key: &str) -> Result<Vec<ModelInfo>, ChatError> {
        let url = format!("{}/models", self.inner.text_base);
        let response = self
            .inner
            .http
            .get(&url)
            .query(&[("key", key)])
            .send()
            .await
            .map_err(|e| ChatError::Discovery(e.to_string()))?;

        if !response.status().is_success() {
            return Err(ChatError::Discovery(format!(
                "HTTP {} from model listing",
                response.status().as_u16()
            )));
        }

        let list: ModelList = response
            .json()
            .await
            .map_err(|e| ChatError::Discovery(e.to_string()))?;
        Ok(list.models)
    }

    // -----------------------------------------------------------------------
    // Text generation
    // -----------------------------------------------------------------------

    /// Generate text, reporting any failure as an `"Error: …"` string.
    pub async fn generate_text(&self, prompt: &str, system_instruction: Option<&str>) -> String {
        match self.try_generate_text(prompt, system_instruction).await {
            Ok(text) => text,
            Err(e) => {
                error!(error = %e, "text generation failed");
                format!("Error: {}.", e)
            }
        }
    }

    /// Generate text, surfacing failures as [`ChatError`].
    ///
    /// A 429, 403 or 503 rotates the credential before the error is returned.
    /// The failed request is not retried.
    pub async fn try_generate_text(
        &self,
        prompt: &str,
        system_instruction: Option<&str>,
    ) -> Result<String, ChatError> {
        let (key, model) = {
            let state = self.state();
            (state.pool.current().to_string(), state.model.clone())
        };
        let url = format!("{}/models/{}:generateContent", self.inner.text_base, model);
        let request = GenerateContentRequest::single(compose_prompt(prompt, system_instruction));

        let response = self
            .inner
            .http
            .post(&url)
            .query(&[("key", key.as_str())])
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let status_text = status
                .canonical_reason()
                .map(String::from)
                .unwrap_or_else(|| status.to_string());
            let body = response.text().await.unwrap_or_default();
            let message = extract_error_message(&status_text, &body);
            error!(status = status.as_u16(), message = %message, model = %model, "text provider error");

            if should_rotate(status.as_u16()) {
                let _ = self.rotate_credential();
            }
            return Err(ChatError::GenerationHttp {
                status: status.as_u16(),
                message,
            });
        }

        let data: GenerateContentResponse = response.json().await?;
        data.first_text()
            .map(String::from)
            .ok_or(ChatError::EmptyResponse)
    }

    // -----------------------------------------------------------------------
    // Image generation
    // -----------------------------------------------------------------------

    /// Generate one image, falling back to the no-auth endpoint on any
    /// primary failure. Never returns an empty vector.
    pub async fn generate_image(&self, prompt: &str) -> Vec<GeneratedImage> {
        let dims = choose_dimensions(prompt);
        info!(width = dims.width, height = dims.height, "generating image");

        match self.generate_image_primary(prompt, dims).await {
            Ok(image) => {
                info!(url = %image.url, "primary image provider returned an image");
                vec![image]
            }
            Err(e) => {
                warn!(error = %e, "primary image provider failed, using fallback");
                self.generate_image_fallback(prompt, dims.width, dims.height)
            }
        }
    }

    /// One request against the primary provider. A single watchdog deadline,
    /// set before connecting, covers the handshake and the whole session.
    pub async fn generate_image_primary(
        &self,
        prompt: &str,
        dims: ImageDimensions,
    ) -> Result<GeneratedImage, ChatError> {
        let watchdog_ms = self.inner.config.image_timeout_ms;
        let deadline = tokio::time::Instant::now() + self.inner.config.image_timeout();

        let mut phase = ImagePhase::Connecting;
        let (mut socket, _) = tokio::time::timeout_at(
            deadline,
            tokio_tungstenite::connect_async(self.inner.config.image_ws_url.as_str()),
        )
        .await
        .map_err(|_| {
            warn!(phase = %phase, timeout_ms = watchdog_ms, "image provider connect timed out");
            ChatError::ProviderTimeout(watchdog_ms)
        })??;

        phase = ImagePhase::Authenticating;
        let outcome =
            tokio::time::timeout_at(deadline, self.run_image_session(&mut socket, prompt, dims, &mut phase))
                .await;
        let _ = socket.close(None).await;

        match outcome {
            Ok(result) => result,
            Err(_) => {
                warn!(phase = %phase, timeout_ms = watchdog_ms, "image provider watchdog fired");
                Err(ChatError::ProviderTimeout(watchdog_ms))
            }
        }
    }

    async fn run_image_session(
        &self,
        socket: &mut ImageSocket,
        prompt: &str,
        dims: ImageDimensions,
        phase: &mut ImagePhase,
    ) -> Result<GeneratedImage, ChatError> {
        let seed = rand::thread_rng().gen_range(0..PRIMARY_SEED_RANGE);
        send_tasks(
            socket,
            &[ClientTask::Authentication {
                api_key: self.inner.config.runware_api_key.clone(),
            }],
        )
        .await?;

        while let Some(message) = socket.next().await {
            let text = match message? {
                WsMessage::Text(text) => text,
                WsMessage::Close(_) => return Err(ChatError::ConnectionClosed),
                _ => continue,
            };

            let frame: ServerFrame = match serde_json::from_str(&text) {
                Ok(frame) => frame,
                Err(e) => {
                    warn!(error = %e, "unparseable image provider frame ignored");
                    continue;
                }
            };

            if let Some(err) = frame.error {
                return Err(ChatError::ProviderError(err.to_string()));
            }

            for task in frame.data {
                match task.task_type.as_str() {
                    TASK_AUTHENTICATION if *phase == ImagePhase::Authenticating => {
                        debug!("image provider authenticated");
                        send_tasks(
                            socket,
                            &[ClientTask::ImageInference {
                                task_uuid: uuid::Uuid::new_v4().to_string(),
                                positive_prompt: prompt.to_string(),
                                width: dims.width,
                                height: dims.height,
                                number_results: 1,
                                model_id: IMAGE_MODEL_ID.to_string(),
                                seed,
                                steps: IMAGE_STEPS,
                                cfg_scale: IMAGE_CFG_SCALE,
                            }],
                        )
                        .await?;
                        *phase = ImagePhase::Requesting;
                    }
                    TASK_IMAGE_INFERENCE => {
                        if let Some(url) = task.image_url {
                            *phase = ImagePhase::Completed;
                            return Ok(GeneratedImage::new(url, dims, ImageSource::Primary));
                        }
                    }
                    _ => {}
                }
            }
        }

        Err(ChatError::ConnectionClosed)
    }

    /// Build a fallback image without any network call. Never fails.
    pub fn generate_image_fallback(&self, prompt: &str, width: u32, height: u32) -> Vec<GeneratedImage> {
        let seed = rand::thread_rng().gen_range(0..FALLBACK_SEED_RANGE);
        let url = fallback_image_url(&self.inner.fallback_base, prompt, width, height, seed);
        vec![GeneratedImage::new(
            url,
            ImageDimensions { width, height },
            ImageSource::Fallback,
        )]
    }
}

async fn send_tasks(socket: &mut ImageSocket, tasks: &[ClientTask]) -> Result<(), ChatError> {
    let payload = serde_json::to_string(tasks)?;
    socket.send(WsMessage::Text(payload)).await?;
    Ok(())
}

/// Parse a base URL that must accept additional path segments.
pub fn parse_base_url(raw: &str) -> Result<Url, ChatError> {
    let url = Url::parse(raw).map_err(|e| ChatError::InvalidUrl {
        url: raw.to_string(),
        detail: e.to_string(),
    })?;
    if url.cannot_be_a_base() {
        return Err(ChatError::InvalidUrl {
            url: raw.to_string(),
            detail: "URL cannot carry a path".to_string(),
        });
    }
    Ok(url)
}

/// `<base>/prompt/<encoded prompt>?width=&height=&nologo=true&seed=&model=flux`
///
/// The prompt is encoded as a single URI component, so reserved characters
/// such as `+`, `&` and `:` are escaped and dot-only prompts stay in the path.
pub fn fallback_image_url(base: &Url, prompt: &str, width: u32, height: u32, seed: u64) -> String {
    let mut root = base.clone();
    root.set_query(None);
    root.set_fragment(None);

    let query = url::form_urlencoded::Serializer::new(String::new())
        .append_pair("width", &width.to_string())
        .append_pair("height", &height.to_string())
        .append_pair("nologo", "true")
        .append_pair("seed", &seed.to_string())
        .append_pair("model", FALLBACK_MODEL)
        .finish();

    format!(
        "{}/prompt/{}?{}",
        root.as_str().trim_end_matches('/'),
        urlencoding::encode(prompt),
        query
    )
}
