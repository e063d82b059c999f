//! Client configuration: endpoints, credentials and timeouts.
//!
//! Values come from an optional TOML file and are then overridden by
//! environment variables:
//!
//! | Variable                          | Field               |
//! |-----------------------------------|---------------------|
//! | `GEMINI_API_KEYS` (comma list)    | `gemini_api_keys`   |
//! | `GEMINI_API_KEY`                  | `gemini_api_keys`   |
//! | `RUNWARE_API_KEY`                 | `runware_api_key`   |
//! | `CANVAS_CHAT_IMAGE_TIMEOUT_MS`    | `image_timeout_ms`  |
//!
//! ```toml
//! gemini_api_keys = ["key-a", "key-b"]
//! runware_api_key = "rw-key"
//! image_timeout_ms = 12000
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::ChatError;

pub const DEFAULT_TEXT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_IMAGE_WS_URL: &str = "wss://ws-api.runware.ai/v1";
pub const DEFAULT_FALLBACK_BASE_URL: &str = "https://image.pollinations.ai";
/// Watchdog for the primary image provider.
pub const DEFAULT_IMAGE_TIMEOUT_MS: u64 = 12_000;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 60;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Rotating pool for the text provider. Must be non-empty.
    pub gemini_api_keys: Vec<String>,
    pub runware_api_key: String,
    pub text_base_url: String,
    pub image_ws_url: String,
    pub fallback_base_url: String,
    pub image_timeout_ms: u64,
    /// Per-request timeout for the text provider's HTTP calls.
    pub request_timeout_secs: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            gemini_api_keys: Vec::new(),
            runware_api_key: String::new(),
            text_base_url: DEFAULT_TEXT_BASE_URL.to_string(),
            image_ws_url: DEFAULT_IMAGE_WS_URL.to_string(),
            fallback_base_url: DEFAULT_FALLBACK_BASE_URL.to_string(),
            image_timeout_ms: DEFAULT_IMAGE_TIMEOUT_MS,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
        }
    }
}

impl ClientConfig {
    /// Config with the given credentials and default endpoints.
    pub fn new(gemini_api_keys: Vec<String>, runware_api_key: impl Into<String>) -> Self {
        ClientConfig {
            gemini_api_keys,
            runware_api_key: runware_api_key.into(),
            ..ClientConfig::default()
        }
    }

    pub fn from_toml_str(s: &str) -> Result<Self, ChatError> {
        toml::from_str(s).map_err(|e| ChatError::Config(e.to_string()))
    }

    /// Read an optional TOML file, then apply environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, ChatError> {
        let mut config = match path {
            Some(p) => {
                let raw = std::fs::read_to_string(p).map_err(|e| {
                    ChatError::Config(format!("cannot read {}: {}", p.display(), e))
                })?;
                Self::from_toml_str(&raw)?
            }
            None => ClientConfig::default(),
        };
        config.apply_env_with(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Apply overrides from `lookup`, which maps a variable name to its value.
    pub fn apply_env_with<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(list) = lookup("GEMINI_API_KEYS") {
            let keys = split_key_list(&list);
            if !keys.is_empty() {
                self.gemini_api_keys = keys;
            }
        } else if let Some(key) = lookup("GEMINI_API_KEY") {
            let key = key.trim();
            if !key.is_empty() {
                self.gemini_api_keys = vec![key.to_string()];
            }
        }
        if let Some(key) = lookup("RUNWARE_API_KEY") {
            self.runware_api_key = key.trim().to_string();
        }
        if let Some(ms) = lookup("CANVAS_CHAT_IMAGE_TIMEOUT_MS").and_then(|v| v.trim().parse().ok()) {
            self.image_timeout_ms = ms;
        }
    }

    pub fn image_timeout(&self) -> Duration {
        Duration::from_millis(self.image_timeout_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

fn split_key_list(list: &str) -> Vec<String> {
    list.split(',')
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .map(String::from)
        .collect()
}
