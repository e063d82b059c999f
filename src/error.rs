//! Crate-wide error type.
//!
//! Most variants are internal: the public text path converts them into an
//! `"Error: …"` string and the image path converts them into a fallback
//! image. Construction, configuration and storage errors propagate normally.

use thiserror::Error;

/// Every failure the crate can produce.
#[derive(Debug, Error)]
pub enum ChatError {
    /// A credential pool was constructed with no credentials.
    #[error("credential pool must contain at least one key")]
    EmptyCredentialPool,

    /// A configured base URL could not be parsed or cannot carry path segments.
    #[error("invalid URL '{url}': {detail}")]
    InvalidUrl { url: String, detail: String },

    /// The configuration file or environment was unusable.
    #[error("configuration error: {0}")]
    Config(String),

    /// Model listing failed. Always swallowed by the client; logged only.
    #[error("model discovery failed: {0}")]
    Discovery(String),

    /// The text provider replied with a non-success status.
    #[error("Gemini API Error ({status}): {message}")]
    GenerationHttp { status: u16, message: String },

    /// The text provider replied successfully but with no candidate content.
    #[error("No content in response")]
    EmptyResponse,

    /// No HTTP response at all (DNS, connect, TLS, body read).
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The image provider sent no terminal frame before the watchdog fired.
    #[error("image provider timed out after {0} ms")]
    ProviderTimeout(u64),

    /// The image provider sent an error frame.
    #[error("image provider error: {0}")]
    ProviderError(String),

    /// The image provider closed the socket before delivering a result.
    #[error("image provider closed the connection")]
    ConnectionClosed,

    /// WebSocket transport failure.
    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Transcript store failure.
    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A mode identifier did not match any registered mode.
    #[error("unknown mode: {0}")]
    UnknownMode(String),
}
