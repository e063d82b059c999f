pub mod cli;
pub mod client;
pub mod config;
pub mod error;
pub mod history;
pub mod modes;
pub mod providers;
pub mod render;
pub mod selection;

pub use client::{CredentialPool, GeneratedImage, ImageSource, ProviderClient};
pub use config::ClientConfig;
pub use error::ChatError;
pub use history::{ChatEntry, Sender, TranscriptStore};
pub use modes::{Canvas, Mode, ModeRegistry, ModeResponse};
