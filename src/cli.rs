use crate::modes::Mode;
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "canvas-chat")]
#[command(version)]
#[command(about = "Multi-mode chat with canvas output, credential rotation and image fallback")]
pub struct Args {
    /// Message to send. Optional when only listing or managing history.
    pub prompt: Option<String>,

    /// Mode that handles the message
    #[arg(long, short, value_enum, default_value = "assistant")]
    pub mode: Mode,

    /// TOML config file (credentials, endpoints, timeouts)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// SQLite file holding the chat transcript
    #[arg(long, default_value = "canvas_chat_history.db")]
    pub history: PathBuf,

    /// Do not read or write the transcript
    #[arg(long)]
    pub no_history: bool,

    /// Print the stored transcript and exit
    #[arg(long)]
    pub show_history: bool,

    /// Clear the stored transcript and exit
    #[arg(long)]
    pub clear_history: bool,

    /// List available modes and exit
    #[arg(long)]
    pub list_modes: bool,

    /// Print the response as JSON instead of formatted text
    #[arg(long)]
    pub json: bool,

    /// Wait for model discovery before sending the message
    #[arg(long)]
    pub wait_discovery: bool,
}

impl Args {
    /// Whether this invocation sends a message to a provider.
    pub fn sends_message(&self) -> bool {
        !self.list_modes && !self.show_history && !self.clear_history
    }

    /// The trimmed prompt, or `None` when it is missing or blank.
    pub fn message(&self) -> Option<&str> {
        self.prompt.as_deref().map(str::trim).filter(|p| !p.is_empty())
    }
}
