//! Mode registry: maps a mode to its prompt template and result shape.
//!
//! Every mode calls the [`ProviderClient`] once and turns the reply into a
//! [`ModeResponse`]: chat text plus an optional canvas payload. Shaping is
//! kept in pure `shape_*` functions so it can be tested without a provider.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::client::{GeneratedImage, ProviderClient};
use crate::error::ChatError;

// ---------------------------------------------------------------------------
// Modes
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Mode {
    Assistant,
    Codex,
    Thinking,
    Research,
    DeepResearch,
    Math,
    Analyst,
    Creative,
    Writer,
    Image,
    Guided,
}

/// Kind of side panel a mode renders into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CanvasKind {
    Chat,
    Code,
    Writing,
    Image,
}

/// Static presentation metadata for a mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModeInfo {
    pub name: &'static str,
    pub icon: &'static str,
    pub color: &'static str,
    pub canvas: CanvasKind,
    pub description: &'static str,
}

impl Mode {
    pub const ALL: [Mode; 11] = [
        Mode::Assistant,
        Mode::Codex,
        Mode::Thinking,
        Mode::Research,
        Mode::DeepResearch,
        Mode::Math,
        Mode::Analyst,
        Mode::Creative,
        Mode::Writer,
        Mode::Image,
        Mode::Guided,
    ];

    pub fn id(&self) -> &'static str {
        match self {
            Mode::Assistant => "assistant",
            Mode::Codex => "codex",
            Mode::Thinking => "thinking",
            Mode::Research => "research",
            Mode::DeepResearch => "deep-research",
            Mode::Math => "math",
            Mode::Analyst => "analyst",
            Mode::Creative => "creative",
            Mode::Writer => "writer",
            Mode::Image => "image",
            Mode::Guided => "guided",
        }
    }

    pub fn info(&self) -> ModeInfo {
        let (name, icon, color, canvas, description) = match self {
            Mode::Assistant => ("Assistant", "💬", "#6366f1", CanvasKind::Chat, "General purpose AI assistant"),
            Mode::Codex => ("Codex", "💻", "#10b981", CanvasKind::Code, "Code generation and debugging"),
            Mode::Thinking => ("Thinking", "🧠", "#8b5cf6", CanvasKind::Writing, "Deep reasoning with visible thought process"),
            Mode::Research => ("Research", "🔍", "#0ea5e9", CanvasKind::Writing, "Information gathering and synthesis"),
            Mode::DeepResearch => ("Deep Research", "🔬", "#3b82f6", CanvasKind::Writing, "Comprehensive academic-level research"),
            Mode::Math => ("Math", "📐", "#f59e0b", CanvasKind::Code, "Mathematical problem solving"),
            Mode::Analyst => ("Analyst", "📊", "#06b6d4", CanvasKind::Writing, "Data analysis and insights"),
            Mode::Creative => ("Creative", "✨", "#ec4899", CanvasKind::Writing, "Creative ideation and storytelling"),
            Mode::Writer => ("Writer", "✍️", "#f97316", CanvasKind::Writing, "Long-form writing assistance"),
            Mode::Image => ("Image", "🎨", "#a855f7", CanvasKind::Image, "AI image generation"),
            Mode::Guided => ("Guided Learning", "🎓", "#14b8a6", CanvasKind::Writing, "Step-by-step educational guidance"),
        };
        ModeInfo { name, icon, color, canvas, description }
    }

    /// System instruction sent with the user's message. `None` for image mode.
    pub fn system_instruction(&self) -> Option<&'static str> {
        match self {
            Mode::Assistant => Some("You are a helpful, witty, and knowledgeable AI assistant. Keep responses concise and engaging."),
            Mode::Codex => Some("You are an expert coding assistant. Respond with JSON only."),
            Mode::Thinking => Some(
                "Analyze the user's request using a \"Thinking Process\". \
                 Break it down into: 1. Initial Analysis 2. Step-by-step reasoning 3. Alternative viewpoints 4. Final Conclusion. \
                 Format the output as a structured markdown document for a \"Thought Process\" canvas.",
            ),
            Mode::Research => Some("You are a research assistant. Provide a structured research summary with headings."),
            Mode::DeepResearch => Some("You are a PhD-level researcher. Conduct a \"Deep Research\" analysis."),
            Mode::Math => Some("You are a math tutor. Solve the problem step-by-step."),
            Mode::Analyst => Some("You are a data analyst. Provide data analysis with summary and metrics."),
            Mode::Creative => Some("You are a creative writer. Write a creative piece."),
            Mode::Writer => Some("You are a professional editor. Write a long-form article."),
            Mode::Guided => Some("You are a teacher. Create a Learning Guide."),
            Mode::Image => None,
        }
    }
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.id())
    }
}

impl std::str::FromStr for Mode {
    type Err = ChatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Mode::ALL
            .iter()
            .copied()
            .find(|m| m.id().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ChatError::UnknownMode(s.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Responses
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SectionKind {
    Thinking,
    Paragraph,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Section {
    #[serde(rename = "type")]
    pub kind: SectionKind,
    pub content: String,
}

/// Side-panel payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "content", rename_all = "lowercase")]
pub enum Canvas {
    Code {
        language: String,
        code: String,
        description: String,
    },
    Writing {
        title: String,
        sections: Vec<Section>,
    },
    Image {
        images: Vec<GeneratedImage>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModeResponse {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub canvas: Option<Canvas>,
}

impl ModeResponse {
    pub fn chat(text: impl Into<String>) -> Self {
        ModeResponse { text: text.into(), canvas: None }
    }

    fn with_canvas(text: impl Into<String>, canvas: Canvas) -> Self {
        ModeResponse { text: text.into(), canvas: Some(canvas) }
    }
}

// ---------------------------------------------------------------------------
// Shaping
// ---------------------------------------------------------------------------

const CODEX_PARSE_ERROR_CODE: &str = "// Error parsing code";
const CODEX_DEFAULT_LANGUAGE: &str = "javascript";

/// Prompt sent in codex mode around the user's request.
pub fn codex_prompt(message: &str) -> String {
    format!(
        "Generate code for the following request: \"{}\". \
         Return ONLY the code logic wrapped in markdown code blocks. \
         Also provide a brief explanation. \
         Format: JSON with fields \"code\", \"language\", \"explanation\".",
        message
    )
}

/// Span from the first `{` to the last `}`, inclusive.
pub fn extract_json_object(raw: &str) -> Option<&str> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    (end > start).then(|| &raw[start..=end])
}

#[derive(Debug, Default, Deserialize)]
struct CodexReply {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    language: Option<String>,
    #[serde(default)]
    explanation: Option<String>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.is_empty())
}

pub fn shape_codex(raw: &str) -> ModeResponse {
    let parsed = extract_json_object(raw).and_then(|json| {
        serde_json::from_str::<CodexReply>(json)
            .map_err(|e| tracing::warn!(error = %e, "codex reply is not valid JSON"))
            .ok()
    });
    let reply = parsed.unwrap_or_else(|| CodexReply {
        code: Some(CODEX_PARSE_ERROR_CODE.to_string()),
        language: Some(CODEX_DEFAULT_LANGUAGE.to_string()),
        explanation: Some(raw.to_string()),
    });

    ModeResponse::with_canvas(
        non_empty(reply.explanation).unwrap_or_else(|| "Here is the code you requested.".to_string()),
        Canvas::Code {
            language: non_empty(reply.language).unwrap_or_else(|| CODEX_DEFAULT_LANGUAGE.to_string()),
            code: non_empty(reply.code).unwrap_or_else(|| raw.to_string()),
            description: "Generated Code".to_string(),
        },
    )
}

/// Shape a text reply for every text mode except codex.
pub fn shape_text(mode: Mode, message: &str, reply: String) -> ModeResponse {
    let writing = |title: String, kind: SectionKind, reply: String| Canvas::Writing {
        title,
        sections: vec![Section { kind, content: reply }],
    };

    match mode {
        Mode::Assistant => ModeResponse::chat(reply),
        Mode::Codex => shape_codex(&reply),
        Mode::Thinking => ModeResponse::with_canvas(
            "I have analyzed your request. See my reasoning process in the canvas.",
            writing("Thought Process".to_string(), SectionKind::Thinking, reply),
        ),
        Mode::Research => ModeResponse::with_canvas(
            "I've compiled the research findings. View the full report in the canvas.",
            writing(format!("Research: {}", message), SectionKind::Paragraph, reply),
        ),
        Mode::DeepResearch => ModeResponse::with_canvas(
            "Deep research analysis complete. Please review the comprehensive document in the canvas.",
            writing(format!("Deep Analysis: {}", message), SectionKind::Paragraph, reply),
        ),
        Mode::Math => ModeResponse::with_canvas(
            "I have solved the problem. Check the solution in the canvas.",
            Canvas::Code {
                language: "math".to_string(),
                code: reply,
                description: "Step-by-Step Solution".to_string(),
            },
        ),
        Mode::Analyst => ModeResponse::with_canvas(
            "Analysis generated. View the insights in the canvas.",
            writing(format!("Data Analysis: {}", message), SectionKind::Paragraph, reply),
        ),
        Mode::Creative => ModeResponse::with_canvas(
            "I've crafted something for you. Read it in the canvas.",
            writing("Creative Piece".to_string(), SectionKind::Paragraph, reply),
        ),
        Mode::Writer => ModeResponse::with_canvas(
            "Article draft created. You can read the full text in the writing canvas.",
            writing(format!("Draft: {}", message), SectionKind::Paragraph, reply),
        ),
        Mode::Guided => ModeResponse::with_canvas(
            "Learning guide prepared. Follow the steps in the canvas.",
            writing(format!("Guide: {}", message), SectionKind::Paragraph, reply),
        ),
        Mode::Image => ModeResponse::chat(reply),
    }
}

pub fn shape_images(message: &str, images: Vec<GeneratedImage>) -> ModeResponse {
    let text = match images.first() {
        Some(img) => format!(
            "![{}]({})\n\n*Generated by the {} image provider ({}x{})*",
            message, img.url, img.source, img.width, img.height
        ),
        None => "No image was generated.".to_string(),
    };
    ModeResponse::with_canvas(text, Canvas::Image { images })
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Dispatches messages to modes over a shared [`ProviderClient`].
#[derive(Debug, Clone)]
pub struct ModeRegistry {
    client: ProviderClient,
}

impl ModeRegistry {
    pub fn new(client: ProviderClient) -> Self {
        ModeRegistry { client }
    }

    pub fn client(&self) -> &ProviderClient {
        &self.client
    }

    pub fn modes(&self) -> &'static [Mode] {
        &Mode::ALL
    }

    /// Run `message` through `mode`. Provider failures end up in the text.
    pub async fn respond(&self, mode: Mode, message: &str) -> ModeResponse {
        tracing::debug!(mode = %mode, "dispatching message");
        match mode {
            Mode::Image => shape_images(message, self.client.generate_image(message).await),
            Mode::Codex => {
                let raw = self
                    .client
                    .generate_text(&codex_prompt(message), mode.system_instruction())
                    .await;
                shape_codex(&raw)
            }
            _ => {
                let reply = self.client.generate_text(message, mode.system_instruction()).await;
                shape_text(mode, message, reply)
            }
        }
    }
}
