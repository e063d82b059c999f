//! Pure selection heuristics used by the provider client.
//!
//! Nothing here touches the network, so every rule (prompt composition,
//! image dimensions, model preference, error-body parsing) can be tested in
//! isolation.

use crate::providers::ModelInfo;

/// Model used until the first successful discovery pass.
pub const DEFAULT_MODEL: &str = "gemini-1.5-flash";

/// Catalog names in order of preference, most preferred first.
pub const PREFERRED_MODELS: &[&str] = &[
    "models/gemini-1.5-flash",
    "models/gemini-1.5-pro",
    "models/gemini-pro",
    "models/gemini-1.0-pro",
];

/// HTTP statuses after which the active credential is rotated:
/// rate limited, forbidden, service unavailable.
pub const ROTATE_ON_STATUS: &[u16] = &[429, 403, 503];

const MODEL_PREFIX: &str = "models/";

// ---------------------------------------------------------------------------
// Prompt composition
// ---------------------------------------------------------------------------

/// Merge an optional system instruction into the user prompt.
///
/// An absent or empty instruction leaves the prompt untouched.
pub fn compose_prompt(prompt: &str, system_instruction: Option<&str>) -> String {
    match system_instruction {
        Some(instruction) if !instruction.is_empty() => {
            format!("{}\n\nUser Request: {}", instruction, prompt)
        }
        _ => prompt.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Image dimensions
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageDimensions {
    pub width: u32,
    pub height: u32,
}

impl ImageDimensions {
    pub const SQUARE: ImageDimensions = ImageDimensions { width: 1024, height: 1024 };
    pub const PORTRAIT: ImageDimensions = ImageDimensions { width: 1024, height: 1792 };
    pub const LANDSCAPE: ImageDimensions = ImageDimensions { width: 1792, height: 1024 };
}

/// Keyword rules scanned in order; the first rule with any matching keyword wins.
const DIMENSION_RULES: &[(&[&str], ImageDimensions)] = &[
    (&["portrait", "tall", "vertical", "9:16"], ImageDimensions::PORTRAIT),
    (&["landscape", "wide", "horizontal", "16:9"], ImageDimensions::LANDSCAPE),
    (&["wallpaper"], ImageDimensions::LANDSCAPE),
];

/// Pick output dimensions from keywords in the prompt (case-insensitive).
pub fn choose_dimensions(prompt: &str) -> ImageDimensions {
    let lowered = prompt.to_lowercase();
    DIMENSION_RULES
        .iter()
        .find(|(keywords, _)| keywords.iter().any(|k| lowered.contains(k)))
        .map(|(_, dims)| *dims)
        .unwrap_or(ImageDimensions::SQUARE)
}

// ---------------------------------------------------------------------------
// Model selection
// ---------------------------------------------------------------------------

/// Strip the catalog's `models/` prefix from a model name.
pub fn strip_model_prefix(name: &str) -> &str {
    name.strip_prefix(MODEL_PREFIX).unwrap_or(name)
}

/// Choose a model from a catalog.
///
/// Only entries supporting `generateContent` are considered. Returns `None`
/// when no entry qualifies so the caller keeps its current model.
pub fn select_model(catalog: &[ModelInfo]) -> Option<String> {
    let usable: Vec<&ModelInfo> = catalog
        .iter()
        .filter(|m| m.supports_generate_content())
        .collect();

    let preferred = PREFERRED_MODELS
        .iter()
        .find(|pref| usable.iter().any(|m| m.name == **pref))
        .map(|pref| pref.to_string());

    let chosen = preferred.or_else(|| {
        usable
            .iter()
            .find(|m| m.name.contains("flash"))
            .or_else(|| usable.iter().find(|m| m.name.contains("pro")))
            .or_else(|| usable.first())
            .map(|m| m.name.clone())
    })?;

    Some(strip_model_prefix(&chosen).to_string())
}

// ---------------------------------------------------------------------------
// Error bodies
// ---------------------------------------------------------------------------

/// Whether a failed generation status should trigger credential rotation.
pub fn should_rotate(status: u16) -> bool {
    ROTATE_ON_STATUS.contains(&status)
}

/// Best human-readable message from a failed response.
///
/// Preference: `error.message`, then the JSON of `error`, then the whole JSON
/// body, then the raw body text, then `status_text`.
pub fn extract_error_message(status_text: &str, body: &str) -> String {
    match serde_json::from_str::<serde_json::Value>(body) {
        Ok(json) => match json.get("error") {
            Some(err) if !err.is_null() => match err.get("message").and_then(|m| m.as_str()) {
                Some(message) if !message.is_empty() => message.to_string(),
                _ => err.to_string(),
            },
            _ => json.to_string(),
        },
        Err(_) if !body.trim().is_empty() => body.trim().to_string(),
        Err(_) => status_text.to_string(),
    }
}
