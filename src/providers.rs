use serde::{Deserialize, Serialize};

/// Image-inference model requested from the primary image provider.
pub const IMAGE_MODEL_ID: &str = "runware:100@1";
pub const IMAGE_STEPS: u32 = 20;
pub const IMAGE_CFG_SCALE: u32 = 7;

pub const TASK_AUTHENTICATION: &str = "authentication";
pub const TASK_IMAGE_INFERENCE: &str = "imageInference";

/// Generation method a catalog entry must declare to be selectable.
pub const GENERATE_CONTENT_METHOD: &str = "generateContent";

// -- Text provider: generation request --------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeminiPart {
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeminiContent {
    pub parts: Vec<GeminiPart>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    pub temperature: f32,
    pub top_k: u32,
    pub top_p: f32,
    pub max_output_tokens: u32,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        GenerationConfig {
            temperature: 0.7,
            top_k: 40,
            top_p: 0.95,
            max_output_tokens: 2048,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentRequest {
    pub contents: Vec<GeminiContent>,
    pub generation_config: GenerationConfig,
}

impl GenerateContentRequest {
    /// A single-turn request carrying `text` with the fixed sampling parameters.
    pub fn single(text: impl Into<String>) -> Self {
        GenerateContentRequest {
            contents: vec![GeminiContent {
                parts: vec![GeminiPart { text: text.into() }],
            }],
            generation_config: GenerationConfig::default(),
        }
    }
}

// -- Text provider: generation response -------------------------------------

#[derive(Debug, Deserialize)]
pub struct CandidatePart {
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CandidateContent {
    #[serde(default)]
    pub parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
pub struct Candidate {
    #[serde(default)]
    pub content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
pub struct GenerateContentResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
}

impl GenerateContentResponse {
    /// Text of the first part of the first candidate, if any.
    pub fn first_text(&self) -> Option<&str> {
        self.candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .and_then(|c| c.parts.first())
            .and_then(|p| p.text.as_deref())
    }
}

// -- Text provider: model catalog -------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelInfo {
    pub name: String,
    #[serde(default)]
    pub supported_generation_methods: Vec<String>,
}

impl ModelInfo {
    pub fn supports_generate_content(&self) -> bool {
        self.supported_generation_methods
            .iter()
            .any(|m| m == GENERATE_CONTENT_METHOD)
    }
}

#[derive(Debug, Deserialize)]
pub struct ModelList {
    #[serde(default)]
    pub models: Vec<ModelInfo>,
}

// -- Image provider: client frames ------------------------------------------

/// One task inside a client→server frame. Frames are JSON arrays of tasks.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "taskType")]
pub enum ClientTask {
    #[serde(rename = "authentication")]
    Authentication {
        #[serde(rename = "apiKey")]
        api_key: String,
    },
    #[serde(rename = "imageInference")]
    ImageInference {
        #[serde(rename = "taskUUID")]
        task_uuid: String,
        #[serde(rename = "positivePrompt")]
        positive_prompt: String,
        width: u32,
        height: u32,
        #[serde(rename = "numberResults")]
        number_results: u32,
        #[serde(rename = "modelId")]
        model_id: String,
        seed: u64,
        steps: u32,
        #[serde(rename = "CFGScale")]
        cfg_scale: u32,
    },
}

// -- Image provider: server frames ------------------------------------------

#[derive(Debug, Deserialize)]
pub struct ServerTask {
    #[serde(rename = "taskType", default)]
    pub task_type: String,
    #[serde(rename = "imageURL", default)]
    pub image_url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ServerFrame {
    #[serde(default)]
    pub data: Vec<ServerTask>,
    #[serde(default, alias = "errors")]
    pub error: Option<serde_json::Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generation_config_defaults() {
        let cfg = GenerationConfig::default();
        assert_eq!(cfg.top_k, 40);
        assert_eq!(cfg.max_output_tokens, 2048);
        assert!((cfg.temperature - 0.7).abs() < f32::EPSILON);
        assert!((cfg.top_p - 0.95).abs() < f32::EPSILON);
    }

    #[test]
    fn test_generate_request_serializes_camel_case() {
        let req = GenerateContentRequest::single("hello");
        let v: serde_json::Value = serde_json::to_value(&req).expect("serialize");
        assert_eq!(v["contents"][0]["parts"][0]["text"], "hello");
        assert_eq!(v["generationConfig"]["topK"], 40);
        assert_eq!(v["generationConfig"]["maxOutputTokens"], 2048);
        assert!(v["generationConfig"].get("top_k").is_none());
    }

    #[test]
    fn test_generate_response_first_text() {
        let json = r#"{"candidates":[{"content":{"parts":[{"text":"Hi there"}]}}]}"#;
        let resp: GenerateContentResponse = serde_json::from_str(json).expect("deser");
        assert_eq!(resp.first_text(), Some("Hi there"));
    }

    #[test]
    fn test_generate_response_without_candidates() {
        let resp: GenerateContentResponse = serde_json::from_str("{}").expect("deser");
        assert!(resp.first_text().is_none());
    }

    #[test]
    fn test_generate_response_candidate_without_content() {
        let json = r#"{"candidates":[{"finishReason":"SAFETY"}]}"#;
        let resp: GenerateContentResponse = serde_json::from_str(json).expect("deser");
        assert!(resp.first_text().is_none());
    }

    #[test]
    fn test_model_list_deserializes() {
        let json = r#"{"models":[{"name":"models/gemini-pro","supportedGenerationMethods":["generateContent","countTokens"]},{"name":"models/embedding-001","supportedGenerationMethods":["embedContent"]}]}"#;
        let list: ModelList = serde_json::from_str(json).expect("deser");
        assert_eq!(list.models.len(), 2);
        assert!(list.models[0].supports_generate_content());
        assert!(!list.models[1].supports_generate_content());
    }

    #[test]
    fn test_model_without_methods_is_not_selectable() {
        let m: ModelInfo = serde_json::from_str(r#"{"name":"models/x"}"#).expect("deser");
        assert!(!m.supports_generate_content());
    }

    #[test]
    fn test_auth_task_serializes() {
        let frame = vec![ClientTask::Authentication { api_key: "k".to_string() }];
        let json = serde_json::to_string(&frame).expect("serialize");
        assert_eq!(json, r#"[{"taskType":"authentication","apiKey":"k"}]"#);
    }

    #[test]
    fn test_inference_task_field_names() {
        let task = ClientTask::ImageInference {
            task_uuid: "id-1".to_string(),
            positive_prompt: "a cat".to_string(),
            width: 1024,
            height: 1792,
            number_results: 1,
            model_id: IMAGE_MODEL_ID.to_string(),
            seed: 42,
            steps: IMAGE_STEPS,
            cfg_scale: IMAGE_CFG_SCALE,
        };
        let v = serde_json::to_value(&task).expect("serialize");
        assert_eq!(v["taskType"], "imageInference");
        assert_eq!(v["taskUUID"], "id-1");
        assert_eq!(v["positivePrompt"], "a cat");
        assert_eq!(v["numberResults"], 1);
        assert_eq!(v["modelId"], "runware:100@1");
        assert_eq!(v["CFGScale"], 7);
        assert_eq!(v["steps"], 20);
    }

    #[test]
    fn test_server_frame_image_result() {
        let json = r#"{"data":[{"taskType":"imageInference","taskUUID":"x","imageURL":"https://im.example/a.png"}]}"#;
        let frame: ServerFrame = serde_json::from_str(json).expect("deser");
        assert!(frame.error.is_none());
        assert_eq!(frame.data[0].task_type, TASK_IMAGE_INFERENCE);
        assert_eq!(frame.data[0].image_url.as_deref(), Some("https://im.example/a.png"));
    }

    #[test]
    fn test_server_frame_errors_alias() {
        let json = r#"{"errors":[{"code":"invalidApiKey"}]}"#;
        let frame: ServerFrame = serde_json::from_str(json).expect("deser");
        assert!(frame.error.is_some());
        assert!(frame.data.is_empty());
    }
}
