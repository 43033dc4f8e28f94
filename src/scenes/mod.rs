use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use schemars::gen::SchemaSettings;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::Path;
use std::sync::Arc;

use crate::config::GenerativeConfig;
use crate::{AnalyzerError, Result};

pub mod gemini;
pub mod prompt;

pub use prompt::VIDEO_ANALYSIS_PROMPT;

/// MIME type declared when the container is not recognized
pub const DEFAULT_VIDEO_MIME_TYPE: &str = "video/mp4";

/// MIME type matching the container of a downloaded video
pub fn video_mime_type(path: &Path) -> &'static str {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase);

    match extension.as_deref() {
        Some("webm") => "video/webm",
        Some("mov") => "video/quicktime",
        Some("mkv") => "video/x-matroska",
        Some("3gp") => "video/3gpp",
        Some("flv") => "video/x-flv",
        Some("mpeg" | "mpg") => "video/mpeg",
        Some("avi") => "video/x-msvideo",
        _ => DEFAULT_VIDEO_MIME_TYPE,
    }
}

/// One temporal segment of the video as described by the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Scene {
    /// Start time of the scene in seconds
    pub start_time: f64,

    /// End time of the scene in seconds
    pub end_time: f64,

    /// Detailed description of the scene content
    pub description: String,

    /// Key visual elements present in the scene
    #[serde(default)]
    pub visual_elements: Vec<String>,

    /// Key audio elements present in the scene
    #[serde(default)]
    pub audio_elements: Vec<String>,

    /// The overall mood or atmosphere of the scene
    #[serde(default)]
    pub mood: String,

    /// Main actions or events happening in the scene
    #[serde(default)]
    pub key_actions: Vec<String>,
}

/// Scene breakdown of a whole video
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct VideoAnalysisResult {
    /// Analyzed scenes in chronological order
    pub scenes: Vec<Scene>,

    /// Brief summary of the entire video content
    pub summary: String,
}

/// Inline media attached to an extraction request
#[derive(Debug, Clone, PartialEq)]
pub struct MediaPart {
    pub mime_type: String,
    pub data_base64: String,
}

/// A single schema-constrained generation request
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractionRequest {
    pub model: String,
    pub temperature: f32,
    pub prompt: String,
    pub media: MediaPart,
    /// JSON schema the response has to follow
    pub schema: Value,
}

#[derive(thiserror::Error, Debug)]
pub enum ExtractionError {
    #[error("gave up after {attempts} attempts: {message}")]
    Transient { attempts: u32, message: String },

    #[error("request rejected: {0}")]
    Rejected(String),

    #[error("response is not valid JSON: {0}")]
    Malformed(String),
}

impl From<ExtractionError> for AnalyzerError {
    fn from(err: ExtractionError) -> Self {
        match err {
            ExtractionError::Malformed(_) => AnalyzerError::SchemaValidation(err.to_string()),
            _ => AnalyzerError::GenerativeCall(err.to_string()),
        }
    }
}

/// A generative model client that returns JSON shaped by a declared schema.
///
/// Conformance is never assumed: callers validate the returned value.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait StructuredExtractor: Send + Sync {
    async fn extract(&self, request: &ExtractionRequest) -> std::result::Result<Value, ExtractionError>;
}

/// Keywords the response schema may carry
const SCHEMA_KEYWORDS: &[&str] = &[
    "type",
    "format",
    "description",
    "nullable",
    "enum",
    "properties",
    "required",
    "items",
    "minItems",
    "maxItems",
];

fn restrict_schema(schema: &Value) -> Value {
    let Value::Object(object) = schema else {
        return schema.clone();
    };

    let mut restricted = Map::new();
    for (key, value) in object {
        if !SCHEMA_KEYWORDS.contains(&key.as_str()) {
            continue;
        }
        let value = match (key.as_str(), value) {
            ("properties", Value::Object(properties)) => Value::Object(
                properties
                    .iter()
                    .map(|(name, property)| (name.clone(), restrict_schema(property)))
                    .collect(),
            ),
            ("items", items) => restrict_schema(items),
            _ => value.clone(),
        };
        restricted.insert(key.clone(), value);
    }
    Value::Object(restricted)
}

/// Response schema for [`VideoAnalysisResult`] with every sub-schema inlined
pub fn response_schema() -> Value {
    let schema = SchemaSettings::openapi3()
        .with(|settings| settings.inline_subschemas = true)
        .into_generator()
        .into_root_schema_for::<VideoAnalysisResult>();

    restrict_schema(&serde_json::to_value(schema).unwrap_or(Value::Null))
}

/// Read a video file and base64 encode it
pub async fn load_video(path: &Path) -> anyhow::Result<String> {
    let bytes = tokio::fs::read(path).await?;
    Ok(STANDARD.encode(bytes))
}

/// Produces the scene breakdown of an encoded video
pub struct SceneAnalyzer {
    extractor: Arc<dyn StructuredExtractor>,
    model: String,
    temperature: f32,
    prompt: String,
    schema: Value,
}

impl SceneAnalyzer {
    pub fn new(extractor: Arc<dyn StructuredExtractor>, config: &GenerativeConfig) -> Self {
        Self {
            extractor,
            model: config.model.clone(),
            temperature: config.temperature,
            prompt: VIDEO_ANALYSIS_PROMPT.to_string(),
            schema: response_schema(),
        }
    }

    pub fn with_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = prompt.into();
        self
    }

    /// Ask the model for a scene breakdown and validate it.
    ///
    /// Output that does not deserialize into [`VideoAnalysisResult`] is a
    /// [`AnalyzerError::SchemaValidation`]; it is never repaired or retried here.
    pub async fn analyze(
        &self,
        video_base64: String,
        mime_type: &str,
    ) -> Result<VideoAnalysisResult> {
        let request = ExtractionRequest {
            model: self.model.clone(),
            temperature: self.temperature,
            prompt: self.prompt.clone(),
            media: MediaPart {
                mime_type: mime_type.to_string(),
                data_base64: video_base64,
            },
            schema: self.schema.clone(),
        };

        let value = self.extractor.extract(&request).await?;

        let result: VideoAnalysisResult = serde_json::from_value(value)
            .map_err(|e| AnalyzerError::SchemaValidation(e.to_string()))?;

        tracing::debug!("Model returned {} scenes", result.scenes.len());
        Ok(result)
    }
}
