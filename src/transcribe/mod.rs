use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::OnceCell;

use crate::config::SpeechConfig;
use crate::{describe, AnalyzerError, Result};

pub mod compute;
pub mod inference;
#[cfg(feature = "whisper")]
pub mod whisper;

pub use compute::{ComputeDevice, ComputePlan, Precision};

/// Time-aligned transcript of a video's speech
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transcript {
    /// Full recognized text
    pub text: String,

    /// Chunks in chronological order
    pub segments: Vec<TranscriptSegment>,
}

/// One recognized speech chunk
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptSegment {
    /// Start time in seconds
    pub start_time: Option<f64>,

    /// End time in seconds; absent for an open-ended final chunk
    pub end_time: Option<f64>,

    pub text: String,
}

/// Options passed to every inference call
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InferenceOptions {
    pub return_timestamps: bool,
    pub task: String,
    pub language: String,
}

/// Raw output of the speech model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecognitionOutput {
    pub text: String,
    #[serde(default)]
    pub chunks: Vec<RecognitionChunk>,
}

/// A chunk as reported by the model: `[start, end]` plus text, either bound may be null
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecognitionChunk {
    pub timestamp: (Option<f64>, Option<f64>),
    pub text: String,
}

impl From<RecognitionOutput> for Transcript {
    fn from(output: RecognitionOutput) -> Self {
        let segments = output
            .chunks
            .into_iter()
            .map(|chunk| TranscriptSegment {
                start_time: chunk.timestamp.0,
                end_time: chunk.timestamp.1,
                text: chunk.text,
            })
            .collect();

        Transcript {
            text: output.text,
            segments,
        }
    }
}

/// A loaded speech model together with its pre/post-processor
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SpeechModel: Send + Sync {
    async fn infer(&self, path: &Path, options: &InferenceOptions) -> anyhow::Result<RecognitionOutput>;
}

/// Loads speech models by identifier
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SpeechModelLoader: Send + Sync {
    async fn load(&self, model_id: &str, plan: ComputePlan) -> anyhow::Result<Arc<dyn SpeechModel>>;
}

/// Runs speech recognition over a local video and consumes the file
pub struct Transcriber {
    loader: Arc<dyn SpeechModelLoader>,
    model_id: String,
    language: String,
    plan: Option<ComputePlan>,
    cache: Option<OnceCell<Arc<dyn SpeechModel>>>,
}

impl Transcriber {
    pub fn new(loader: Arc<dyn SpeechModelLoader>, config: &SpeechConfig) -> Self {
        Self {
            loader,
            model_id: config.model_id.clone(),
            language: config.language.clone(),
            plan: None,
            cache: config.cache_model.then(OnceCell::new),
        }
    }

    /// Skip hardware detection and always use `plan`
    pub fn with_compute_plan(mut self, plan: ComputePlan) -> Self {
        self.plan = Some(plan);
        self
    }

    fn options(&self) -> InferenceOptions {
        InferenceOptions {
            return_timestamps: true,
            task: "transcribe".to_string(),
            language: self.language.clone(),
        }
    }

    async fn load_model(&self) -> anyhow::Result<Arc<dyn SpeechModel>> {
        let plan = match self.plan {
            Some(plan) => plan,
            None => ComputePlan::detect().await,
        };

        tracing::info!("Loading speech model {} on {}", self.model_id, plan);
        self.loader.load(&self.model_id, plan).await
    }

    async fn model(&self) -> anyhow::Result<Arc<dyn SpeechModel>> {
        match &self.cache {
            Some(cell) => cell.get_or_try_init(|| self.load_model()).await.cloned(),
            None => self.load_model().await,
        }
    }

    /// Transcribe the file at `path`, deleting it once the transcript is built.
    ///
    /// On failure the file is left in place for the caller to clean up.
    pub async fn transcribe(&self, path: &Path) -> Result<Transcript> {
        let model = self
            .model()
            .await
            .map_err(|e| AnalyzerError::Transcription(describe(&e)))?;

        let output = model
            .infer(path, &self.options())
            .await
            .map_err(|e| AnalyzerError::Transcription(describe(&e)))?;

        let transcript = Transcript::from(output);
        tracing::debug!("Recognized {} segments", transcript.segments.len());

        match tokio::fs::remove_file(path).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                return Err(AnalyzerError::Transcription(format!(
                    "Failed to remove {}: {}",
                    path.display(),
                    e
                )))
            }
        }

        Ok(transcript)
    }
}
