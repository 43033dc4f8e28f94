//! Video Analyzer - fetches a YouTube video and merges three independent analyses of it
//!
//! The [`VideoAnalyzer`] downloads the video, asks a multimodal generative model for a
//! scene-by-scene breakdown, collects the platform metadata, transcribes the speech and
//! returns everything as one [`CompositeAnalysis`].

pub mod acquire;
pub mod analysis;
pub mod cli;
pub mod config;
pub mod metadata;
pub mod output;
pub mod platform;
pub mod scenes;
pub mod transcribe;
pub mod utils;

pub use acquire::VideoAcquirer;
pub use analysis::{CompositeAnalysis, LocalVideoFile, VideoAnalyzer};
pub use cli::{Cli, Commands, OutputFormat};
pub use config::Config;
pub use metadata::{Metadata, MetadataCollector};
pub use platform::{VideoPlatform, VideoReference};
pub use scenes::{Scene, SceneAnalyzer, VideoAnalysisResult};
pub use transcribe::{Transcriber, Transcript, TranscriptSegment};

/// Result type used by the analysis core
pub type Result<T> = std::result::Result<T, AnalyzerError>;

/// Failure tag carried by every [`AnalyzerError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Acquisition,
    InvalidReference,
    Metadata,
    Transcription,
    SchemaValidation,
    GenerativeCall,
    Cancelled,
}

/// Error types produced by the analysis core
#[derive(thiserror::Error, Debug)]
pub enum AnalyzerError {
    #[error("Video acquisition failed: {0}")]
    Acquisition(String),

    #[error("Invalid video reference: {0}")]
    InvalidReference(String),

    #[error("Metadata collection failed: {0}")]
    Metadata(String),

    #[error("Transcription failed: {0}")]
    Transcription(String),

    #[error("Scene analysis output does not match the schema: {0}")]
    SchemaValidation(String),

    #[error("Generative model call failed: {0}")]
    GenerativeCall(String),

    #[error("Analysis cancelled")]
    Cancelled,
}

impl AnalyzerError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AnalyzerError::Acquisition(_) => ErrorKind::Acquisition,
            AnalyzerError::InvalidReference(_) => ErrorKind::InvalidReference,
            AnalyzerError::Metadata(_) => ErrorKind::Metadata,
            AnalyzerError::Transcription(_) => ErrorKind::Transcription,
            AnalyzerError::SchemaValidation(_) => ErrorKind::SchemaValidation,
            AnalyzerError::GenerativeCall(_) => ErrorKind::GenerativeCall,
            AnalyzerError::Cancelled => ErrorKind::Cancelled,
        }
    }
}

/// Render an `anyhow` error with its full cause chain
pub(crate) fn describe(err: &anyhow::Error) -> String {
    format!("{:#}", err)
}
