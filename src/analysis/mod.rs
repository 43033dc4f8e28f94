use serde::{Serialize, Serializer};
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::acquire::VideoAcquirer;
use crate::config::{Config, SpeechBackend};
use crate::metadata::{Metadata, MetadataCollector};
use crate::platform::youtube::YoutubePlatform;
use crate::platform::{VideoPlatform, VideoReference};
use crate::scenes::gemini::GeminiClient;
use crate::scenes::{load_video, video_mime_type, SceneAnalyzer, VideoAnalysisResult};
use crate::transcribe::inference::HttpSpeechLoader;
use crate::transcribe::{SpeechModelLoader, Transcriber, Transcript};
use crate::{describe, AnalyzerError, Result};

mod local_file;

pub use local_file::LocalVideoFile;

/// Metadata, transcript and scene breakdown of one video.
///
/// Serializes to a single flat object built by merging the three sources in the order
/// metadata, transcript, scene analysis. When two sources produce the same top-level
/// key the later source wins.
#[derive(Debug, Clone, PartialEq)]
pub struct CompositeAnalysis {
    pub metadata: Metadata,
    pub transcript: Transcript,
    pub analysis: VideoAnalysisResult,
}

impl CompositeAnalysis {
    pub fn new(metadata: Metadata, transcript: Transcript, analysis: VideoAnalysisResult) -> Self {
        Self {
            metadata,
            transcript,
            analysis,
        }
    }

    /// The merged object
    pub fn to_value(&self) -> serde_json::Result<Value> {
        let sections = [
            named_section("metadata", &self.metadata)?,
            named_section("transcript", &self.transcript)?,
            flat_section(&self.analysis)?,
        ];
        Ok(Value::Object(merge_sections(sections)))
    }
}

impl Serialize for CompositeAnalysis {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.to_value()
            .map_err(serde::ser::Error::custom)?
            .serialize(serializer)
    }
}

fn named_section<T: Serialize>(name: &str, value: &T) -> serde_json::Result<Map<String, Value>> {
    let mut section = Map::new();
    section.insert(name.to_string(), serde_json::to_value(value)?);
    Ok(section)
}

fn flat_section<T: Serialize>(value: &T) -> serde_json::Result<Map<String, Value>> {
    match serde_json::to_value(value)? {
        Value::Object(fields) => Ok(fields),
        other => named_section("value", &other),
    }
}

/// Merge sections left to right; later keys replace earlier ones
fn merge_sections<I>(sections: I) -> Map<String, Value>
where
    I: IntoIterator<Item = Map<String, Value>>,
{
    let mut merged = Map::new();
    for section in sections {
        merged.extend(section);
    }
    merged
}

/// Orchestration steps, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    Reference,
    Acquire,
    AnalyzeScenes,
    CollectMetadata,
    Transcribe,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Step::Reference => "reference",
            Step::Acquire => "acquire",
            Step::AnalyzeScenes => "analyze-scenes",
            Step::CollectMetadata => "collect-metadata",
            Step::Transcribe => "transcribe",
        };
        f.write_str(name)
    }
}

fn failed(step: Step) -> impl FnOnce(AnalyzerError) -> AnalyzerError {
    move |err| {
        error!(step = %step, kind = ?err.kind(), "Error during video analysis: {}", err);
        err
    }
}

/// Runs acquisition, scene analysis, metadata collection and transcription for a URL
pub struct VideoAnalyzer {
    acquirer: VideoAcquirer,
    scenes: SceneAnalyzer,
    metadata: MetadataCollector,
    transcriber: Transcriber,
}

impl VideoAnalyzer {
    pub fn new(
        acquirer: VideoAcquirer,
        scenes: SceneAnalyzer,
        metadata: MetadataCollector,
        transcriber: Transcriber,
    ) -> Self {
        Self {
            acquirer,
            scenes,
            metadata,
            transcriber,
        }
    }

    /// Wire the production clients from configuration
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let platform: Arc<dyn VideoPlatform> =
            Arc::new(YoutubePlatform::new(config.platform.yt_dlp_path.clone()));
        let extractor = Arc::new(GeminiClient::new(&config.generative)?);
        let loader = speech_loader(config)?;

        Ok(Self::new(
            VideoAcquirer::new(platform.clone(), config.download_dir()),
            SceneAnalyzer::new(extractor, &config.generative),
            MetadataCollector::new(platform),
            Transcriber::new(loader, &config.speech),
        ))
    }

    /// Analyze the video behind `url`.
    ///
    /// The URL is checked against the platform before anything is downloaded. Steps
    /// then run strictly in order: acquire, analyze scenes, collect metadata,
    /// transcribe. Any failure aborts the whole analysis. The downloaded file is
    /// removed on every exit path.
    pub async fn analyze(&self, url: &str) -> Result<CompositeAnalysis> {
        let reference = VideoReference::parse(url).map_err(failed(Step::Reference))?;
        let video_id = self
            .metadata
            .check(&reference)
            .map_err(failed(Step::Reference))?;
        debug!("Analyzing video {}", video_id);

        let file = self
            .acquirer
            .acquire(&reference)
            .await
            .map_err(failed(Step::Acquire))?;
        info!("Video {} downloaded to: {}", reference, file.path().display());

        let outcome = self.analyze_local(&reference, &file).await;
        file.release().await;

        if outcome.is_ok() {
            info!("Analysis completed successfully");
        }
        outcome
    }

    /// Like [`VideoAnalyzer::analyze`], but gives up with [`AnalyzerError::Cancelled`]
    /// as soon as `token` is cancelled. The downloaded file is still removed.
    pub async fn analyze_with_cancellation(
        &self,
        url: &str,
        token: CancellationToken,
    ) -> Result<CompositeAnalysis> {
        tokio::select! {
            outcome = self.analyze(url) => outcome,
            _ = token.cancelled() => {
                warn!("Analysis of {} cancelled", url);
                Err(AnalyzerError::Cancelled)
            }
        }
    }

    async fn analyze_local(
        &self,
        reference: &VideoReference,
        file: &LocalVideoFile,
    ) -> Result<CompositeAnalysis> {
        // Scene analysis has to read the file before the transcriber consumes it
        let encoded = load_video(file.path())
            .await
            .map_err(|e| AnalyzerError::Acquisition(describe(&e)))
            .map_err(failed(Step::AnalyzeScenes))?;
        let analysis = self
            .scenes
            .analyze(encoded, video_mime_type(file.path()))
            .await
            .map_err(failed(Step::AnalyzeScenes))?;
        info!("Multimodal analysis completed");

        let metadata = self
            .metadata
            .collect(reference)
            .await
            .map_err(failed(Step::CollectMetadata))?;
        info!("Metadata collection completed");

        let transcript = self
            .transcriber
            .transcribe(file.path())
            .await
            .map_err(failed(Step::Transcribe))?;
        info!("Transcript generation completed");

        Ok(CompositeAnalysis::new(metadata, transcript, analysis))
    }
}

fn speech_loader(config: &Config) -> anyhow::Result<Arc<dyn SpeechModelLoader>> {
    match config.speech.backend {
        SpeechBackend::Http => Ok(Arc::new(HttpSpeechLoader::new(&config.speech))),
        SpeechBackend::Whisper => whisper_loader(),
    }
}

#[cfg(feature = "whisper")]
fn whisper_loader() -> anyhow::Result<Arc<dyn SpeechModelLoader>> {
    Ok(Arc::new(crate::transcribe::whisper::WhisperLoader::new()))
}

#[cfg(not(feature = "whisper"))]
fn whisper_loader() -> anyhow::Result<Arc<dyn SpeechModelLoader>> {
    anyhow::bail!("The whisper speech backend requires building with the `whisper` feature")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::{MockVideoPlatform, StreamInfo, VideoDetails};
    use crate::scenes::{
        ExtractionError, ExtractionRequest, MockStructuredExtractor, StructuredExtractor,
    };
    use crate::transcribe::{
        ComputePlan, MockSpeechModel, MockSpeechModelLoader, RecognitionChunk,
        RecognitionOutput, SpeechModel,
    };
    use crate::ErrorKind;
    use async_trait::async_trait;
    use serde_json::json;
    use std::path::PathBuf;
    use std::time::Duration;

    const TEST_VIDEO_URL: &str = "https://www.youtube.com/watch?v=JzLtDZL7Nak";

    fn details() -> VideoDetails {
        VideoDetails {
            title: "Test Video".to_string(),
            description: Some("Test Description".to_string()),
            length_seconds: Some(19),
            publish_date: None,
            author: Some("Test Author".to_string()),
            views: Some(82263),
            video_id: "JzLtDZL7Nak".to_string(),
            thumbnail_url: Some("https://i.ytimg.com/vi/JzLtDZL7Nak/sddefault.jpg".to_string()),
            streams: vec![StreamInfo {
                format_id: "18".to_string(),
                extension: "mp4".to_string(),
                resolution: Some("360p".to_string()),
                height: Some(360),
                filesize: Some(1239637),
                has_video: true,
                has_audio: true,
            }],
        }
    }

    /// Platform whose download writes a real file named `video.mp4` into the target dir
    fn platform() -> MockVideoPlatform {
        let mut platform = MockVideoPlatform::new();
        platform
            .expect_video_id()
            .returning(|_| Some("JzLtDZL7Nak".to_string()));
        platform.expect_resolve().returning(|_| Ok(details()));
        platform.expect_download().returning(|_, _, dir| {
            let path = dir.join("video.mp4");
            std::fs::write(&path, b"test video content")?;
            Ok(path)
        });
        platform.expect_platform_name().return_const("YouTube");
        platform
    }

    fn scene_result() -> Value {
        json!({
            "scenes": [{
                "start_time": 0,
                "end_time": 10,
                "description": "Test scene description",
                "visual_elements": ["test element"],
                "audio_elements": [],
                "mood": "test",
                "key_actions": ["test action"]
            }],
            "summary": "Test summary"
        })
    }

    fn extractor() -> MockStructuredExtractor {
        let mut extractor = MockStructuredExtractor::new();
        extractor
            .expect_extract()
            .times(1)
            .returning(|_| Ok(scene_result()));
        extractor
    }

    fn loader() -> MockSpeechModelLoader {
        let mut loader = MockSpeechModelLoader::new();
        loader.expect_load().returning(|_, _| {
            let mut model = MockSpeechModel::new();
            model.expect_infer().returning(|_, _| {
                Ok(RecognitionOutput {
                    text: "Test transcript".to_string(),
                    chunks: vec![RecognitionChunk {
                        timestamp: (Some(0.0), None),
                        text: "Test transcript".to_string(),
                    }],
                })
            });
            Ok(Arc::new(model) as Arc<dyn SpeechModel>)
        });
        loader
    }

    fn analyzer(
        platform: MockVideoPlatform,
        extractor: impl StructuredExtractor + 'static,
        loader: MockSpeechModelLoader,
        dir: &tempfile::TempDir,
    ) -> VideoAnalyzer {
        let config = Config::default();
        let platform: Arc<dyn VideoPlatform> = Arc::new(platform);
        VideoAnalyzer::new(
            VideoAcquirer::new(platform.clone(), dir.path().to_path_buf()),
            SceneAnalyzer::new(Arc::new(extractor), &config.generative),
            MetadataCollector::new(platform),
            Transcriber::new(Arc::new(loader), &config.speech)
                .with_compute_plan(ComputePlan::select(false)),
        )
    }

    fn video_path(dir: &tempfile::TempDir) -> PathBuf {
        dir.path().join("video.mp4")
    }

    #[tokio::test]
    async fn test_analyze_merges_all_sources() {
        let dir = tempfile::tempdir().unwrap();
        let analyzer = analyzer(platform(), extractor(), loader(), &dir);

        let result = analyzer.analyze(TEST_VIDEO_URL).await.unwrap();
        assert_eq!(result.transcript.segments[0].end_time, None);
        assert_eq!(result.analysis.scenes[0].end_time, 10.0);

        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["metadata"]["title"], "Test Video");
        assert_eq!(value["metadata"]["duration_seconds"], 19);
        assert_eq!(value["metadata"]["resolution"], "360p");
        assert_eq!(value["transcript"]["text"], "Test transcript");
        assert!(value["transcript"]["segments"][0]["end_time"].is_null());
        assert_eq!(value["scenes"][0]["end_time"], 10.0);
        assert_eq!(value["summary"], "Test summary");
        assert_eq!(value.as_object().unwrap().len(), 4);

        assert!(!video_path(&dir).exists());
    }

    #[tokio::test]
    async fn test_download_failure_skips_downstream() {
        let dir = tempfile::tempdir().unwrap();

        let mut platform = MockVideoPlatform::new();
        platform
            .expect_video_id()
            .times(1)
            .returning(|_| Some("JzLtDZL7Nak".to_string()));
        platform.expect_resolve().times(1).returning(|_| Ok(details()));
        platform
            .expect_download()
            .returning(|_, _, _| Err(anyhow::anyhow!("Download failed")));
        platform.expect_platform_name().return_const("YouTube");

        let mut extractor = MockStructuredExtractor::new();
        extractor.expect_extract().never();
        let mut loader = MockSpeechModelLoader::new();
        loader.expect_load().never();

        let analyzer = analyzer(platform, extractor, loader, &dir);
        let err = analyzer.analyze(TEST_VIDEO_URL).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Acquisition);
        assert!(err.to_string().contains("Download failed"));
    }

    #[tokio::test]
    async fn test_invalid_reference_touches_nothing() {
        let dir = tempfile::tempdir().unwrap();

        let mut platform = MockVideoPlatform::new();
        platform.expect_resolve().never();
        platform.expect_download().never();
        let mut extractor = MockStructuredExtractor::new();
        extractor.expect_extract().never();

        let analyzer = analyzer(platform, extractor, MockSpeechModelLoader::new(), &dir);
        let err = analyzer.analyze("ftp://example.com/video").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidReference);
    }

    #[tokio::test]
    async fn test_foreign_url_rejected_before_download() {
        let dir = tempfile::tempdir().unwrap();

        let mut platform = MockVideoPlatform::new();
        platform.expect_video_id().times(1).returning(|_| None);
        platform.expect_resolve().never();
        platform.expect_download().never();
        platform.expect_platform_name().return_const("YouTube");
        let mut extractor = MockStructuredExtractor::new();
        extractor.expect_extract().never();
        let mut loader = MockSpeechModelLoader::new();
        loader.expect_load().never();

        let analyzer = analyzer(platform, extractor, loader, &dir);
        let err = analyzer.analyze("https://vimeo.com/12345").await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::InvalidReference);
        assert!(err.to_string().contains("vimeo.com/12345"));
    }

    #[tokio::test]
    async fn test_schema_failure_cleans_up_and_stops() {
        let dir = tempfile::tempdir().unwrap();

        let mut platform = MockVideoPlatform::new();
        platform.expect_resolve().times(1).returning(|_| Ok(details()));
        platform.expect_download().returning(|_, _, dir| {
            let path = dir.join("video.mp4");
            std::fs::write(&path, b"test video content")?;
            Ok(path)
        });
        platform
            .expect_video_id()
            .times(1)
            .returning(|_| Some("JzLtDZL7Nak".to_string()));
        platform.expect_platform_name().return_const("YouTube");

        let mut extractor = MockStructuredExtractor::new();
        extractor
            .expect_extract()
            .returning(|_| Ok(json!({"scenes": "none", "summary": 3})));
        let mut loader = MockSpeechModelLoader::new();
        loader.expect_load().never();

        let analyzer = analyzer(platform, extractor, loader, &dir);
        let err = analyzer.analyze(TEST_VIDEO_URL).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::SchemaValidation);
        assert!(!video_path(&dir).exists());
    }

    #[tokio::test]
    async fn test_metadata_failure_cleans_up() {
        let dir = tempfile::tempdir().unwrap();

        let mut platform = MockVideoPlatform::new();
        platform
            .expect_video_id()
            .returning(|_| Some("JzLtDZL7Nak".to_string()));
        let mut calls = 0;
        platform.expect_resolve().times(2).returning(move |_| {
            calls += 1;
            if calls == 1 {
                Ok(details())
            } else {
                Err(anyhow::anyhow!("HTTP Error 429: Too Many Requests"))
            }
        });
        platform.expect_download().returning(|_, _, dir| {
            let path = dir.join("video.mp4");
            std::fs::write(&path, b"test video content")?;
            Ok(path)
        });
        platform.expect_platform_name().return_const("YouTube");

        let mut loader = MockSpeechModelLoader::new();
        loader.expect_load().never();

        let analyzer = analyzer(platform, extractor(), loader, &dir);
        let err = analyzer.analyze(TEST_VIDEO_URL).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Metadata);
        assert!(!video_path(&dir).exists());
    }

    #[tokio::test]
    async fn test_transcription_failure_cleans_up() {
        let dir = tempfile::tempdir().unwrap();

        let mut loader = MockSpeechModelLoader::new();
        loader
            .expect_load()
            .returning(|_, _| Err(anyhow::anyhow!("model weights missing")));

        let analyzer = analyzer(platform(), extractor(), loader, &dir);
        let err = analyzer.analyze(TEST_VIDEO_URL).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Transcription);
        assert!(err.to_string().contains("model weights missing"));
        assert!(!video_path(&dir).exists());
    }

    /// Never answers, so the analysis can only end through cancellation
    struct StalledExtractor;

    #[async_trait]
    impl StructuredExtractor for StalledExtractor {
        async fn extract(
            &self,
            _request: &ExtractionRequest,
        ) -> std::result::Result<Value, ExtractionError> {
            std::future::pending().await
        }
    }

    #[tokio::test]
    async fn test_cancellation_still_cleans_up() {
        let dir = tempfile::tempdir().unwrap();
        let mut loader = MockSpeechModelLoader::new();
        loader.expect_load().never();
        let analyzer = analyzer(platform(), StalledExtractor, loader, &dir);

        let token = CancellationToken::new();
        let trigger = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.cancel();
        });

        let err = analyzer
            .analyze_with_cancellation(TEST_VIDEO_URL, token)
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Cancelled);
        assert!(!video_path(&dir).exists());
    }

    #[test]
    fn test_later_sections_win_on_collision() {
        let mut metadata = Map::new();
        metadata.insert("summary".to_string(), json!("from metadata"));
        metadata.insert("title".to_string(), json!("kept"));
        let mut transcript = Map::new();
        transcript.insert("summary".to_string(), json!("from transcript"));
        let mut analysis = Map::new();
        analysis.insert("summary".to_string(), json!("from analysis"));

        let merged = merge_sections([metadata, transcript, analysis]);
        assert_eq!(merged["summary"], "from analysis");
        assert_eq!(merged["title"], "kept");
    }
}
