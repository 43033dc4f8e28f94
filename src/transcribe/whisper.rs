use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::process::Command;
use whisper_rs::{FullParams, SamplingStrategy, WhisperContext, WhisperContextParameters};

use super::{
    ComputePlan, InferenceOptions, Precision, RecognitionChunk, RecognitionOutput, SpeechModel,
    SpeechModelLoader,
};
use crate::utils::normalize_language_code;

/// Loads ggml whisper models from disk; `model_id` is the model file path
#[derive(Default)]
pub struct WhisperLoader;

pub struct WhisperSpeechModel {
    context: Arc<WhisperContext>,
}

impl WhisperLoader {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl SpeechModelLoader for WhisperLoader {
    async fn load(&self, model_id: &str, plan: ComputePlan) -> Result<Arc<dyn SpeechModel>> {
        let model_path = model_id.to_string();

        let context = tokio::task::spawn_blocking(move || {
            let params = WhisperContextParameters {
                use_gpu: plan.is_accelerated(),
                flash_attn: plan.precision == Precision::Half,
                ..Default::default()
            };
            WhisperContext::new_with_params(&model_path, params)
                .map_err(|e| anyhow::anyhow!("Failed to load whisper model {}: {:?}", model_path, e))
        })
        .await
        .context("Model loading task panicked")??;

        Ok(Arc::new(WhisperSpeechModel {
            context: Arc::new(context),
        }))
    }
}

/// Decode the audio track to 16 kHz mono PCM with ffmpeg
async fn extract_audio(video_path: &Path, audio_path: &Path) -> Result<()> {
    let output = Command::new("ffmpeg")
        .arg("-y")
        .arg("-i")
        .arg(video_path)
        .args(["-vn", "-acodec", "pcm_s16le", "-ar", "16000", "-ac", "1"])
        .arg(audio_path)
        .kill_on_drop(true)
        .output()
        .await
        .context("Failed to run ffmpeg")?;

    if !output.status.success() {
        anyhow::bail!(
            "ffmpeg failed for {}: {}",
            video_path.display(),
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }

    Ok(())
}

fn read_samples(audio_path: &Path) -> Result<Vec<f32>> {
    let mut reader = hound::WavReader::open(audio_path)
        .with_context(|| format!("Failed to open {}", audio_path.display()))?;

    reader
        .samples::<i16>()
        .map(|s| s.map(|s| s as f32 / i16::MAX as f32))
        .collect::<std::result::Result<Vec<_>, _>>()
        .context("Failed to decode audio samples")
}

/// Convert whisper segments (centisecond bounds plus text) into recognition output
fn collect_segments<I>(segments: I) -> RecognitionOutput
where
    I: IntoIterator<Item = (i64, i64, String)>,
{
    let mut text = String::new();
    let mut chunks = Vec::new();
    for (start, end, segment_text) in segments {
        text.push_str(&segment_text);
        chunks.push(RecognitionChunk {
            timestamp: (Some(start as f64 / 100.0), Some(end as f64 / 100.0)),
            text: segment_text,
        });
    }

    RecognitionOutput { text, chunks }
}

/// Decode `video_path` to a wav inside `work_dir` and hand it to `run` on a blocking
/// thread. The wav is removed on every path, including a failed decode.
async fn with_decoded_audio<T, F>(video_path: &Path, work_dir: &Path, run: F) -> Result<T>
where
    F: FnOnce(PathBuf) -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    let audio_path = work_dir.join(format!("audio_{}.wav", uuid::Uuid::new_v4()));
    let result = decode_and_run(video_path, &audio_path, run).await;

    match tokio::fs::remove_file(&audio_path).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!("Failed to remove {}: {}", audio_path.display(), e),
    }

    result
}

async fn decode_and_run<T, F>(video_path: &Path, audio_path: &Path, run: F) -> Result<T>
where
    F: FnOnce(PathBuf) -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    extract_audio(video_path, audio_path).await?;
    let wav = audio_path.to_path_buf();
    tokio::task::spawn_blocking(move || run(wav))
        .await
        .context("Inference task panicked")?
}

#[async_trait]
impl SpeechModel for WhisperSpeechModel {
    async fn infer(&self, path: &Path, options: &InferenceOptions) -> Result<RecognitionOutput> {
        let context = self.context.clone();
        let language = normalize_language_code(&options.language);
        let translate = options.task == "translate";

        with_decoded_audio(path, &std::env::temp_dir(), move |wav| {
            let samples = read_samples(&wav)?;

            let mut params = FullParams::new(SamplingStrategy::Greedy { best_of: 1 });
            params.set_language(Some(&language));
            params.set_translate(translate);
            params.set_print_progress(false);
            params.set_print_realtime(false);

            let mut state = context
                .create_state()
                .map_err(|e| anyhow::anyhow!("Failed to create whisper state: {:?}", e))?;
            state
                .full(params, &samples)
                .map_err(|e| anyhow::anyhow!("Whisper inference failed: {:?}", e))?;

            // Segments may split a multibyte character; keep them all, lossily decoded
            let segments = state
                .as_iter()
                .map(|segment| -> Result<(i64, i64, String)> {
                    let text = segment
                        .to_str_lossy()
                        .map_err(|e| anyhow::anyhow!("Failed to read whisper segment: {:?}", e))?
                        .into_owned();
                    Ok((segment.start_timestamp(), segment.end_timestamp(), text))
                })
                .collect::<Result<Vec<_>>>()?;

            Ok(collect_segments(segments))
        })
        .await
    }
}
