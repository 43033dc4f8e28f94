use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use url::Url;

use super::{StreamInfo, VideoDetails, VideoPlatform, VideoReference};

/// YouTube client backed by yt-dlp
pub struct YoutubePlatform {
    yt_dlp_path: String,
}

/// Subset of the `yt-dlp --dump-json` document we use
#[derive(Debug, Deserialize)]
struct YtDlpInfo {
    id: String,
    title: String,
    description: Option<String>,
    duration: Option<f64>,
    upload_date: Option<String>,
    timestamp: Option<i64>,
    uploader: Option<String>,
    channel: Option<String>,
    view_count: Option<u64>,
    thumbnail: Option<String>,
    #[serde(default)]
    formats: Vec<YtDlpFormat>,
}

#[derive(Debug, Deserialize)]
struct YtDlpFormat {
    format_id: String,
    ext: String,
    vcodec: Option<String>,
    acodec: Option<String>,
    height: Option<u32>,
    filesize: Option<u64>,
    filesize_approx: Option<u64>,
}

impl YoutubePlatform {
    pub fn new(yt_dlp_path: impl Into<String>) -> Self {
        Self {
            yt_dlp_path: yt_dlp_path.into(),
        }
    }

    /// Run `yt-dlp --dump-json` for a single video
    async fn dump_json(&self, url: &str) -> Result<YtDlpInfo> {
        tracing::debug!("Extracting video info for: {}", url);

        let output = Command::new(&self.yt_dlp_path)
            .args(["--dump-json", "--no-playlist", url])
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .with_context(|| format!("Failed to run {}", self.yt_dlp_path))?;

        if !output.status.success() {
            let error = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!("yt-dlp failed: {}", error.trim());
        }

        serde_json::from_slice(&output.stdout).context("Failed to parse yt-dlp output")
    }
}

impl From<YtDlpInfo> for VideoDetails {
    fn from(info: YtDlpInfo) -> Self {
        let publish_date = info
            .timestamp
            .and_then(|ts| DateTime::<Utc>::from_timestamp(ts, 0))
            .or_else(|| info.upload_date.as_deref().and_then(parse_upload_date));

        let streams = info
            .formats
            .into_iter()
            .map(|format| {
                let has_video = format.vcodec.as_deref().map_or(false, |c| c != "none");
                let has_audio = format.acodec.as_deref().map_or(false, |c| c != "none");
                StreamInfo {
                    resolution: format.height.filter(|_| has_video).map(|h| format!("{}p", h)),
                    height: format.height,
                    filesize: format.filesize.or(format.filesize_approx),
                    format_id: format.format_id,
                    extension: format.ext,
                    has_video,
                    has_audio,
                }
            })
            .collect();

        VideoDetails {
            title: info.title,
            description: info.description,
            length_seconds: info.duration.map(|d| d.round() as u64),
            publish_date,
            author: info.uploader.or(info.channel),
            views: info.view_count,
            video_id: info.id,
            thumbnail_url: info.thumbnail,
            streams,
        }
    }
}

/// `YYYYMMDD` as midnight UTC
fn parse_upload_date(value: &str) -> Option<DateTime<Utc>> {
    NaiveDate::parse_from_str(value, "%Y%m%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Extract the 11 character video id from the common YouTube URL shapes
pub fn youtube_video_id(url: &Url) -> Option<String> {
    let host = url.host_str()?.to_lowercase();
    let host = host
        .strip_prefix("www.")
        .or_else(|| host.strip_prefix("m."))
        .or_else(|| host.strip_prefix("music."))
        .unwrap_or(host.as_str());

    let mut segments = url.path_segments()?.filter(|s| !s.is_empty());

    let candidate = match host {
        "youtu.be" => segments.next().map(str::to_string),
        "youtube.com" | "youtube-nocookie.com" => match segments.next() {
            Some("watch") => url
                .query_pairs()
                .find(|(key, _)| key == "v")
                .map(|(_, value)| value.into_owned()),
            Some("embed" | "v" | "shorts" | "live") => segments.next().map(str::to_string),
            _ => None,
        },
        _ => None,
    }?;

    let valid = candidate.len() == 11
        && candidate
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');

    valid.then_some(candidate)
}

#[async_trait]
impl VideoPlatform for YoutubePlatform {
    fn video_id(&self, reference: &VideoReference) -> Option<String> {
        youtube_video_id(reference.url())
    }

    async fn resolve(&self, reference: &VideoReference) -> Result<VideoDetails> {
        let info = self.dump_json(reference.as_str()).await?;
        Ok(info.into())
    }

    async fn download(
        &self,
        reference: &VideoReference,
        stream: &StreamInfo,
        dest_dir: &Path,
    ) -> Result<PathBuf> {
        tokio::fs::create_dir_all(dest_dir)
            .await
            .with_context(|| format!("Failed to create {}", dest_dir.display()))?;

        // Unique per request so concurrent analyses never share a file
        let output_template = dest_dir.join(format!("video_{}.%(ext)s", uuid::Uuid::new_v4()));

        tracing::debug!(
            "Downloading format {} of {} to {}",
            stream.format_id,
            reference,
            dest_dir.display()
        );

        let output = Command::new(&self.yt_dlp_path)
            .arg(reference.as_str())
            .args(["--no-playlist", "--no-progress"])
            .arg("-f")
            .arg(&stream.format_id)
            .arg("--print")
            .arg("after_move:filepath")
            .arg("-o")
            .arg(&output_template)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .with_context(|| format!("Failed to run {}", self.yt_dlp_path))?;

        if !output.status.success() {
            let error = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!("Failed to download video: {}", error.trim());
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let filepath = stdout
            .lines()
            .rev()
            .map(str::trim)
            .find(|line| !line.is_empty())
            .context("yt-dlp did not report the downloaded file")?;

        let path = PathBuf::from(filepath);
        if !path.is_file() {
            anyhow::bail!("Downloaded file is missing: {}", path.display());
        }

        Ok(path)
    }

    fn platform_name(&self) -> &'static str {
        "YouTube"
    }
}
