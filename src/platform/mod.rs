use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use url::Url;

pub mod youtube;

use crate::{AnalyzerError, Result};

/// A normalized URL identifying a remote video
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoReference {
    url: Url,
}

impl VideoReference {
    /// Normalize and parse a user supplied URL.
    ///
    /// A missing scheme becomes `https://`. Anything that is still not an http(s) URL
    /// with a host is rejected without touching the network.
    pub fn parse(raw: &str) -> Result<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(AnalyzerError::InvalidReference("empty URL".to_string()));
        }

        let normalized = match leading_scheme(raw) {
            Some(scheme)
                if scheme.eq_ignore_ascii_case("http") || scheme.eq_ignore_ascii_case("https") =>
            {
                raw.to_string()
            }
            Some(_) => {
                return Err(AnalyzerError::InvalidReference(format!(
                    "URL must use HTTP or HTTPS protocol: {}",
                    raw
                )))
            }
            None => format!("https://{}", raw),
        };

        let url = Url::parse(&normalized).map_err(|e| {
            AnalyzerError::InvalidReference(format!("Invalid URL format: {} ({})", raw, e))
        })?;

        if url.host_str().map_or(true, str::is_empty) {
            return Err(AnalyzerError::InvalidReference(format!(
                "URL has no host: {}",
                raw
            )));
        }

        Ok(Self { url })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn as_str(&self) -> &str {
        self.url.as_str()
    }
}

/// The `scheme` of a leading `scheme://`, if the input starts with one.
///
/// A `://` further in (inside a path or query) does not count.
fn leading_scheme(raw: &str) -> Option<&str> {
    let (scheme, _) = raw.split_once("://")?;
    let mut chars = scheme.chars();
    let valid = chars.next().map_or(false, |c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'));
    valid.then_some(scheme)
}

impl fmt::Display for VideoReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.url.as_str())
    }
}

/// A downloadable rendition of a video
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamInfo {
    /// Platform specific format selector
    pub format_id: String,

    /// Container extension (mp4, webm, ...)
    pub extension: String,

    /// Display resolution, e.g. `720p`
    pub resolution: Option<String>,

    /// Frame height in pixels
    pub height: Option<u32>,

    /// Size in bytes if the platform reports one
    pub filesize: Option<u64>,

    pub has_video: bool,
    pub has_audio: bool,
}

impl StreamInfo {
    /// Streams carrying both audio and video
    pub fn is_progressive(&self) -> bool {
        self.has_video && self.has_audio
    }
}

/// Everything the platform knows about a video
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoDetails {
    pub title: String,
    pub description: Option<String>,
    pub length_seconds: Option<u64>,
    pub publish_date: Option<DateTime<Utc>>,
    pub author: Option<String>,
    pub views: Option<u64>,
    pub video_id: String,
    pub thumbnail_url: Option<String>,
    pub streams: Vec<StreamInfo>,
}

impl VideoDetails {
    /// The progressive stream with the largest frame height.
    ///
    /// Ties prefer mp4, then the larger file.
    pub fn highest_resolution(&self) -> Option<&StreamInfo> {
        self.streams
            .iter()
            .filter(|stream| stream.is_progressive())
            .max_by_key(|stream| {
                (
                    stream.height.unwrap_or(0),
                    stream.extension == "mp4",
                    stream.filesize.unwrap_or(0),
                )
            })
    }
}

/// Client for the video hosting platform
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait VideoPlatform: Send + Sync {
    /// Extract the video identifier from a reference without any network access
    fn video_id(&self, reference: &VideoReference) -> Option<String>;

    /// Query the platform for details and the available streams
    async fn resolve(&self, reference: &VideoReference) -> anyhow::Result<VideoDetails>;

    /// Download a stream into `dest_dir`, returning the written file
    async fn download(
        &self,
        reference: &VideoReference,
        stream: &StreamInfo,
        dest_dir: &Path,
    ) -> anyhow::Result<PathBuf>;

    /// Get the name of this platform
    fn platform_name(&self) -> &'static str;
}
