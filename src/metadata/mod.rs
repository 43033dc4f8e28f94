use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::platform::{VideoPlatform, VideoReference};
use crate::{describe, AnalyzerError, Result};

/// Upload timestamps are rendered without a zone suffix
pub const UPLOAD_DATE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Descriptive metadata reported by the platform
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    pub title: String,
    pub description: Option<String>,
    pub duration_seconds: Option<u64>,
    pub upload_date: Option<String>,
    pub author: Option<String>,
    pub views: Option<u64>,
    pub video_id: String,
    pub thumbnail_url: Option<String>,
    pub resolution: Option<String>,
    pub file_size: Option<u64>,
}

/// Reads metadata for a URL straight from the platform. Never touches local files.
pub struct MetadataCollector {
    platform: Arc<dyn VideoPlatform>,
}

impl MetadataCollector {
    pub fn new(platform: Arc<dyn VideoPlatform>) -> Self {
        Self { platform }
    }

    /// Normalize a raw URL and collect its metadata
    pub async fn collect_url(&self, url: &str) -> Result<Metadata> {
        let reference = VideoReference::parse(url)?;
        self.collect(&reference).await
    }

    /// The platform video id of `reference`, without any network access
    pub fn check(&self, reference: &VideoReference) -> Result<String> {
        self.platform.video_id(reference).ok_or_else(|| {
            AnalyzerError::InvalidReference(format!(
                "Not a {} video URL: {}",
                self.platform.platform_name(),
                reference
            ))
        })
    }

    /// Collect metadata for an already normalized reference.
    ///
    /// A reference the platform cannot extract an id from fails before any network call.
    pub async fn collect(&self, reference: &VideoReference) -> Result<Metadata> {
        self.check(reference)?;

        tracing::debug!("Collecting metadata for {}", reference);

        let details = self
            .platform
            .resolve(reference)
            .await
            .map_err(|e| AnalyzerError::Metadata(describe(&e)))?;

        let best = details.highest_resolution();

        Ok(Metadata {
            resolution: best.and_then(|s| s.resolution.clone()),
            file_size: best.and_then(|s| s.filesize),
            title: details.title,
            description: details.description,
            duration_seconds: details.length_seconds,
            upload_date: details
                .publish_date
                .map(|date| date.format(UPLOAD_DATE_FORMAT).to_string()),
            author: details.author,
            views: details.views,
            video_id: details.video_id,
            thumbnail_url: details.thumbnail_url,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::{MockVideoPlatform, StreamInfo, VideoDetails};
    use chrono::{TimeZone, Utc};
    use std::sync::Mutex;

    fn details() -> VideoDetails {
        VideoDetails {
            title: "Test Video".to_string(),
            description: Some("Test Description".to_string()),
            length_seconds: Some(19),
            publish_date: Some(Utc.with_ymd_and_hms(2022, 10, 28, 5, 8, 30).unwrap()),
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

    fn platform_ok() -> MockVideoPlatform {
        let mut platform = MockVideoPlatform::new();
        platform
            .expect_video_id()
            .returning(|_| Some("JzLtDZL7Nak".to_string()));
        platform.expect_resolve().returning(|_| Ok(details()));
        platform.expect_platform_name().return_const("YouTube");
        platform
    }

    #[tokio::test]
    async fn test_collect_metadata_success() {
        let collector = MetadataCollector::new(Arc::new(platform_ok()));
        let metadata = collector
            .collect_url("https://www.youtube.com/watch?v=JzLtDZL7Nak")
            .await
            .unwrap();

        assert_eq!(metadata.title, "Test Video");
        assert_eq!(metadata.description.as_deref(), Some("Test Description"));
        assert_eq!(metadata.duration_seconds, Some(19));
        assert_eq!(metadata.upload_date.as_deref(), Some("2022-10-28T05:08:30"));
        assert_eq!(metadata.author.as_deref(), Some("Test Author"));
        assert_eq!(metadata.video_id, "JzLtDZL7Nak");
        assert_eq!(metadata.resolution.as_deref(), Some("360p"));
        assert_eq!(metadata.file_size, Some(1239637));
    }

    #[tokio::test]
    async fn test_missing_scheme_resolves_identically() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let recorder = seen.clone();

        let mut platform = MockVideoPlatform::new();
        platform
            .expect_video_id()
            .returning(|_| Some("x".to_string()));
        platform.expect_resolve().times(2).returning(move |reference| {
            recorder.lock().unwrap().push(reference.as_str().to_string());
            Ok(details())
        });
        platform.expect_platform_name().return_const("YouTube");

        let collector = MetadataCollector::new(Arc::new(platform));
        let bare = collector.collect_url("example.com/x").await.unwrap();
        let full = collector.collect_url("https://example.com/x").await.unwrap();

        assert_eq!(bare, full);
        let seen = seen.lock().unwrap();
        assert_eq!(seen[0], "https://example.com/x");
        assert_eq!(seen[0], seen[1]);
    }

    #[tokio::test]
    async fn test_collect_metadata_is_idempotent() {
        let collector = MetadataCollector::new(Arc::new(platform_ok()));
        let url = "https://www.youtube.com/watch?v=JzLtDZL7Nak";
        let first = collector.collect_url(url).await.unwrap();
        let second = collector.collect_url(url).await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_invalid_url_fails_without_network() {
        let mut platform = MockVideoPlatform::new();
        platform.expect_video_id().returning(|_| None);
        platform.expect_resolve().never();
        platform.expect_platform_name().return_const("YouTube");

        let collector = MetadataCollector::new(Arc::new(platform));
        let err = collector.collect_url("invalid-url").await.unwrap_err();
        assert!(matches!(err, AnalyzerError::InvalidReference(_)));

        let err = collector.collect_url("ftp://example.com").await.unwrap_err();
        assert!(matches!(err, AnalyzerError::InvalidReference(_)));
    }

    #[test]
    fn test_check_returns_video_id() {
        let collector = MetadataCollector::new(Arc::new(platform_ok()));
        let reference = VideoReference::parse("youtu.be/JzLtDZL7Nak").unwrap();
        assert_eq!(collector.check(&reference).unwrap(), "JzLtDZL7Nak");
    }

    #[tokio::test]
    async fn test_platform_failure_is_metadata_error() {
        let mut platform = MockVideoPlatform::new();
        platform
            .expect_video_id()
            .returning(|_| Some("JzLtDZL7Nak".to_string()));
        platform
            .expect_resolve()
            .returning(|_| Err(anyhow::anyhow!("Video unavailable")));
        platform.expect_platform_name().return_const("YouTube");

        let collector = MetadataCollector::new(Arc::new(platform));
        let err = collector
            .collect_url("youtube.com/watch?v=JzLtDZL7Nak")
            .await
            .unwrap_err();
        assert!(matches!(err, AnalyzerError::Metadata(ref m) if m == "Video unavailable"));
    }
}
