use std::path::PathBuf;
use std::sync::Arc;

use crate::analysis::LocalVideoFile;
use crate::platform::{VideoPlatform, VideoReference};
use crate::{describe, AnalyzerError, Result};

/// Downloads the best progressive stream of a video to transient storage
pub struct VideoAcquirer {
    platform: Arc<dyn VideoPlatform>,
    download_dir: PathBuf,
}

impl VideoAcquirer {
    pub fn new(platform: Arc<dyn VideoPlatform>, download_dir: PathBuf) -> Self {
        Self {
            platform,
            download_dir,
        }
    }

    /// Resolve the reference, pick the highest resolution stream and download it.
    ///
    /// The returned file is owned by the caller. A single failed attempt is final.
    pub async fn acquire(&self, reference: &VideoReference) -> Result<LocalVideoFile> {
        let details = self
            .platform
            .resolve(reference)
            .await
            .map_err(|e| AnalyzerError::Acquisition(describe(&e)))?;

        let stream = details.highest_resolution().ok_or_else(|| {
            AnalyzerError::Acquisition(format!(
                "No progressive stream available for {}",
                reference
            ))
        })?;

        tracing::info!(
            "Downloading {} stream of {} ({})",
            stream.resolution.as_deref().unwrap_or("unknown"),
            details.video_id,
            self.platform.platform_name()
        );

        let path = self
            .platform
            .download(reference, stream, &self.download_dir)
            .await
            .map_err(|e| AnalyzerError::Acquisition(describe(&e)))?;

        Ok(LocalVideoFile::new(path))
    }
}
