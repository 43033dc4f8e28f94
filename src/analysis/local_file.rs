use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// A downloaded video owned by exactly one analysis.
///
/// The file is removed once: by [`LocalVideoFile::release`], or on drop if the owner
/// never got that far (an error path or a cancelled future). A file that is already
/// gone is not an error.
#[derive(Debug)]
pub struct LocalVideoFile {
    path: PathBuf,
    released: bool,
}

impl LocalVideoFile {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            released: false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Delete the file if it is still there. Returns whether anything was removed.
    pub async fn release(mut self) -> bool {
        self.released = true;

        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => {
                tracing::info!("Cleaning up temporary video file: {}", self.path.display());
                true
            }
            Err(e) if e.kind() == ErrorKind::NotFound => false,
            Err(e) => {
                tracing::warn!("Failed to remove {}: {}", self.path.display(), e);
                false
            }
        }
    }
}

impl Drop for LocalVideoFile {
    fn drop(&mut self) {
        if self.released {
            return;
        }

        match std::fs::remove_file(&self.path) {
            Ok(()) => {
                tracing::info!("Removed abandoned video file: {}", self.path.display());
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => {
                tracing::warn!("Failed to remove {}: {}", self.path.display(), e);
            }
        }
    }
}
