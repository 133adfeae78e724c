//! Artifact capture
//!
//! Screenshots and recordings land in the output root shared by every worker:
//!
//! ```text
//! <output>/screenshots/<test_id>_<tag>_<timestamp>.png
//! <output>/videos/<test_id>_<timestamp>.mp4
//! ```
//!
//! The timestamp has microsecond resolution, so two captures only collide if
//! the same test id and tag are captured within the same microsecond.

use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::CaptureError;
use crate::lease::{BrowserSession, Lease};

/// Upper bound on a single screenshot
pub const SCREENSHOT_TIMEOUT: Duration = Duration::from_secs(10);

const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S_%6f";

#[derive(Debug, Clone)]
pub struct ArtifactCapture {
    screenshots_dir: PathBuf,
    videos_dir: PathBuf,
}

impl ArtifactCapture {
    pub fn new(screenshots_dir: impl Into<PathBuf>, videos_dir: impl Into<PathBuf>) -> Self {
        Self {
            screenshots_dir: screenshots_dir.into(),
            videos_dir: videos_dir.into(),
        }
    }

    pub fn screenshot_path(&self, test_id: &str, tag: &str, at: DateTime<Utc>) -> PathBuf {
        self.screenshots_dir.join(format!(
            "{}_{}_{}.png",
            sanitize(test_id),
            sanitize(tag),
            at.format(TIMESTAMP_FORMAT)
        ))
    }

    pub fn video_path(&self, test_id: &str, at: DateTime<Utc>) -> PathBuf {
        self.videos_dir.join(format!(
            "{}_{}.mp4",
            sanitize(test_id),
            at.format(TIMESTAMP_FORMAT)
        ))
    }

    /// Save a screenshot of the session under `tag`
    pub async fn screenshot(
        &self,
        session: &dyn BrowserSession,
        test_id: &str,
        tag: &str,
    ) -> Result<PathBuf, CaptureError> {
        let png = match tokio::time::timeout(SCREENSHOT_TIMEOUT, session.screenshot_png()).await {
            Ok(png) => png?,
            Err(_) => return Err(CaptureError::Timeout(SCREENSHOT_TIMEOUT)),
        };

        let path = self.screenshot_path(test_id, tag, Utc::now());
        write_artifact(&path, &png).await?;
        debug!(path = %path.display(), "Screenshot saved");
        Ok(path)
    }

    /// Like [`ArtifactCapture::screenshot`], but a failure only logs a warning
    pub async fn screenshot_best_effort(
        &self,
        session: &dyn BrowserSession,
        test_id: &str,
        tag: &str,
    ) -> Option<PathBuf> {
        match self.screenshot(session, test_id, tag).await {
            Ok(path) => Some(path),
            Err(e) => {
                warn!(tag, "Screenshot skipped: {}", e);
                None
            }
        }
    }

    /// Stop the lease's recording and return the video path
    ///
    /// `None` only when the lease never recorded.
    pub async fn finalize_recording(&self, lease: &mut Lease) -> Option<PathBuf> {
        let path = lease.finish_recording().await;
        if let Some(path) = &path {
            debug!(path = %path.display(), "Recording finalized");
        }
        path
    }
}

async fn write_artifact(path: &Path, bytes: &[u8]) -> Result<(), CaptureError> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(path, bytes).await?;
    Ok(())
}

/// Keeps ids usable as file name components
fn sanitize(component: &str) -> String {
    component
        .chars()
        .map(|c| match c {
            'a'..='z' | 'A'..='Z' | '0'..='9' | '-' | '_' | '.' => c,
            _ => '_',
        })
        .collect::<String>()
        .trim_start_matches('.')
        .to_string()
}
