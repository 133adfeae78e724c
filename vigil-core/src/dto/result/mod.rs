//! Result upload DTO

use std::path::PathBuf;

use crate::domain::outcome::{ExecutionOutcome, ReportStatus};

/// Everything sent to the backend for one finished job
///
/// Artifact paths are attached as files; the upload skips any path that no
/// longer exists on disk.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultUpload {
    pub test_id: String,
    pub status: ReportStatus,
    pub logs: String,
    /// Duration in seconds
    pub duration: f64,
    pub video: Option<PathBuf>,
    pub screenshot: Option<PathBuf>,
}

impl ResultUpload {
    pub fn from_outcome(test_id: &str, outcome: &ExecutionOutcome) -> Self {
        Self {
            test_id: test_id.to_string(),
            status: outcome.status(),
            logs: outcome.report_logs(),
            duration: outcome.duration().as_secs_f64(),
            video: outcome.video_path().map(PathBuf::from),
            screenshot: outcome.screenshot_path().map(PathBuf::from),
        }
    }
}
