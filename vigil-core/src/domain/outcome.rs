//! Execution outcome types

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Terminal result of running one job
///
/// `Failure` is a test that ran and did not pass (assertion, script error,
/// timeout). `InfraError` means the worker could not run the test at all or
/// the browser died underneath it.
#[derive(Debug, Clone, PartialEq)]
pub enum ExecutionOutcome {
    Success {
        duration: Duration,
        logs: String,
        video_path: Option<PathBuf>,
        screenshot_path: Option<PathBuf>,
    },
    Failure {
        reason: String,
        duration: Duration,
        logs: String,
        video_path: Option<PathBuf>,
        screenshot_path: Option<PathBuf>,
    },
    InfraError {
        reason: String,
        logs: String,
    },
}

impl ExecutionOutcome {
    pub fn status(&self) -> ReportStatus {
        match self {
            ExecutionOutcome::Success { .. } => ReportStatus::Success,
            ExecutionOutcome::Failure { .. } => ReportStatus::Failed,
            ExecutionOutcome::InfraError { .. } => ReportStatus::Error,
        }
    }

    pub fn duration(&self) -> Duration {
        match self {
            ExecutionOutcome::Success { duration, .. } => *duration,
            ExecutionOutcome::Failure { duration, .. } => *duration,
            ExecutionOutcome::InfraError { .. } => Duration::ZERO,
        }
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            ExecutionOutcome::Success { .. } => None,
            ExecutionOutcome::Failure { reason, .. } => Some(reason),
            ExecutionOutcome::InfraError { reason, .. } => Some(reason),
        }
    }

    pub fn logs(&self) -> &str {
        match self {
            ExecutionOutcome::Success { logs, .. } => logs,
            ExecutionOutcome::Failure { logs, .. } => logs,
            ExecutionOutcome::InfraError { logs, .. } => logs,
        }
    }

    pub fn video_path(&self) -> Option<&Path> {
        match self {
            ExecutionOutcome::Success { video_path, .. } => video_path.as_deref(),
            ExecutionOutcome::Failure { video_path, .. } => video_path.as_deref(),
            ExecutionOutcome::InfraError { .. } => None,
        }
    }

    pub fn screenshot_path(&self) -> Option<&Path> {
        match self {
            ExecutionOutcome::Success {
                screenshot_path, ..
            } => screenshot_path.as_deref(),
            ExecutionOutcome::Failure {
                screenshot_path, ..
            } => screenshot_path.as_deref(),
            ExecutionOutcome::InfraError { .. } => None,
        }
    }

    /// Log text as delivered to the backend
    ///
    /// Non-success outcomes always end with their reason so the backend never
    /// receives an empty log for a failed job.
    pub fn report_logs(&self) -> String {
        match self.reason() {
            None => self.logs().to_string(),
            Some(reason) if self.logs().is_empty() => format!("Reason: {}", reason),
            Some(reason) => format!("{}\nReason: {}", self.logs(), reason),
        }
    }
}

/// Status string understood by the backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportStatus {
    Success,
    Failed,
    Error,
}

impl ReportStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportStatus::Success => "success",
            ReportStatus::Failed => "failed",
            ReportStatus::Error => "error",
        }
    }
}

impl fmt::Display for ReportStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
