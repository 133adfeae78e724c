//! Error taxonomy of the job pipeline
//!
//! Only [`DeliveryError`] is ever retried. Everything else is terminal for the
//! job it happened in and ends up as an execution outcome or a discard.

use std::time::Duration;
use thiserror::Error;

use crate::lease::DriverError;

/// Resources could not be acquired, or the browser died under a script
#[derive(Debug, Error)]
pub enum InfraError {
    #[error("failed to acquire resources: {0}")]
    Acquire(String),

    #[error("browser crashed: {0}")]
    Crash(String),
}

/// Script execution did not produce a verdict
#[derive(Debug, Error)]
pub enum ExecuteError {
    #[error("script exceeded its {}s timeout", limit.as_secs())]
    Timeout { limit: Duration, log_text: String },

    #[error("browser session lost: {reason}")]
    Crash { reason: String, log_text: String },
}

impl ExecuteError {
    /// Script log collected up to the point of the error
    pub fn log_text(&self) -> &str {
        match self {
            ExecuteError::Timeout { log_text, .. } | ExecuteError::Crash { log_text, .. } => {
                log_text
            }
        }
    }
}

/// An artifact could not be produced; the job carries on without it
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("screenshot failed: {0}")]
    Screenshot(#[from] DriverError),

    #[error("screenshot timed out after {0:?}")]
    Timeout(Duration),

    #[error("failed to write artifact: {0}")]
    Io(#[from] std::io::Error),
}

/// A result could not be delivered to the backend
#[derive(Debug, Error)]
#[error("delivery failed after {attempts} attempt(s): {last_error}")]
pub struct DeliveryError {
    pub attempts: u32,
    pub last_error: String,
}
