//! Job payload DTO
//!
//! The producer side of the queue format parsed by [`crate::domain::job::parse`].

use serde::{Deserialize, Serialize};

use crate::domain::job::BrowserKind;

/// A job as pushed onto the queue
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobPayload {
    pub test_id: String,
    pub script: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub browser: Option<BrowserKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub headless: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_seconds: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}

impl JobPayload {
    pub fn new(test_id: impl Into<String>, script: impl Into<String>) -> Self {
        Self {
            test_id: test_id.into(),
            script: script.into(),
            browser: None,
            headless: None,
            timeout_seconds: None,
            user_id: None,
        }
    }

    pub fn to_bytes(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }
}
