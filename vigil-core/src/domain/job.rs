//! Job domain types
//!
//! A [`JobRecord`] is the validated, immutable description of one test job.
//! Raw queue payloads only become job records through [`parse`] (or
//! [`parse_with`]), which either returns a fully defaulted record or a
//! [`ParseError`]. There is no way to build a partially filled record.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// User id recorded when the payload does not carry one
pub const UNKNOWN_USER: &str = "unknown";

/// Browser a job runs in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BrowserKind {
    Chrome,
    Firefox,
}

impl BrowserKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BrowserKind::Chrome => "chrome",
            BrowserKind::Firefox => "firefox",
        }
    }
}

impl fmt::Display for BrowserKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BrowserKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "chrome" => Ok(BrowserKind::Chrome),
            "firefox" => Ok(BrowserKind::Firefox),
            other => Err(format!("unsupported browser '{}'", other)),
        }
    }
}

/// Defaults applied to optional job fields
///
/// The worker derives these from its configuration; [`JobDefaults::default`]
/// gives chrome, not headless, 300 seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JobDefaults {
    pub browser: BrowserKind,
    pub headless: bool,
    pub timeout_seconds: u64,
}

impl Default for JobDefaults {
    fn default() -> Self {
        Self {
            browser: BrowserKind::Chrome,
            headless: false,
            timeout_seconds: 300,
        }
    }
}

/// Errors produced while turning a raw payload into a [`JobRecord`]
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("malformed job payload: {0}")]
    Malformed(String),

    #[error("missing required field: {0}")]
    MissingField(&'static str),

    #[error("invalid value for {field}: {reason}")]
    InvalidField { field: &'static str, reason: String },
}

/// Validated test job
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobRecord {
    test_id: String,
    script: String,
    browser: BrowserKind,
    headless: bool,
    timeout_seconds: u64,
    user_id: String,
}

impl JobRecord {
    pub fn test_id(&self) -> &str {
        &self.test_id
    }

    pub fn script(&self) -> &str {
        &self.script
    }

    pub fn browser(&self) -> BrowserKind {
        self.browser
    }

    pub fn headless(&self) -> bool {
        self.headless
    }

    pub fn timeout_seconds(&self) -> u64 {
        self.timeout_seconds
    }

    /// Wall-clock deadline for the script
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }
}

/// Wire shape of a queued job. Every field is optional here so that missing
/// fields are reported as [`ParseError::MissingField`] rather than as serde errors.
#[derive(Debug, Deserialize)]
struct RawJob {
    test_id: Option<RawTestId>,
    script: Option<String>,
    browser: Option<String>,
    headless: Option<bool>,
    #[serde(alias = "timeout")]
    timeout_seconds: Option<i64>,
    user_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawTestId {
    Text(String),
    Number(serde_json::Number),
}

/// Parses a raw queue payload using the default job settings
pub fn parse(raw: &[u8]) -> Result<JobRecord, ParseError> {
    parse_with(raw, &JobDefaults::default())
}

/// Parses a raw queue payload, filling absent optional fields from `defaults`
pub fn parse_with(raw: &[u8], defaults: &JobDefaults) -> Result<JobRecord, ParseError> {
    let value: serde_json::Value =
        serde_json::from_slice(raw).map_err(|e| ParseError::Malformed(e.to_string()))?;

    if !value.is_object() {
        return Err(ParseError::Malformed(
            "job payload must be a JSON object".to_string(),
        ));
    }

    let raw: RawJob =
        serde_json::from_value(value).map_err(|e| ParseError::Malformed(e.to_string()))?;

    let test_id = match raw.test_id {
        Some(RawTestId::Text(id)) => id.trim().to_string(),
        Some(RawTestId::Number(n)) => n.to_string(),
        None => String::new(),
    };
    if test_id.is_empty() {
        return Err(ParseError::MissingField("test_id"));
    }

    let script = raw
        .script
        .filter(|s| !s.trim().is_empty())
        .ok_or(ParseError::MissingField("script"))?;

    let browser = match raw.browser {
        Some(name) => name
            .parse::<BrowserKind>()
            .map_err(|reason| ParseError::InvalidField {
                field: "browser",
                reason,
            })?,
        None => defaults.browser,
    };

    let timeout_seconds = match raw.timeout_seconds {
        Some(secs) if secs > 0 => secs as u64,
        Some(secs) => {
            return Err(ParseError::InvalidField {
                field: "timeout_seconds",
                reason: format!("must be a positive number of seconds, got {}", secs),
            });
        }
        None => defaults.timeout_seconds,
    };

    let user_id = raw
        .user_id
        .filter(|u| !u.is_empty())
        .unwrap_or_else(|| UNKNOWN_USER.to_string());

    Ok(JobRecord {
        test_id,
        script,
        browser,
        headless: raw.headless.unwrap_or(defaults.headless),
        timeout_seconds,
        user_id,
    })
}
