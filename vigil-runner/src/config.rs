//! Worker configuration
//!
//! Defines every tunable of the worker: queue and backend endpoints, job
//! defaults, browser/recorder settings and the retry and grace periods used
//! by the orchestrator.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use vigil_core::domain::job::{BrowserKind, JobDefaults};

/// Worker configuration
///
/// All timeouts and intervals are configurable to allow tuning
/// for different deployment scenarios (dev vs prod, fast vs slow networks).
#[derive(Debug, Clone)]
pub struct Config {
    /// Identifier of this worker instance, used in logs
    pub worker_id: String,

    /// Redis URL of the job queue
    pub redis_url: String,

    /// Name of the Redis list holding job payloads
    pub queue_name: String,

    /// Backend base URL (e.g., "http://backend:8080")
    pub backend_url: String,

    /// Root of the shared output directory
    pub output_dir: PathBuf,

    /// Defaults applied to optional job fields
    pub job_defaults: JobDefaults,

    pub chromedriver_url: String,
    pub geckodriver_url: String,

    /// X display the recorder captures
    pub display: String,

    /// Whether non-headless jobs are recorded
    pub record_video: bool,

    /// Recorder binary
    pub ffmpeg_path: String,

    /// Back-off when the queue is empty
    pub poll_interval: Duration,

    /// Back-off after a queue error
    pub error_backoff: Duration,

    /// Delivery attempts per result before giving up
    pub report_max_attempts: u32,

    /// Delay before the first delivery retry; doubles on every further retry
    pub report_initial_backoff: Duration,

    /// How long a recorder gets to stop on its own before it is killed
    pub recorder_grace_period: Duration,

    /// Upper bound on browser session teardown
    pub session_stop_timeout: Duration,
}

impl Config {
    /// Creates a new configuration with defaults
    pub fn new(worker_id: String) -> Self {
        Self {
            worker_id,
            redis_url: "redis://localhost:6379".to_string(),
            queue_name: "test_jobs".to_string(),
            backend_url: "http://backend:8080".to_string(),
            output_dir: PathBuf::from("./output"),
            job_defaults: JobDefaults::default(),
            chromedriver_url: "http://localhost:9515".to_string(),
            geckodriver_url: "http://localhost:4444".to_string(),
            display: ":99".to_string(),
            record_video: true,
            ffmpeg_path: "ffmpeg".to_string(),
            poll_interval: Duration::from_secs(5),
            error_backoff: Duration::from_secs(10),
            report_max_attempts: 5,
            report_initial_backoff: Duration::from_millis(1000),
            recorder_grace_period: Duration::from_secs(10),
            session_stop_timeout: Duration::from_secs(15),
        }
    }

    /// Creates configuration from environment variables
    ///
    /// Every variable is optional; unset or unparsable values fall back to the
    /// defaults of [`Config::new`]:
    /// - WORKER_ID (default: random UUID)
    /// - REDIS_URL, QUEUE_NAME, BACKEND_URL, OUTPUT_DIR
    /// - DEFAULT_BROWSER, DEFAULT_HEADLESS, DEFAULT_TIMEOUT (seconds)
    /// - CHROMEDRIVER_URL, GECKODRIVER_URL, DISPLAY, RECORD_VIDEO, FFMPEG_PATH
    /// - POLL_INTERVAL, ERROR_BACKOFF (seconds)
    /// - REPORT_MAX_ATTEMPTS, REPORT_INITIAL_BACKOFF_MS
    /// - RECORDER_GRACE_PERIOD, SESSION_STOP_TIMEOUT (seconds)
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let worker_id = lookup("WORKER_ID")
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        let defaults = Self::new(worker_id);

        let string = |key: &str, default: String| lookup(key).unwrap_or(default);
        let parsed = |key: &str| lookup(key).and_then(|s| s.trim().parse::<u64>().ok());
        let secs = |key: &str, default: Duration| {
            parsed(key).map(Duration::from_secs).unwrap_or(default)
        };

        let job_defaults = JobDefaults {
            browser: lookup("DEFAULT_BROWSER")
                .and_then(|s| BrowserKind::from_str(&s).ok())
                .unwrap_or(defaults.job_defaults.browser),
            headless: lookup("DEFAULT_HEADLESS")
                .and_then(|s| parse_bool(&s))
                .unwrap_or(defaults.job_defaults.headless),
            timeout_seconds: parsed("DEFAULT_TIMEOUT")
                .unwrap_or(defaults.job_defaults.timeout_seconds),
        };

        Self {
            redis_url: string("REDIS_URL", defaults.redis_url),
            queue_name: string("QUEUE_NAME", defaults.queue_name),
            backend_url: string("BACKEND_URL", defaults.backend_url),
            output_dir: lookup("OUTPUT_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.output_dir),
            job_defaults,
            chromedriver_url: string("CHROMEDRIVER_URL", defaults.chromedriver_url),
            geckodriver_url: string("GECKODRIVER_URL", defaults.geckodriver_url),
            display: string("DISPLAY", defaults.display),
            record_video: lookup("RECORD_VIDEO")
                .and_then(|s| parse_bool(&s))
                .unwrap_or(defaults.record_video),
            ffmpeg_path: string("FFMPEG_PATH", defaults.ffmpeg_path),
            poll_interval: secs("POLL_INTERVAL", defaults.poll_interval),
            error_backoff: secs("ERROR_BACKOFF", defaults.error_backoff),
            report_max_attempts: parsed("REPORT_MAX_ATTEMPTS")
                .map(|n| n as u32)
                .unwrap_or(defaults.report_max_attempts),
            report_initial_backoff: parsed("REPORT_INITIAL_BACKOFF_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.report_initial_backoff),
            recorder_grace_period: secs("RECORDER_GRACE_PERIOD", defaults.recorder_grace_period),
            session_stop_timeout: secs("SESSION_STOP_TIMEOUT", defaults.session_stop_timeout),
            worker_id: defaults.worker_id,
        }
    }

    pub fn videos_dir(&self) -> PathBuf {
        self.output_dir.join("videos")
    }

    pub fn screenshots_dir(&self) -> PathBuf {
        self.output_dir.join("screenshots")
    }

    pub fn downloads_dir(&self) -> PathBuf {
        self.output_dir.join("downloads")
    }

    /// Validates the configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.worker_id.is_empty() {
            anyhow::bail!("worker_id cannot be empty");
        }

        if !self.redis_url.starts_with("redis://") && !self.redis_url.starts_with("rediss://") {
            anyhow::bail!("redis_url must start with redis:// or rediss://");
        }

        if self.queue_name.is_empty() {
            anyhow::bail!("queue_name cannot be empty");
        }

        for (name, url) in [
            ("backend_url", &self.backend_url),
            ("chromedriver_url", &self.chromedriver_url),
            ("geckodriver_url", &self.geckodriver_url),
        ] {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                anyhow::bail!("{} must start with http:// or https://", name);
            }
        }

        if self.job_defaults.timeout_seconds == 0 {
            anyhow::bail!("default timeout must be greater than 0");
        }

        if self.poll_interval.is_zero() {
            anyhow::bail!("poll_interval must be greater than 0");
        }

        if self.error_backoff.is_zero() {
            anyhow::bail!("error_backoff must be greater than 0");
        }

        if self.report_max_attempts == 0 {
            anyhow::bail!("report_max_attempts must be at least 1");
        }

        if self.record_video && self.display.is_empty() {
            anyhow::bail!("display cannot be empty when video recording is enabled");
        }

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new(uuid::Uuid::new_v4().to_string())
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
