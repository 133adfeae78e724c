//! Resource lease
//!
//! A [`Lease`] pairs one browser session with its recording (or with an
//! explicit "not recording"). [`ResourceManager::acquire`] starts both
//! concurrently and hands out a lease only when everything requested is
//! running; anything that did start is torn down again before the error is
//! returned.
//!
//! Lease lifecycle:
//! ```text
//! Unacquired -> Acquiring -> Active -> Releasing -> Released
//!                   \___________________________/
//!                      (partial acquisition)
//! ```
//!
//! [`Lease::release`] is the only sanctioned way out of `Active` and may be
//! called any number of times. A lease dropped without release kills its
//! recorder and schedules a session stop.

pub mod browser;
pub mod recorder;

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use vigil_core::domain::job::BrowserKind;

pub use browser::{BrowserDriver, BrowserOptions, BrowserSession, DriverError, WebDriverBrowser};
pub use recorder::{FfmpegRecorder, Recorder, RecorderError, Recording};

use crate::error::InfraError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeaseState {
    Unacquired,
    Acquiring,
    Active,
    Releasing,
    Released,
}

impl fmt::Display for LeaseState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LeaseState::Unacquired => "unacquired",
            LeaseState::Acquiring => "acquiring",
            LeaseState::Active => "active",
            LeaseState::Releasing => "releasing",
            LeaseState::Released => "released",
        };
        f.write_str(s)
    }
}

/// Whether a lease should record, and where to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordingTarget {
    Disabled,
    Enabled { output_path: PathBuf },
}

/// Acquires leases against one browser driver and one recorder
pub struct ResourceManager {
    driver: Arc<dyn BrowserDriver>,
    recorder: Arc<dyn Recorder>,
    display: String,
    download_dir: PathBuf,
    grace_period: Duration,
    session_stop_timeout: Duration,
}

impl ResourceManager {
    pub fn new(
        driver: Arc<dyn BrowserDriver>,
        recorder: Arc<dyn Recorder>,
        display: impl Into<String>,
        download_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            driver,
            recorder,
            display: display.into(),
            download_dir: download_dir.into(),
            grace_period: Duration::from_secs(10),
            session_stop_timeout: Duration::from_secs(15),
        }
    }

    pub fn with_timeouts(mut self, grace_period: Duration, session_stop_timeout: Duration) -> Self {
        self.grace_period = grace_period;
        self.session_stop_timeout = session_stop_timeout;
        self
    }

    /// Start a browser session and, if requested, a recording
    ///
    /// Both are started concurrently. If either fails, whatever did start is
    /// released and the lease goes straight from `Acquiring` to `Released`.
    pub async fn acquire(
        &self,
        browser: BrowserKind,
        headless: bool,
        target: RecordingTarget,
    ) -> Result<Lease, InfraError> {
        let mut lease = Lease::new(self.grace_period, self.session_stop_timeout);
        lease.state = LeaseState::Acquiring;

        let options = BrowserOptions {
            kind: browser,
            headless,
            download_dir: self.download_dir.clone(),
        };

        let recording = async {
            match &target {
                RecordingTarget::Disabled => Ok(None),
                RecordingTarget::Enabled { output_path } => self
                    .recorder
                    .start(&self.display, output_path)
                    .await
                    .map(Some),
            }
        };

        let (session, recording) = tokio::join!(self.driver.start(&options), recording);

        let mut failures = Vec::new();
        match session {
            Ok(session) => lease.session = Some(session),
            Err(e) => failures.push(format!("browser: {}", e)),
        }
        match recording {
            Ok(recording) => lease.recording = recording,
            Err(e) => failures.push(format!("recorder: {}", e)),
        }

        if !failures.is_empty() {
            let reason = failures.join("; ");
            warn!("Partial acquisition, tearing down: {}", reason);
            lease.release().await;
            return Err(InfraError::Acquire(reason));
        }

        lease.state = LeaseState::Active;
        info!(
            browser = %browser,
            headless,
            recording = lease.is_recording(),
            "Resources acquired"
        );
        Ok(lease)
    }
}

/// Exclusive ownership of one browser session and its recording
pub struct Lease {
    state: LeaseState,
    session: Option<Arc<dyn BrowserSession>>,
    recording: Option<Box<dyn Recording>>,
    finalized: Option<PathBuf>,
    usable: bool,
    grace_period: Duration,
    session_stop_timeout: Duration,
}

impl Lease {
    fn new(grace_period: Duration, session_stop_timeout: Duration) -> Self {
        Self {
            state: LeaseState::Unacquired,
            session: None,
            recording: None,
            finalized: None,
            usable: true,
            grace_period,
            session_stop_timeout,
        }
    }

    pub fn state(&self) -> LeaseState {
        self.state
    }

    /// The live session, while the lease is active
    pub fn session(&self) -> Option<Arc<dyn BrowserSession>> {
        match self.state {
            LeaseState::Active => self.session.clone(),
            _ => None,
        }
    }

    /// Whether a recording was started for this lease
    pub fn is_recording(&self) -> bool {
        self.recording.is_some() || self.finalized.is_some()
    }

    /// Flag the session as unresponsive, e.g. after a script timeout
    pub fn mark_unusable(&mut self) {
        self.usable = false;
    }

    /// Stop the recorder and return the video path
    ///
    /// `None` means no recording was ever started for this lease. Calling it
    /// again returns the same path.
    pub async fn finish_recording(&mut self) -> Option<PathBuf> {
        if let Some(mut recording) = self.recording.take() {
            let path = recording.stop(self.grace_period).await;
            self.finalized = Some(path);
        }
        self.finalized.clone()
    }

    /// Release everything the lease holds
    ///
    /// Idempotent. The recorder is stopped first (bounded by the grace
    /// period, then killed), then the session (bounded by the session stop
    /// timeout, then abandoned).
    pub async fn release(&mut self) {
        if matches!(self.state, LeaseState::Releasing | LeaseState::Released) {
            debug!("Lease already {}", self.state);
            return;
        }
        self.state = LeaseState::Releasing;

        self.finish_recording().await;

        if let Some(session) = self.session.take() {
            if !self.usable {
                debug!(session_id = %session.id(), "Stopping unusable session");
            }
            match tokio::time::timeout(self.session_stop_timeout, session.stop()).await {
                Ok(Ok(())) => debug!(session_id = %session.id(), "Session stopped"),
                Ok(Err(e)) => warn!(session_id = %session.id(), "Failed to stop session: {}", e),
                Err(_) => warn!(
                    session_id = %session.id(),
                    "Session did not stop within {:?}, abandoning it",
                    self.session_stop_timeout
                ),
            }
        }

        self.state = LeaseState::Released;
        debug!("Lease released");
    }

    #[cfg(test)]
    pub(crate) fn recording_path(&self) -> Option<&std::path::Path> {
        self.recording
            .as_ref()
            .map(|r| r.output_path())
            .or(self.finalized.as_deref())
    }
}

impl Drop for Lease {
    fn drop(&mut self) {
        if matches!(self.state, LeaseState::Released | LeaseState::Unacquired) {
            return;
        }

        warn!("Lease dropped while {}, forcing cleanup", self.state);

        if let Some(recording) = self.recording.as_mut() {
            recording.force_kill();
        }

        if let Some(session) = self.session.take() {
            if let Ok(handle) = tokio::runtime::Handle::try_current() {
                handle.spawn(async move {
                    if let Err(e) = session.stop().await {
                        warn!("Failed to stop session of dropped lease: {}", e);
                    }
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeDriver, FakeRecorder};
    use std::path::Path;

    fn manager(driver: &Arc<FakeDriver>, recorder: &Arc<FakeRecorder>) -> ResourceManager {
        ResourceManager::new(driver.clone(), recorder.clone(), ":99", "/tmp/downloads")
            .with_timeouts(Duration::from_millis(100), Duration::from_millis(100))
    }

    fn recording_to(path: &str) -> RecordingTarget {
        RecordingTarget::Enabled {
            output_path: PathBuf::from(path),
        }
    }

    #[tokio::test]
    async fn test_acquire_and_release() {
        let driver = Arc::new(FakeDriver::new());
        let recorder = Arc::new(FakeRecorder::new());
        let manager = manager(&driver, &recorder);

        let mut lease = manager
            .acquire(BrowserKind::Chrome, false, recording_to("/out/videos/t1.mp4"))
            .await
            .unwrap();

        assert_eq!(lease.state(), LeaseState::Active);
        assert!(lease.session().is_some());
        assert!(lease.is_recording());
        assert_eq!(lease.recording_path(), Some(Path::new("/out/videos/t1.mp4")));
        assert_eq!(driver.started(), 1);
        assert_eq!(recorder.started(), 1);

        lease.release().await;
        assert_eq!(lease.state(), LeaseState::Released);
        assert!(lease.session().is_none());
        assert_eq!(driver.stopped(), 1);
        assert_eq!(recorder.stopped(), 1);
    }

    #[tokio::test]
    async fn test_release_is_idempotent() {
        let driver = Arc::new(FakeDriver::new());
        let recorder = Arc::new(FakeRecorder::new());
        let manager = manager(&driver, &recorder);

        let mut lease = manager
            .acquire(BrowserKind::Firefox, false, recording_to("/out/videos/t1.mp4"))
            .await
            .unwrap();

        lease.release().await;
        lease.release().await;
        drop(lease);

        assert_eq!(driver.stopped(), 1);
        assert_eq!(recorder.stopped(), 1);
        assert_eq!(recorder.killed(), 0);
    }

    #[tokio::test]
    async fn test_recording_disabled_is_explicit() {
        let driver = Arc::new(FakeDriver::new());
        let recorder = Arc::new(FakeRecorder::new());
        let manager = manager(&driver, &recorder);

        let mut lease = manager
            .acquire(BrowserKind::Chrome, true, RecordingTarget::Disabled)
            .await
            .unwrap();

        assert!(!lease.is_recording());
        assert_eq!(lease.finish_recording().await, None);
        assert_eq!(recorder.started(), 0);
        lease.release().await;
    }

    #[tokio::test]
    async fn test_recorder_failure_tears_down_browser() {
        let driver = Arc::new(FakeDriver::new());
        let recorder = Arc::new(FakeRecorder::failing());
        let manager = manager(&driver, &recorder);

        let err = manager
            .acquire(BrowserKind::Chrome, false, recording_to("/out/videos/t1.mp4"))
            .await
            .err()
            .unwrap();

        assert!(matches!(err, InfraError::Acquire(ref reason) if reason.contains("recorder")));
        assert_eq!(driver.started(), 1);
        assert_eq!(driver.stopped(), 1);
    }

    #[tokio::test]
    async fn test_browser_failure_tears_down_recorder() {
        let driver = Arc::new(FakeDriver::failing());
        let recorder = Arc::new(FakeRecorder::new());
        let manager = manager(&driver, &recorder);

        let err = manager
            .acquire(BrowserKind::Chrome, false, recording_to("/out/videos/t1.mp4"))
            .await
            .err()
            .unwrap();

        assert!(matches!(err, InfraError::Acquire(ref reason) if reason.contains("browser")));
        assert_eq!(recorder.started(), 1);
        assert_eq!(recorder.stopped(), 1);
    }

    #[tokio::test]
    async fn test_finish_recording_keeps_path() {
        let driver = Arc::new(FakeDriver::new());
        let recorder = Arc::new(FakeRecorder::new());
        let manager = manager(&driver, &recorder);

        let mut lease = manager
            .acquire(BrowserKind::Chrome, false, recording_to("/out/videos/t1.mp4"))
            .await
            .unwrap();

        let path = lease.finish_recording().await;
        assert_eq!(path, Some(PathBuf::from("/out/videos/t1.mp4")));
        assert_eq!(lease.finish_recording().await, path);

        lease.release().await;
        assert_eq!(recorder.stopped(), 1);
    }

    #[tokio::test]
    async fn test_dropped_lease_kills_recorder() {
        let driver = Arc::new(FakeDriver::new());
        let recorder = Arc::new(FakeRecorder::new());
        let manager = manager(&driver, &recorder);

        let lease = manager
            .acquire(BrowserKind::Chrome, false, recording_to("/out/videos/t1.mp4"))
            .await
            .unwrap();
        drop(lease);

        assert_eq!(recorder.killed(), 1);
        // The session stop runs on a spawned task
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(driver.stopped(), 1);
    }
}
