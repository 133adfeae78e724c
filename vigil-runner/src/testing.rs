//! In-memory collaborators for tests
//!
//! Every fake counts what was started and stopped so tests can check that
//! nothing leaks, and each can be told to fail.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use vigil_core::dto::result::ResultUpload;

use crate::lease::{
    BrowserDriver, BrowserOptions, BrowserSession, DriverError, Recorder, RecorderError, Recording,
};
use crate::repository::{JobQueue, ResultRepository};

/// Knobs for sessions handed out by [`FakeDriver`]
#[derive(Debug, Clone, Default)]
pub struct SessionBehavior {
    /// `open` kills the session and reports it gone
    pub crash_on_open: bool,
    pub screenshot_fails: bool,
    /// `screenshot_png` panics
    pub screenshot_panics: bool,
}

pub struct FakeDriver {
    started: AtomicUsize,
    stopped: Arc<AtomicUsize>,
    fail: bool,
    behavior: SessionBehavior,
    sessions: Mutex<Vec<Arc<FakeSession>>>,
}

impl FakeDriver {
    pub fn new() -> Self {
        Self::with_behavior(SessionBehavior::default())
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new()
        }
    }

    pub fn with_behavior(behavior: SessionBehavior) -> Self {
        Self {
            started: AtomicUsize::new(0),
            stopped: Arc::new(AtomicUsize::new(0)),
            fail: false,
            behavior,
            sessions: Mutex::new(Vec::new()),
        }
    }

    /// Start attempts, successful or not
    pub fn started(&self) -> usize {
        self.started.load(Ordering::SeqCst)
    }

    pub fn stopped(&self) -> usize {
        self.stopped.load(Ordering::SeqCst)
    }

    pub fn last_session(&self) -> Option<Arc<FakeSession>> {
        self.sessions.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl BrowserDriver for FakeDriver {
    async fn start(&self, options: &BrowserOptions) -> Result<Arc<dyn BrowserSession>, DriverError> {
        let n = self.started.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(DriverError::Unreachable("connection refused".to_string()));
        }

        let session = Arc::new(FakeSession {
            id: format!("{}-{}", options.kind, n),
            alive: AtomicBool::new(true),
            stopped: self.stopped.clone(),
            behavior: self.behavior.clone(),
            visited: Mutex::new(Vec::new()),
        });
        self.sessions.lock().unwrap().push(session.clone());
        Ok(session)
    }
}

pub struct FakeSession {
    id: String,
    alive: AtomicBool,
    stopped: Arc<AtomicUsize>,
    behavior: SessionBehavior,
    visited: Mutex<Vec<String>>,
}

impl FakeSession {
    pub fn visited(&self) -> Vec<String> {
        self.visited.lock().unwrap().clone()
    }

    fn check(&self) -> Result<(), DriverError> {
        if self.alive.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(DriverError::SessionGone("invalid session id".to_string()))
        }
    }
}

#[async_trait]
impl BrowserSession for FakeSession {
    fn id(&self) -> &str {
        &self.id
    }

    async fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    async fn stop(&self) -> Result<(), DriverError> {
        self.alive.store(false, Ordering::SeqCst);
        self.stopped.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn navigate(&self, url: &str) -> Result<(), DriverError> {
        self.check()?;
        if self.behavior.crash_on_open {
            self.alive.store(false, Ordering::SeqCst);
            return Err(DriverError::SessionGone("browser crashed".to_string()));
        }
        self.visited.lock().unwrap().push(url.to_string());
        Ok(())
    }

    async fn title(&self) -> Result<String, DriverError> {
        self.check()?;
        Ok("Example Domain".to_string())
    }

    async fn current_url(&self) -> Result<String, DriverError> {
        self.check()?;
        Ok(self
            .visited
            .lock()
            .unwrap()
            .last()
            .cloned()
            .unwrap_or_else(|| "about:blank".to_string()))
    }

    async fn click(&self, selector: &str) -> Result<(), DriverError> {
        self.check()?;
        if selector.contains("missing") {
            return Err(DriverError::Command(format!("no such element: {}", selector)));
        }
        Ok(())
    }

    async fn type_text(&self, selector: &str, _text: &str) -> Result<(), DriverError> {
        self.click(selector).await
    }

    async fn text(&self, selector: &str) -> Result<String, DriverError> {
        self.check()?;
        if selector.contains("missing") {
            return Err(DriverError::Command(format!("no such element: {}", selector)));
        }
        Ok("Example Domain".to_string())
    }

    async fn exists(&self, selector: &str) -> Result<bool, DriverError> {
        self.check()?;
        Ok(!selector.contains("missing"))
    }

    async fn execute(&self, _script: &str) -> Result<Value, DriverError> {
        self.check()?;
        Ok(serde_json::json!({ "ready": true }))
    }

    async fn screenshot_png(&self) -> Result<Vec<u8>, DriverError> {
        self.check()?;
        if self.behavior.screenshot_panics {
            panic!("screenshot exploded");
        }
        if self.behavior.screenshot_fails {
            return Err(DriverError::Command("unable to capture screen".to_string()));
        }
        Ok(b"\x89PNG fake".to_vec())
    }
}

pub struct FakeRecorder {
    started: AtomicUsize,
    stopped: Arc<AtomicUsize>,
    killed: Arc<AtomicUsize>,
    fail: bool,
}

impl FakeRecorder {
    pub fn new() -> Self {
        Self {
            started: AtomicUsize::new(0),
            stopped: Arc::new(AtomicUsize::new(0)),
            killed: Arc::new(AtomicUsize::new(0)),
            fail: false,
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new()
        }
    }

    pub fn started(&self) -> usize {
        self.started.load(Ordering::SeqCst)
    }

    pub fn stopped(&self) -> usize {
        self.stopped.load(Ordering::SeqCst)
    }

    pub fn killed(&self) -> usize {
        self.killed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Recorder for FakeRecorder {
    async fn start(
        &self,
        _display: &str,
        output_path: &Path,
    ) -> Result<Box<dyn Recording>, RecorderError> {
        self.started.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(RecorderError::Spawn(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "ffmpeg not found",
            )));
        }
        Ok(Box::new(FakeRecording {
            output_path: output_path.to_path_buf(),
            stopped: self.stopped.clone(),
            killed: self.killed.clone(),
            done: false,
        }))
    }
}

struct FakeRecording {
    output_path: PathBuf,
    stopped: Arc<AtomicUsize>,
    killed: Arc<AtomicUsize>,
    done: bool,
}

#[async_trait]
impl Recording for FakeRecording {
    fn output_path(&self) -> &Path {
        &self.output_path
    }

    async fn stop(&mut self, _grace_period: Duration) -> PathBuf {
        if !self.done {
            self.done = true;
            self.stopped.fetch_add(1, Ordering::SeqCst);
        }
        self.output_path.clone()
    }

    fn force_kill(&mut self) {
        if !self.done {
            self.done = true;
            self.killed.fetch_add(1, Ordering::SeqCst);
        }
    }
}

/// Queue preloaded with payloads
pub struct FakeQueue {
    payloads: Mutex<VecDeque<Vec<u8>>>,
    errors: AtomicU32,
}

impl FakeQueue {
    pub fn new(payloads: Vec<Vec<u8>>) -> Self {
        Self {
            payloads: Mutex::new(payloads.into()),
            errors: AtomicU32::new(0),
        }
    }

    /// The next `n` dequeues fail
    pub fn fail_next(&self, n: u32) {
        self.errors.store(n, Ordering::SeqCst);
    }

    pub fn remaining(&self) -> usize {
        self.payloads.lock().unwrap().len()
    }
}

#[async_trait]
impl JobQueue for FakeQueue {
    async fn dequeue(&self) -> anyhow::Result<Option<Vec<u8>>> {
        if self
            .errors
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            anyhow::bail!("connection reset by peer");
        }
        Ok(self.payloads.lock().unwrap().pop_front())
    }
}

/// Backend that records uploads, failing the first `fail_first` attempts
pub struct FakeBackend {
    uploads: Mutex<Vec<ResultUpload>>,
    attempts: AtomicU32,
    fail_first: u32,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self::failing_first(0)
    }

    pub fn failing_first(fail_first: u32) -> Self {
        Self {
            uploads: Mutex::new(Vec::new()),
            attempts: AtomicU32::new(0),
            fail_first,
        }
    }

    pub fn always_failing() -> Self {
        Self::failing_first(u32::MAX)
    }

    pub fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }

    pub fn uploads(&self) -> Vec<ResultUpload> {
        self.uploads.lock().unwrap().clone()
    }
}

#[async_trait]
impl ResultRepository for FakeBackend {
    async fn upload(&self, upload: &ResultUpload) -> anyhow::Result<()> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
        if attempt <= self.fail_first {
            anyhow::bail!("API error (status 503): unavailable");
        }
        self.uploads.lock().unwrap().push(upload.clone());
        Ok(())
    }
}
