//! Script executor
//!
//! Runs one job's script against its leased browser session:
//! - Creates a fresh sandbox per job
//! - Registers the `log`, `job` and `browser` modules
//! - Enforces the job deadline (async timeout plus an instruction hook)
//! - Classifies the ending as verdict, timeout or crash

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use vigil_core::domain::job::JobRecord;
use vigil_core::domain::log::{LogEntry, LogLevel};
use vigil_lua::{
    BrowserModule, JobInfo, JobModule, LogModule, ModuleRegistry, Verdict, create_sandbox,
    install_deadline, run_script,
};

use super::browser::ScriptBrowser;
use super::sinks::BufferedLogSink;
use crate::error::ExecuteError;
use crate::lease::BrowserSession;
use crate::service::{ArtifactCapture, InMemoryLogBuffer, LogBufferService};

/// A script that ran to a verdict
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptResult {
    pub passed: bool,
    /// Why the script did not pass, if it said or raised something
    pub failure: Option<String>,
    pub log_text: String,
}

pub struct ScriptExecutor {
    capture: ArtifactCapture,
}

impl ScriptExecutor {
    pub fn new(capture: ArtifactCapture) -> Self {
        Self { capture }
    }

    /// Run `job`'s script under its own timeout
    pub async fn execute(
        &self,
        session: Arc<dyn BrowserSession>,
        job: &JobRecord,
    ) -> Result<ScriptResult, ExecuteError> {
        self.execute_with_timeout(session, job, job.timeout()).await
    }

    /// Run `job`'s script, giving up after `limit`
    ///
    /// A script error is a failed test unless the browser session is gone,
    /// in which case it is reported as a crash.
    pub async fn execute_with_timeout(
        &self,
        session: Arc<dyn BrowserSession>,
        job: &JobRecord,
        limit: Duration,
    ) -> Result<ScriptResult, ExecuteError> {
        let logs = Arc::new(InMemoryLogBuffer::new());
        logs.add_entry(LogEntry::new(
            LogLevel::Info,
            format!(
                "Running test {} in {} (headless: {}, timeout: {}s)",
                job.test_id(),
                job.browser(),
                job.headless(),
                limit.as_secs()
            ),
        ));

        let lua = match create_sandbox() {
            Ok(lua) => lua,
            Err(e) => {
                return Err(ExecuteError::Crash {
                    reason: format!("failed to create sandbox: {}", e),
                    log_text: logs.drain_text(),
                });
            }
        };

        let browser = BrowserModule::new(Arc::new(ScriptBrowser::new(
            session.clone(),
            self.capture.clone(),
            job.test_id(),
        )));
        let crashed = browser.crash_flag();

        let mut registry = ModuleRegistry::new();
        registry.register(LogModule::new(BufferedLogSink::new(logs.clone())));
        registry.register(JobModule::new(JobInfo::from(job)));
        registry.register(browser);

        if let Err(e) = registry.register_all(&lua) {
            return Err(ExecuteError::Crash {
                reason: format!("failed to register modules: {}", e),
                log_text: logs.drain_text(),
            });
        }

        let expired = Arc::new(AtomicBool::new(false));
        let now = Instant::now();
        let deadline = now
            .checked_add(limit)
            .unwrap_or_else(|| now + Duration::from_secs(u32::MAX as u64));
        if let Err(e) = install_deadline(&lua, deadline, expired.clone()) {
            return Err(ExecuteError::Crash {
                reason: format!("failed to install deadline: {}", e),
                log_text: logs.drain_text(),
            });
        }

        debug!("Executing script ({} bytes)", job.script().len());
        let result =
            tokio::time::timeout(limit, run_script(&lua, job.test_id(), job.script())).await;

        match result {
            Err(_) => {
                warn!("Script timed out after {:?}", limit);
                logs.add_entry(LogEntry::new(
                    LogLevel::Error,
                    format!("Test timed out after {}s", limit.as_secs()),
                ));
                Err(ExecuteError::Timeout {
                    limit,
                    log_text: logs.drain_text(),
                })
            }
            Ok(Ok(_)) if crashed.load(Ordering::SeqCst) || !session.is_alive().await => {
                warn!("Script finished but the browser session is gone");
                logs.add_entry(LogEntry::new(
                    LogLevel::Error,
                    "Browser session lost during the test",
                ));
                Err(ExecuteError::Crash {
                    reason: "browser session lost during the test".to_string(),
                    log_text: logs.drain_text(),
                })
            }
            Ok(Ok(Verdict::Passed)) => {
                info!("Script passed");
                logs.add_entry(LogEntry::new(LogLevel::Info, "Test passed"));
                Ok(ScriptResult {
                    passed: true,
                    failure: None,
                    log_text: logs.drain_text(),
                })
            }
            Ok(Ok(Verdict::Failed(message))) => {
                let failure = message.unwrap_or_else(|| "script returned false".to_string());
                info!("Script failed: {}", failure);
                logs.add_entry(LogEntry::new(
                    LogLevel::Error,
                    format!("Test failed: {}", failure),
                ));
                Ok(ScriptResult {
                    passed: false,
                    failure: Some(failure),
                    log_text: logs.drain_text(),
                })
            }
            Ok(Err(e)) => {
                if expired.load(Ordering::SeqCst) {
                    warn!("Script hit its deadline");
                    logs.add_entry(LogEntry::new(
                        LogLevel::Error,
                        format!("Test timed out after {}s", limit.as_secs()),
                    ));
                    return Err(ExecuteError::Timeout {
                        limit,
                        log_text: logs.drain_text(),
                    });
                }

                let message = e.to_string();
                if crashed.load(Ordering::SeqCst) || !session.is_alive().await {
                    warn!("Browser session lost during script: {}", message);
                    logs.add_entry(LogEntry::new(
                        LogLevel::Error,
                        format!("Browser session lost: {}", message),
                    ));
                    return Err(ExecuteError::Crash {
                        reason: message,
                        log_text: logs.drain_text(),
                    });
                }

                info!("Script raised an error: {}", message);
                logs.add_entry(LogEntry::new(
                    LogLevel::Error,
                    format!("Test failed: {}", message),
                ));
                Ok(ScriptResult {
                    passed: false,
                    failure: Some(message),
                    log_text: logs.drain_text(),
                })
            }
        }
    }
}
