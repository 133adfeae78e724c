//! Job worker
//!
//! Pulls payloads from the queue and takes each job through its whole
//! lifecycle before touching the next one:
//!
//! ```text
//! Dequeued -> Validated -> ResourcesAcquiring -> Executing -> Capturing -> Reporting -> Done
//! ```
//!
//! An invalid payload goes straight to `Done` without acquiring anything. A
//! job that fails at any later phase still produces exactly one outcome, and
//! its lease is always released before the outcome is reported.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tracing::{Instrument, debug, error, info, info_span, warn};
use vigil_core::domain::job::{JobDefaults, JobRecord, ParseError, parse_with};
use vigil_core::domain::outcome::{ExecutionOutcome, ReportStatus};

use crate::error::{ExecuteError, InfraError};
use crate::lease::{Lease, RecordingTarget, ResourceManager};
use crate::lua::ScriptExecutor;
use crate::repository::JobQueue;
use crate::service::{ArtifactCapture, ResultReporter};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobPhase {
    Dequeued,
    Validated,
    ResourcesAcquiring,
    Executing,
    Capturing,
    Reporting,
    Done,
}

impl fmt::Display for JobPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            JobPhase::Dequeued => "dequeued",
            JobPhase::Validated => "validated",
            JobPhase::ResourcesAcquiring => "resources_acquiring",
            JobPhase::Executing => "executing",
            JobPhase::Capturing => "capturing",
            JobPhase::Reporting => "reporting",
            JobPhase::Done => "done",
        };
        f.write_str(s)
    }
}

/// How a dequeued payload ended
#[derive(Debug, PartialEq, Eq)]
pub enum JobEnd {
    /// Not a valid job; discarded without acquiring anything
    Rejected(ParseError),
    /// Outcome delivered to the backend
    Reported { status: ReportStatus, attempts: u32 },
    /// Outcome produced but delivery gave up
    DeliveryFailed { status: ReportStatus },
}

/// Loop timing
#[derive(Debug, Clone, Copy)]
pub struct WorkerSettings {
    pub poll_interval: Duration,
    pub error_backoff: Duration,
    pub record_video: bool,
}

pub struct Worker {
    queue: Arc<dyn JobQueue>,
    resources: ResourceManager,
    executor: ScriptExecutor,
    capture: ArtifactCapture,
    reporter: ResultReporter,
    defaults: JobDefaults,
    settings: WorkerSettings,
}

impl Worker {
    pub fn new(
        queue: Arc<dyn JobQueue>,
        resources: ResourceManager,
        capture: ArtifactCapture,
        reporter: ResultReporter,
        defaults: JobDefaults,
        settings: WorkerSettings,
    ) -> Self {
        Self {
            queue,
            resources,
            executor: ScriptExecutor::new(capture.clone()),
            capture,
            reporter,
            defaults,
            settings,
        }
    }

    /// Process jobs until `shutdown` turns true
    ///
    /// Shutdown is only observed between jobs.
    pub async fn run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        info!(
            "Starting worker loop (poll interval: {:?}, error backoff: {:?})",
            self.settings.poll_interval, self.settings.error_backoff
        );

        while !*shutdown.borrow() {
            match self.queue.dequeue().await {
                Ok(Some(payload)) => {
                    let end = self.process_payload(&payload).await;
                    debug!("Job ended: {:?}", end);
                }
                Ok(None) => {
                    debug!("Queue empty");
                    wait_or_shutdown(self.settings.poll_interval, &mut shutdown).await;
                }
                Err(e) => {
                    error!("Failed to dequeue: {:#}", e);
                    wait_or_shutdown(self.settings.error_backoff, &mut shutdown).await;
                }
            }
        }

        info!("Worker loop stopped");
    }

    /// Take one raw payload through the whole job lifecycle
    pub async fn process_payload(self: &Arc<Self>, payload: &[u8]) -> JobEnd {
        debug!(phase = %JobPhase::Dequeued, bytes = payload.len(), "Payload received");

        let job = match parse_with(payload, &self.defaults) {
            Ok(job) => job,
            Err(e) => {
                warn!(phase = %JobPhase::Done, "Discarding invalid job: {}", e);
                return JobEnd::Rejected(e);
            }
        };

        let span = info_span!("job", test_id = %job.test_id(), user_id = %job.user_id());
        self.process_job(job).instrument(span).await
    }

    async fn process_job(self: &Arc<Self>, job: JobRecord) -> JobEnd {
        info!(
            phase = %JobPhase::Validated,
            browser = %job.browser(),
            headless = job.headless(),
            timeout_seconds = job.timeout_seconds(),
            "Job accepted"
        );

        let outcome = self.run_job_isolated(&job).await;

        info!(phase = %JobPhase::Reporting, status = %outcome.status(), "Reporting outcome");
        let status = outcome.status();
        let end = match self.reporter.report(job.test_id(), &outcome).await {
            Ok(ack) => JobEnd::Reported {
                status,
                attempts: ack.attempts,
            },
            Err(e) => {
                error!("Result for {} was not delivered: {}", job.test_id(), e);
                JobEnd::DeliveryFailed { status }
            }
        };

        info!(phase = %JobPhase::Done, "Job finished");
        end
    }

    /// Runs the job on its own task so that a panic still yields an outcome
    ///
    /// The lease held by a panicking task is cleaned up by its `Drop`.
    async fn run_job_isolated(self: &Arc<Self>, job: &JobRecord) -> ExecutionOutcome {
        let started = Instant::now();
        let worker = Arc::clone(self);
        let task_job = job.clone();
        let handle =
            tokio::spawn(async move { worker.run_job(&task_job).await }.in_current_span());

        match handle.await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(
                    "Job task panicked after {:.1}s: {}",
                    started.elapsed().as_secs_f64(),
                    e
                );
                ExecutionOutcome::InfraError {
                    reason: "job task panicked".to_string(),
                    logs: String::new(),
                }
            }
        }
    }

    /// Acquire, execute, capture and release; always yields one outcome
    async fn run_job(&self, job: &JobRecord) -> ExecutionOutcome {
        let started = Instant::now();

        info!(phase = %JobPhase::ResourcesAcquiring, "Acquiring browser session");
        let target = self.recording_target(job);
        let mut lease = match self
            .resources
            .acquire(job.browser(), job.headless(), target)
            .await
        {
            Ok(lease) => lease,
            Err(e) => {
                error!("Could not acquire resources: {}", e);
                return ExecutionOutcome::InfraError {
                    reason: e.to_string(),
                    logs: String::new(),
                };
            }
        };

        let outcome = self.execute_and_capture(job, &mut lease, started).await;
        lease.release().await;
        outcome
    }

    fn recording_target(&self, job: &JobRecord) -> RecordingTarget {
        if self.settings.record_video && !job.headless() {
            RecordingTarget::Enabled {
                output_path: self.capture.video_path(job.test_id(), chrono::Utc::now()),
            }
        } else {
            RecordingTarget::Disabled
        }
    }

    async fn execute_and_capture(
        &self,
        job: &JobRecord,
        lease: &mut Lease,
        started: Instant,
    ) -> ExecutionOutcome {
        let Some(session) = lease.session() else {
            return ExecutionOutcome::InfraError {
                reason: "lease has no active session".to_string(),
                logs: String::new(),
            };
        };

        info!(phase = %JobPhase::Executing, session_id = %session.id(), "Running script");
        let executed = self.executor.execute(session.clone(), job).await;

        info!(phase = %JobPhase::Capturing, "Capturing artifacts");
        match executed {
            Ok(result) if result.passed => {
                let screenshot = self
                    .capture
                    .screenshot_best_effort(session.as_ref(), job.test_id(), "success")
                    .await;
                let video = self.finalize(lease).await;
                ExecutionOutcome::Success {
                    duration: started.elapsed(),
                    logs: result.log_text,
                    video_path: video,
                    screenshot_path: screenshot,
                }
            }
            Ok(result) => {
                let screenshot = self
                    .capture
                    .screenshot_best_effort(session.as_ref(), job.test_id(), "failure")
                    .await;
                let video = self.finalize(lease).await;
                ExecutionOutcome::Failure {
                    reason: result
                        .failure
                        .unwrap_or_else(|| "test failed".to_string()),
                    duration: started.elapsed(),
                    logs: result.log_text,
                    video_path: video,
                    screenshot_path: screenshot,
                }
            }
            Err(ExecuteError::Timeout { limit, log_text }) => {
                lease.mark_unusable();
                let screenshot = self
                    .capture
                    .screenshot_best_effort(session.as_ref(), job.test_id(), "timeout")
                    .await;
                let video = self.finalize(lease).await;
                ExecutionOutcome::Failure {
                    reason: format!("Test timed out after {}s", limit.as_secs()),
                    duration: started.elapsed(),
                    logs: log_text,
                    video_path: video,
                    screenshot_path: screenshot,
                }
            }
            Err(ExecuteError::Crash { reason, log_text }) => {
                lease.mark_unusable();
                self.finalize(lease).await;
                ExecutionOutcome::InfraError {
                    reason: InfraError::Crash(reason).to_string(),
                    logs: log_text,
                }
            }
        }
    }

    async fn finalize(&self, lease: &mut Lease) -> Option<PathBuf> {
        self.capture.finalize_recording(lease).await
    }
}

async fn wait_or_shutdown(delay: Duration, shutdown: &mut watch::Receiver<bool>) {
    tokio::select! {
        _ = tokio::time::sleep(delay) => {}
        _ = shutdown.changed() => {}
    }
}
