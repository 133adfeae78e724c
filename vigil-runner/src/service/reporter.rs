//! Result reporter
//!
//! Turns an execution outcome into a result upload and delivers it with
//! bounded retries and exponential backoff. A job is never re-run because
//! its report could not be delivered.

use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use vigil_core::domain::outcome::ExecutionOutcome;
use vigil_core::dto::result::ResultUpload;

use crate::error::DeliveryError;
use crate::repository::ResultRepository;

/// Bounded exponential backoff
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    /// Delay before attempt number `attempt + 1`, given `attempt` failures so far
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.initial_delay
            .saturating_mul(factor)
            .min(self.max_delay)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
        }
    }
}

/// Delivery acknowledgement
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ack {
    pub attempts: u32,
}

pub struct ResultReporter {
    repository: Arc<dyn ResultRepository>,
    policy: RetryPolicy,
}

impl ResultReporter {
    pub fn new(repository: Arc<dyn ResultRepository>, policy: RetryPolicy) -> Self {
        Self { repository, policy }
    }

    /// Deliver the outcome of `test_id`
    ///
    /// Artifact files are read per attempt and released before the attempt
    /// returns, whether it succeeded or not.
    pub async fn report(
        &self,
        test_id: &str,
        outcome: &ExecutionOutcome,
    ) -> Result<Ack, DeliveryError> {
        let upload = ResultUpload::from_outcome(test_id, outcome);
        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;

            match self.repository.upload(&upload).await {
                Ok(()) => {
                    if attempt > 1 {
                        info!("Result delivered after {} attempt(s)", attempt);
                    } else {
                        info!(status = %upload.status, "Result delivered");
                    }
                    return Ok(Ack { attempts: attempt });
                }
                Err(e) => {
                    if attempt >= max_attempts {
                        error!(
                            "Failed to deliver result after {} attempts: {:#}",
                            attempt, e
                        );
                        return Err(DeliveryError {
                            attempts: attempt,
                            last_error: format!("{:#}", e),
                        });
                    }

                    let delay = self.policy.delay_after(attempt);
                    warn!(
                        "Failed to deliver result (attempt {}/{}): {:#}",
                        attempt, max_attempts, e
                    );
                    warn!("Retrying in {:?}...", delay);

                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}
