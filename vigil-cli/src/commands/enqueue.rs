//! Enqueue command handlers
//!
//! Builds a job payload, validates it locally, and pushes it onto the queue.

use anyhow::{Context, Result};
use colored::*;
use std::fs;
use std::path::PathBuf;
use vigil_client::RedisQueue;
use vigil_core::domain::job::BrowserKind;
use vigil_core::dto::job::JobPayload;

use super::validate::{check_payload, print_summary};
use crate::config::Config;

/// Where the job comes from
pub enum JobSource {
    /// A complete job payload in a JSON file
    File(PathBuf),
    /// A Lua script wrapped into a job from command-line options
    Script {
        script: PathBuf,
        test_id: String,
        browser: Option<String>,
        headless: bool,
        timeout: Option<u64>,
        user_id: Option<String>,
    },
}

impl JobSource {
    /// Raw payload bytes as they will be pushed
    pub fn payload(&self) -> Result<Vec<u8>> {
        match self {
            JobSource::File(path) => {
                fs::read(path).with_context(|| format!("Failed to read {}", path.display()))
            }
            JobSource::Script {
                script,
                test_id,
                browser,
                headless,
                timeout,
                user_id,
            } => {
                let source = fs::read_to_string(script)
                    .with_context(|| format!("Failed to read {}", script.display()))?;

                let mut payload = JobPayload::new(test_id.clone(), source);
                payload.browser = browser
                    .as_deref()
                    .map(|b| b.parse::<BrowserKind>())
                    .transpose()
                    .map_err(anyhow::Error::msg)?;
                payload.headless = headless.then_some(true);
                payload.timeout_seconds = *timeout;
                payload.user_id = user_id.clone();

                Ok(payload.to_bytes()?)
            }
        }
    }
}

/// Validate and push a job
pub async fn enqueue(source: JobSource, config: &Config) -> Result<()> {
    let payload = source.payload()?;
    let job = check_payload(&payload).context("Job rejected before enqueueing")?;

    let queue = RedisQueue::connect(&config.redis_url, config.queue_name.clone())
        .await
        .with_context(|| format!("Failed to connect to Redis at {}", config.redis_url))?;
    let len = queue.push(&payload).await.context("Failed to push job")?;

    println!("{}", "✓ Job enqueued".green().bold());
    print_summary(&job);
    println!(
        "  {}: {} ({} waiting)",
        "Queue".bold(),
        queue.queue_name().cyan(),
        len.to_string().yellow()
    );

    Ok(())
}

/// Print the number of waiting jobs
pub async fn status(config: &Config) -> Result<()> {
    let queue = RedisQueue::connect(&config.redis_url, config.queue_name.clone())
        .await
        .with_context(|| format!("Failed to connect to Redis at {}", config.redis_url))?;
    let len = queue.len().await.context("Failed to read queue length")?;

    println!(
        "{} {} job(s) waiting in {}",
        "●".cyan(),
        len.to_string().bold(),
        queue.queue_name().cyan()
    );

    Ok(())
}
