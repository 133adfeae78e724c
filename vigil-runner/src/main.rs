//! Vigil Worker
//!
//! A stateless worker that runs browser test jobs from a Redis queue.
//!
//! Architecture:
//! - Configuration: Load settings from environment or defaults
//! - Repositories: Job queue (Redis) and result delivery (backend HTTP)
//! - Lease: Browser session (WebDriver) paired with a screen recording (ffmpeg)
//! - Lua: Sandboxed script execution against the leased session
//! - Services: Log buffering, artifact capture, result reporting with retry
//! - Scheduler: The job loop
//!
//! The worker handles one job at a time. Scale out by running more workers
//! against the same queue.

mod config;
mod error;
mod lease;
mod lua;
mod repository;
mod scheduler;
mod service;

#[cfg(test)]
mod testing;

use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;
use crate::lease::{FfmpegRecorder, ResourceManager, WebDriverBrowser};
use crate::scheduler::{Worker, WorkerSettings};
use crate::service::{ArtifactCapture, ResultReporter, RetryPolicy};
use vigil_client::{BackendClient, RedisQueue};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "vigil_runner=info,vigil_client=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Vigil worker");

    let config = Config::from_env();
    config.validate()?;
    info!(
        "Loaded configuration: worker_id={}, queue={}, backend_url={}",
        config.worker_id, config.queue_name, config.backend_url
    );

    for dir in [
        config.videos_dir(),
        config.screenshots_dir(),
        config.downloads_dir(),
    ] {
        tokio::fs::create_dir_all(&dir)
            .await
            .with_context(|| format!("Failed to create {}", dir.display()))?;
    }

    let queue = RedisQueue::connect(&config.redis_url, config.queue_name.clone())
        .await
        .context("Failed to connect to Redis")?;
    info!("Connected to queue at {}", config.redis_url);

    let backend = BackendClient::new(config.backend_url.clone());

    let resources = ResourceManager::new(
        Arc::new(WebDriverBrowser::new(
            &config.chromedriver_url,
            &config.geckodriver_url,
        )),
        Arc::new(FfmpegRecorder::new(config.ffmpeg_path.clone())),
        config.display.clone(),
        config.downloads_dir(),
    )
    .with_timeouts(config.recorder_grace_period, config.session_stop_timeout);

    let reporter = ResultReporter::new(
        Arc::new(backend),
        RetryPolicy {
            max_attempts: config.report_max_attempts,
            initial_delay: config.report_initial_backoff,
            ..RetryPolicy::default()
        },
    );

    let worker = Arc::new(Worker::new(
        Arc::new(queue),
        resources,
        ArtifactCapture::new(config.screenshots_dir(), config.videos_dir()),
        reporter,
        config.job_defaults,
        WorkerSettings {
            poll_interval: config.poll_interval,
            error_backoff: config.error_backoff,
            record_video: config.record_video,
        },
    ));

    info!("Worker initialized successfully");

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        wait_for_signal().await;
        info!("Shutdown requested, finishing current job");
        let _ = shutdown_tx.send(true);
    });

    worker.run(shutdown_rx).await;

    info!("Vigil worker stopped");
    Ok(())
}

/// Resolves on Ctrl-C, or SIGTERM on Unix
async fn wait_for_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
