//! Screen recording
//!
//! Records the X display the browser renders to with an ffmpeg subprocess.
//! The recorder is an independent OS process; browser commands keep running
//! while it captures.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::Duration;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::process::{Child, Command};
use tracing::{debug, info, warn};

use super::browser::VIEWPORT;

/// How long a fresh recorder must survive before it counts as started
const START_PROBE: Duration = Duration::from_millis(500);

#[derive(Debug, Error)]
pub enum RecorderError {
    #[error("failed to spawn recorder: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("recorder exited during start-up ({0})")]
    Exited(ExitStatus),
}

#[async_trait]
pub trait Recorder: Send + Sync {
    /// Start recording `display` into `output_path`
    ///
    /// Returns only once the recording is confirmed running.
    async fn start(&self, display: &str, output_path: &Path)
    -> Result<Box<dyn Recording>, RecorderError>;
}

/// Handle on one running recording
#[async_trait]
pub trait Recording: Send {
    fn output_path(&self) -> &Path;

    /// Ask the recorder to finish the file, killing it after `grace_period`
    async fn stop(&mut self, grace_period: Duration) -> PathBuf;

    /// Kill immediately without waiting
    fn force_kill(&mut self);
}

/// Spawns `ffmpeg -f x11grab`
pub struct FfmpegRecorder {
    ffmpeg_path: String,
}

impl FfmpegRecorder {
    pub fn new(ffmpeg_path: impl Into<String>) -> Self {
        Self {
            ffmpeg_path: ffmpeg_path.into(),
        }
    }

    fn command(&self, display: &str, output_path: &Path) -> Command {
        let (width, height) = VIEWPORT;
        let mut command = Command::new(&self.ffmpeg_path);
        command
            .arg("-video_size")
            .arg(format!("{}x{}", width, height))
            .args(["-framerate", "25", "-f", "x11grab", "-i"])
            .arg(display)
            .args(["-c:v", "libx264", "-preset", "ultrafast", "-y"])
            .arg(output_path)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true);
        command
    }
}

#[async_trait]
impl Recorder for FfmpegRecorder {
    async fn start(
        &self,
        display: &str,
        output_path: &Path,
    ) -> Result<Box<dyn Recording>, RecorderError> {
        if let Some(parent) = output_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut child = self.command(display, output_path).spawn()?;

        tokio::time::sleep(START_PROBE).await;
        if let Some(status) = child.try_wait()? {
            return Err(RecorderError::Exited(status));
        }

        let x11_display = display;
        info!(
            x11_display,
            path = %output_path.display(),
            pid = ?child.id(),
            "Recording started"
        );

        Ok(Box::new(FfmpegRecording {
            child: Some(child),
            output_path: output_path.to_path_buf(),
        }))
    }
}

struct FfmpegRecording {
    child: Option<Child>,
    output_path: PathBuf,
}

#[async_trait]
impl Recording for FfmpegRecording {
    fn output_path(&self) -> &Path {
        &self.output_path
    }

    async fn stop(&mut self, grace_period: Duration) -> PathBuf {
        let Some(mut child) = self.child.take() else {
            return self.output_path.clone();
        };

        // ffmpeg finishes the file when it reads 'q' on stdin
        if let Some(mut stdin) = child.stdin.take() {
            if let Err(e) = stdin.write_all(b"q").await {
                debug!("Failed to send quit to recorder: {}", e);
            }
            drop(stdin);
        }

        match tokio::time::timeout(grace_period, child.wait()).await {
            Ok(Ok(status)) => debug!("Recorder exited with {}", status),
            Ok(Err(e)) => warn!("Failed to wait for recorder: {}", e),
            Err(_) => {
                warn!(
                    "Recorder did not stop within {:?}, killing it",
                    grace_period
                );
                if let Err(e) = child.kill().await {
                    warn!("Failed to kill recorder: {}", e);
                }
            }
        }

        self.output_path.clone()
    }

    fn force_kill(&mut self) {
        if let Some(mut child) = self.child.take() {
            if let Err(e) = child.start_kill() {
                warn!("Failed to kill recorder: {}", e);
            }
        }
    }
}
