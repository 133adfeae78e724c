//! Script-facing browser
//!
//! Implements the `browser` module's command set on top of a leased session.
//! Driver errors that mean the session is gone become
//! [`CommandError::ConnectionLost`] so the executor can report a crash.

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use vigil_lua::{BrowserCommands, CommandError};

use crate::error::CaptureError;
use crate::lease::{BrowserSession, DriverError};
use crate::service::ArtifactCapture;

pub struct ScriptBrowser {
    session: Arc<dyn BrowserSession>,
    capture: ArtifactCapture,
    test_id: String,
}

impl ScriptBrowser {
    pub fn new(session: Arc<dyn BrowserSession>, capture: ArtifactCapture, test_id: &str) -> Self {
        Self {
            session,
            capture,
            test_id: test_id.to_string(),
        }
    }
}

fn command_error(err: DriverError) -> CommandError {
    if err.is_connection_lost() {
        CommandError::ConnectionLost(err.to_string())
    } else {
        CommandError::Failed(err.to_string())
    }
}

#[async_trait]
impl BrowserCommands for ScriptBrowser {
    async fn open(&self, url: &str) -> Result<(), CommandError> {
        self.session.navigate(url).await.map_err(command_error)
    }

    async fn title(&self) -> Result<String, CommandError> {
        self.session.title().await.map_err(command_error)
    }

    async fn current_url(&self) -> Result<String, CommandError> {
        self.session.current_url().await.map_err(command_error)
    }

    async fn click(&self, selector: &str) -> Result<(), CommandError> {
        self.session.click(selector).await.map_err(command_error)
    }

    async fn type_text(&self, selector: &str, text: &str) -> Result<(), CommandError> {
        self.session
            .type_text(selector, text)
            .await
            .map_err(command_error)
    }

    async fn text(&self, selector: &str) -> Result<String, CommandError> {
        self.session.text(selector).await.map_err(command_error)
    }

    async fn exists(&self, selector: &str) -> Result<bool, CommandError> {
        self.session.exists(selector).await.map_err(command_error)
    }

    async fn execute(&self, script: &str) -> Result<Value, CommandError> {
        self.session.execute(script).await.map_err(command_error)
    }

    async fn screenshot(&self, tag: &str) -> Result<String, CommandError> {
        let tag = format!("step_{}", tag);
        match self
            .capture
            .screenshot(self.session.as_ref(), &self.test_id, &tag)
            .await
        {
            Ok(path) => Ok(path.to_string_lossy().to_string()),
            Err(CaptureError::Screenshot(e)) => Err(command_error(e)),
            Err(e) => Err(CommandError::Failed(e.to_string())),
        }
    }
}
