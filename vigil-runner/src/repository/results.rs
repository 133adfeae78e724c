//! Results repository
//!
//! Delivers one result upload to the backend. A single call is a single
//! attempt; retrying is the reporter's job.

use anyhow::Result;
use async_trait::async_trait;
use vigil_client::BackendClient;
use vigil_core::dto::result::ResultUpload;

/// Repository trait for result delivery
#[async_trait]
pub trait ResultRepository: Send + Sync {
    /// Uploads a result; any non-2xx response is an error
    async fn upload(&self, upload: &ResultUpload) -> Result<()>;
}

#[async_trait]
impl ResultRepository for BackendClient {
    async fn upload(&self, upload: &ResultUpload) -> Result<()> {
        self.upload_result(upload).await?;
        Ok(())
    }
}
