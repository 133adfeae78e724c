//! Vigil clients
//!
//! HTTP and queue clients shared by the worker and the CLI:
//! - [`BackendClient`] uploads finished test results to the results backend
//! - [`webdriver::WebDriverClient`] drives chromedriver/geckodriver over the
//!   W3C WebDriver protocol
//! - [`queue::RedisQueue`] pops and pushes raw job payloads
//!
//! # Example
//!
//! ```no_run
//! use vigil_client::BackendClient;
//! use vigil_core::domain::outcome::ReportStatus;
//! use vigil_core::dto::result::ResultUpload;
//!
//! #[tokio::main]
//! async fn main() -> vigil_client::Result<()> {
//!     let client = BackendClient::new("http://backend:8080");
//!
//!     client.upload_result(&ResultUpload {
//!         test_id: "t1".to_string(),
//!         status: ReportStatus::Success,
//!         logs: String::new(),
//!         duration: 1.5,
//!         video: None,
//!         screenshot: None,
//!     }).await?;
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod queue;
mod results;
pub mod webdriver;

// Re-export commonly used types
pub use error::{ClientError, Result};
pub use queue::RedisQueue;
pub use webdriver::{WebDriverClient, WebDriverSession};

use reqwest::Client;
use std::time::Duration;

/// Per-request timeout for result uploads
pub const UPLOAD_TIMEOUT: Duration = Duration::from_secs(30);

/// HTTP client for the results backend
#[derive(Debug, Clone)]
pub struct BackendClient {
    /// Base URL of the backend (e.g., "http://backend:8080")
    base_url: String,
    /// HTTP client instance
    client: Client,
}

impl BackendClient {
    /// Create a new backend client with the default upload timeout
    ///
    /// # Example
    /// ```
    /// use vigil_client::BackendClient;
    ///
    /// let client = BackendClient::new("http://backend:8080");
    /// ```
    pub fn new(base_url: impl Into<String>) -> Self {
        let client = Client::builder()
            .timeout(UPLOAD_TIMEOUT)
            .build()
            .unwrap_or_else(|_| Client::new());
        Self::with_client(base_url, client)
    }

    /// Create a new backend client with a custom HTTP client
    ///
    /// This allows you to configure timeouts, proxies, TLS settings, etc.
    pub fn with_client(base_url: impl Into<String>, client: Client) -> Self {
        let base_url = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        }
    }

    /// Get the base URL of the backend
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Handle an API response that returns no content we care about
    async fn handle_empty_response(&self, response: reqwest::Response) -> Result<()> {
        let status = response.status();

        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ClientError::api_error(status.as_u16(), error_text));
        }

        Ok(())
    }
}
