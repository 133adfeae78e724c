//! Browser driver seam
//!
//! [`BrowserDriver`] starts sessions, [`BrowserSession`] is one live browser.
//! The production implementation talks W3C WebDriver to chromedriver or
//! geckodriver through `vigil-client`.

use async_trait::async_trait;
use serde_json::{Value, json};
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use vigil_client::{ClientError, WebDriverClient, WebDriverSession};
use vigil_core::domain::job::BrowserKind;

/// Fixed viewport of every session (and of the recorded display)
pub const VIEWPORT: (u32, u32) = (1920, 1080);

#[derive(Debug, Error)]
pub enum DriverError {
    /// The driver process cannot be reached
    #[error("driver unreachable: {0}")]
    Unreachable(String),

    /// The session no longer exists on the driver
    #[error("session gone: {0}")]
    SessionGone(String),

    /// The command reached the browser and failed there
    #[error("{0}")]
    Command(String),
}

impl DriverError {
    pub fn is_connection_lost(&self) -> bool {
        matches!(self, DriverError::Unreachable(_) | DriverError::SessionGone(_))
    }
}

impl From<ClientError> for DriverError {
    fn from(err: ClientError) -> Self {
        match err {
            ClientError::RequestFailed(ref e) if e.is_connect() => {
                DriverError::Unreachable(err.to_string())
            }
            ClientError::WebDriver { ref error, .. } if error == "invalid session id" => {
                DriverError::SessionGone(err.to_string())
            }
            other => DriverError::Command(other.to_string()),
        }
    }
}

/// How a session should be launched
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrowserOptions {
    pub kind: BrowserKind,
    pub headless: bool,
    pub download_dir: PathBuf,
}

#[async_trait]
pub trait BrowserDriver: Send + Sync {
    async fn start(&self, options: &BrowserOptions) -> Result<Arc<dyn BrowserSession>, DriverError>;
}

/// One live browser session
///
/// Element-addressing commands take CSS selectors.
#[async_trait]
pub trait BrowserSession: Send + Sync {
    fn id(&self) -> &str;
    async fn is_alive(&self) -> bool;
    async fn stop(&self) -> Result<(), DriverError>;

    async fn navigate(&self, url: &str) -> Result<(), DriverError>;
    async fn title(&self) -> Result<String, DriverError>;
    async fn current_url(&self) -> Result<String, DriverError>;
    async fn click(&self, selector: &str) -> Result<(), DriverError>;
    async fn type_text(&self, selector: &str, text: &str) -> Result<(), DriverError>;
    async fn text(&self, selector: &str) -> Result<String, DriverError>;
    async fn exists(&self, selector: &str) -> Result<bool, DriverError>;
    async fn execute(&self, script: &str) -> Result<Value, DriverError>;
    async fn screenshot_png(&self) -> Result<Vec<u8>, DriverError>;
}

/// Starts sessions on chromedriver or geckodriver
pub struct WebDriverBrowser {
    chrome: WebDriverClient,
    firefox: WebDriverClient,
}

impl WebDriverBrowser {
    pub fn new(chromedriver_url: &str, geckodriver_url: &str) -> Self {
        Self {
            chrome: WebDriverClient::new(chromedriver_url),
            firefox: WebDriverClient::new(geckodriver_url),
        }
    }
}

#[async_trait]
impl BrowserDriver for WebDriverBrowser {
    async fn start(&self, options: &BrowserOptions) -> Result<Arc<dyn BrowserSession>, DriverError> {
        let client = match options.kind {
            BrowserKind::Chrome => &self.chrome,
            BrowserKind::Firefox => &self.firefox,
        };
        let session = client.new_session(capabilities(options)).await?;
        Ok(Arc::new(WebDriverBrowserSession { session }))
    }
}

/// W3C capabilities for a session
///
/// Sandboxing is disabled for container execution, automation detection is
/// suppressed and downloads land in `download_dir` without prompting.
pub fn capabilities(options: &BrowserOptions) -> Value {
    let (width, height) = VIEWPORT;
    let download_dir = options.download_dir.to_string_lossy().to_string();

    match options.kind {
        BrowserKind::Chrome => {
            let mut args = vec![
                "--no-sandbox".to_string(),
                "--disable-dev-shm-usage".to_string(),
                "--disable-gpu".to_string(),
                format!("--window-size={},{}", width, height),
                "--disable-blink-features=AutomationControlled".to_string(),
            ];
            if options.headless {
                args.push("--headless".to_string());
            }
            json!({
                "browserName": "chrome",
                "goog:chromeOptions": {
                    "args": args,
                    "excludeSwitches": ["enable-automation"],
                    "prefs": {
                        "download.default_directory": download_dir,
                        "download.prompt_for_download": false
                    }
                }
            })
        }
        BrowserKind::Firefox => {
            let mut args = vec![format!("--width={}", width), format!("--height={}", height)];
            if options.headless {
                args.push("--headless".to_string());
            }
            json!({
                "browserName": "firefox",
                "moz:firefoxOptions": {
                    "args": args,
                    "prefs": {
                        "browser.download.folderList": 2,
                        "browser.download.dir": download_dir,
                        "browser.download.useDownloadDir": true,
                        "browser.helperApps.neverAsk.saveToDisk": "application/octet-stream,application/pdf",
                        "dom.webdriver.enabled": false
                    }
                }
            })
        }
    }
}

struct WebDriverBrowserSession {
    session: WebDriverSession,
}

#[async_trait]
impl BrowserSession for WebDriverBrowserSession {
    fn id(&self) -> &str {
        self.session.id()
    }

    async fn is_alive(&self) -> bool {
        self.session.is_alive().await
    }

    async fn stop(&self) -> Result<(), DriverError> {
        Ok(self.session.delete().await?)
    }

    async fn navigate(&self, url: &str) -> Result<(), DriverError> {
        Ok(self.session.navigate(url).await?)
    }

    async fn title(&self) -> Result<String, DriverError> {
        Ok(self.session.title().await?)
    }

    async fn current_url(&self) -> Result<String, DriverError> {
        Ok(self.session.current_url().await?)
    }

    async fn click(&self, selector: &str) -> Result<(), DriverError> {
        let element = self.session.find_element(selector).await?;
        Ok(self.session.click(&element).await?)
    }

    async fn type_text(&self, selector: &str, text: &str) -> Result<(), DriverError> {
        let element = self.session.find_element(selector).await?;
        Ok(self.session.send_keys(&element, text).await?)
    }

    async fn text(&self, selector: &str) -> Result<String, DriverError> {
        let element = self.session.find_element(selector).await?;
        Ok(self.session.element_text(&element).await?)
    }

    async fn exists(&self, selector: &str) -> Result<bool, DriverError> {
        Ok(!self.session.find_elements(selector).await?.is_empty())
    }

    async fn execute(&self, script: &str) -> Result<Value, DriverError> {
        Ok(self.session.execute(script, Vec::new()).await?)
    }

    async fn screenshot_png(&self) -> Result<Vec<u8>, DriverError> {
        Ok(self.session.screenshot().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options(kind: BrowserKind, headless: bool) -> BrowserOptions {
        BrowserOptions {
            kind,
            headless,
            download_dir: PathBuf::from("/out/downloads"),
        }
    }

    #[test]
    fn test_chrome_capabilities() {
        let caps = capabilities(&options(BrowserKind::Chrome, false));
        let chrome = &caps["goog:chromeOptions"];
        let args: Vec<&str> = chrome["args"]
            .as_array()
            .unwrap()
            .iter()
            .filter_map(Value::as_str)
            .collect();

        assert_eq!(caps["browserName"], "chrome");
        assert!(args.contains(&"--no-sandbox"));
        assert!(args.contains(&"--window-size=1920,1080"));
        assert!(args.contains(&"--disable-blink-features=AutomationControlled"));
        assert!(!args.contains(&"--headless"));
        assert_eq!(chrome["excludeSwitches"][0], "enable-automation");
        assert_eq!(chrome["prefs"]["download.default_directory"], "/out/downloads");
        assert_eq!(chrome["prefs"]["download.prompt_for_download"], false);
    }

    #[test]
    fn test_firefox_headless_capabilities() {
        let caps = capabilities(&options(BrowserKind::Firefox, true));
        let args = caps["moz:firefoxOptions"]["args"].as_array().unwrap();

        assert_eq!(caps["browserName"], "firefox");
        assert!(args.contains(&json!("--width=1920")));
        assert!(args.contains(&json!("--headless")));
        assert_eq!(
            caps["moz:firefoxOptions"]["prefs"]["browser.download.dir"],
            "/out/downloads"
        );
    }

    #[test]
    fn test_driver_error_classification() {
        let gone: DriverError = ClientError::WebDriver {
            error: "invalid session id".to_string(),
            message: "deleted".to_string(),
        }
        .into();
        assert!(gone.is_connection_lost());

        let failed: DriverError = ClientError::WebDriver {
            error: "no such element".to_string(),
            message: "#x".to_string(),
        }
        .into();
        assert!(!failed.is_connection_lost());
    }
}
