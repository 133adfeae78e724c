//! Minimal W3C WebDriver client
//!
//! Speaks just enough of the protocol to run test scripts against
//! chromedriver or geckodriver: session lifecycle, navigation, element lookup
//! by CSS selector, clicks, typing, text, synchronous script execution and
//! screenshots. Every response is wrapped in the W3C `{"value": ...}`
//! envelope; error responses carry `{"value": {"error", "message"}}`.

use crate::error::{ClientError, Result};
use base64::Engine;
use reqwest::{Client, Method};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use std::time::Duration;

/// Key under which W3C drivers return element references
pub const ELEMENT_KEY: &str = "element-6066-11e4-a52e-4f735466cecf";

/// Upper bound for a single WebDriver command
const COMMAND_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Deserialize)]
struct Envelope<T> {
    value: T,
}

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
    #[serde(default)]
    message: String,
}

#[derive(Deserialize)]
struct NewSession {
    #[serde(rename = "sessionId")]
    session_id: String,
}

/// Client for one WebDriver server (chromedriver, geckodriver, ...)
#[derive(Debug, Clone)]
pub struct WebDriverClient {
    base_url: String,
    client: Client,
}

impl WebDriverClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        let client = Client::builder()
            .timeout(COMMAND_TIMEOUT)
            .build()
            .unwrap_or_else(|_| Client::new());
        Self::with_client(base_url, client)
    }

    pub fn with_client(base_url: impl Into<String>, client: Client) -> Self {
        let base_url = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Start a new browser session with the given `capabilities` object
    ///
    /// `capabilities` is sent as `{"capabilities": {"alwaysMatch": ...}}`.
    pub async fn new_session(&self, capabilities: Value) -> Result<WebDriverSession> {
        let url = format!("{}/session", self.base_url);
        let body = json!({ "capabilities": { "alwaysMatch": capabilities } });
        let response = self.client.post(&url).json(&body).send().await?;
        let session: NewSession = read_value(response).await?;

        tracing::debug!(session_id = %session.session_id, "WebDriver session created");

        Ok(WebDriverSession {
            base_url: self.base_url.clone(),
            session_id: session.session_id,
            client: self.client.clone(),
        })
    }
}

/// One live browser session
#[derive(Debug, Clone)]
pub struct WebDriverSession {
    base_url: String,
    session_id: String,
    client: Client,
}

impl WebDriverSession {
    pub fn id(&self) -> &str {
        &self.session_id
    }

    /// End the session and close the browser
    pub async fn delete(&self) -> Result<()> {
        let _: Value = self.command(Method::DELETE, "", None).await?;
        Ok(())
    }

    pub async fn navigate(&self, url: &str) -> Result<()> {
        let _: Value = self
            .command(Method::POST, "/url", Some(json!({ "url": url })))
            .await?;
        Ok(())
    }

    pub async fn current_url(&self) -> Result<String> {
        self.command(Method::GET, "/url", None).await
    }

    pub async fn title(&self) -> Result<String> {
        self.command(Method::GET, "/title", None).await
    }

    /// Find the first element matching a CSS selector, returning its id
    pub async fn find_element(&self, selector: &str) -> Result<String> {
        let element: Value = self
            .command(Method::POST, "/element", Some(locator(selector)))
            .await?;
        element_id(&element)
    }

    /// Find every element matching a CSS selector
    pub async fn find_elements(&self, selector: &str) -> Result<Vec<String>> {
        let elements: Vec<Value> = self
            .command(Method::POST, "/elements", Some(locator(selector)))
            .await?;
        elements.iter().map(element_id).collect()
    }

    pub async fn click(&self, element_id: &str) -> Result<()> {
        let path = format!("/element/{}/click", element_id);
        let _: Value = self.command(Method::POST, &path, Some(json!({}))).await?;
        Ok(())
    }

    pub async fn send_keys(&self, element_id: &str, text: &str) -> Result<()> {
        let path = format!("/element/{}/value", element_id);
        let _: Value = self
            .command(Method::POST, &path, Some(json!({ "text": text })))
            .await?;
        Ok(())
    }

    pub async fn element_text(&self, element_id: &str) -> Result<String> {
        let path = format!("/element/{}/text", element_id);
        self.command(Method::GET, &path, None).await
    }

    /// Run JavaScript synchronously in the page and return its result
    pub async fn execute(&self, script: &str, args: Vec<Value>) -> Result<Value> {
        self.command(
            Method::POST,
            "/execute/sync",
            Some(json!({ "script": script, "args": args })),
        )
        .await
    }

    /// Capture the viewport as PNG bytes
    pub async fn screenshot(&self) -> Result<Vec<u8>> {
        let encoded: String = self.command(Method::GET, "/screenshot", None).await?;
        base64::engine::general_purpose::STANDARD
            .decode(encoded.as_bytes())
            .map_err(|e| ClientError::ParseError(format!("Invalid screenshot data: {}", e)))
    }

    /// Cheap liveness probe: asks for the current URL
    pub async fn is_alive(&self) -> bool {
        self.current_url().await.is_ok()
    }

    async fn command<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<T> {
        let url = format!("{}/session/{}{}", self.base_url, self.session_id, path);
        let mut request = self.client.request(method, &url);
        if let Some(body) = body {
            request = request.json(&body);
        }
        let response = request.send().await?;
        read_value(response).await
    }
}

fn locator(selector: &str) -> Value {
    json!({ "using": "css selector", "value": selector })
}

fn element_id(element: &Value) -> Result<String> {
    element
        .get(ELEMENT_KEY)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| ClientError::ParseError(format!("Not an element reference: {}", element)))
}

/// Unwrap the `value` envelope, turning W3C error bodies into errors
async fn read_value<T: DeserializeOwned>(response: reqwest::Response) -> Result<T> {
    let status = response.status();
    let text = response.text().await?;

    if !status.is_success() {
        return Err(match serde_json::from_str::<Envelope<ErrorBody>>(&text) {
            Ok(envelope) => ClientError::WebDriver {
                error: envelope.value.error,
                message: envelope.value.message,
            },
            Err(_) => ClientError::api_error(status.as_u16(), text),
        });
    }

    serde_json::from_str::<Envelope<T>>(&text)
        .map(|envelope| envelope.value)
        .map_err(|e| ClientError::ParseError(format!("Failed to parse WebDriver response: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn session(server: &MockServer) -> WebDriverSession {
        Mock::given(method("POST"))
            .and(path("/session"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "value": { "sessionId": "abc123", "capabilities": {} }
            })))
            .mount(server)
            .await;

        WebDriverClient::new(server.uri())
            .new_session(json!({ "browserName": "chrome" }))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_new_session() {
        let server = MockServer::start().await;
        let session = session(&server).await;
        assert_eq!(session.id(), "abc123");
    }

    #[tokio::test]
    async fn test_find_and_click() {
        let server = MockServer::start().await;
        let session = session(&server).await;

        Mock::given(method("POST"))
            .and(path("/session/abc123/element"))
            .and(body_json(json!({ "using": "css selector", "value": "#login" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "value": { ELEMENT_KEY: "el-1" }
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/session/abc123/element/el-1/click"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "value": null })))
            .expect(1)
            .mount(&server)
            .await;

        let id = session.find_element("#login").await.unwrap();
        assert_eq!(id, "el-1");
        session.click(&id).await.unwrap();
    }

    #[tokio::test]
    async fn test_title_and_screenshot() {
        let server = MockServer::start().await;
        let session = session(&server).await;

        Mock::given(method("GET"))
            .and(path("/session/abc123/title"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({ "value": "Example Domain" })),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/session/abc123/screenshot"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "value": "iVBORw==" })))
            .mount(&server)
            .await;

        assert_eq!(session.title().await.unwrap(), "Example Domain");
        assert_eq!(session.screenshot().await.unwrap(), vec![0x89, 0x50, 0x4e, 0x47]);
    }

    #[tokio::test]
    async fn test_error_body_is_parsed() {
        let server = MockServer::start().await;
        let session = session(&server).await;

        Mock::given(method("POST"))
            .and(path("/session/abc123/element"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({
                "value": { "error": "no such element", "message": "Unable to locate #nope", "stacktrace": "" }
            })))
            .mount(&server)
            .await;

        let err = session.find_element("#nope").await.unwrap_err();
        assert!(matches!(err, ClientError::WebDriver { ref error, .. } if error == "no such element"));
        assert!(!err.is_connection_lost());
    }

    #[tokio::test]
    async fn test_dead_session_is_connection_lost() {
        let server = MockServer::start().await;
        let session = session(&server).await;

        Mock::given(method("GET"))
            .and(path("/session/abc123/url"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({
                "value": { "error": "invalid session id", "message": "session deleted" }
            })))
            .mount(&server)
            .await;

        let err = session.current_url().await.unwrap_err();
        assert!(err.is_connection_lost());
        assert!(!session.is_alive().await);
    }
}
