//! Browser module for test scripts
//!
//! The `browser` global is the script's only handle on the live session. All
//! functions are async on the Rust side, so a script waiting on the browser
//! yields back to the runtime and the job deadline can interrupt it.
//!
//! Command failures are raised as Lua errors. Failures caused by a lost driver
//! connection additionally trip the module's crash flag, which the runner
//! reads to tell "the test failed" apart from "the browser died".

use crate::module::VigilModule;
use async_trait::async_trait;
use mlua::prelude::*;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use thiserror::Error;

/// Poll interval used by `browser.wait_for`
const WAIT_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Error returned by a browser command
#[derive(Debug, Error)]
pub enum CommandError {
    /// The driver is unreachable or the session no longer exists
    #[error("browser connection lost: {0}")]
    ConnectionLost(String),

    /// The command reached the browser and failed there
    #[error("{0}")]
    Failed(String),
}

impl CommandError {
    pub fn is_connection_lost(&self) -> bool {
        matches!(self, CommandError::ConnectionLost(_))
    }
}

/// Page interactions available to scripts
#[async_trait]
pub trait BrowserCommands: Send + Sync {
    async fn open(&self, url: &str) -> Result<(), CommandError>;
    async fn title(&self) -> Result<String, CommandError>;
    async fn current_url(&self) -> Result<String, CommandError>;
    async fn click(&self, selector: &str) -> Result<(), CommandError>;
    async fn type_text(&self, selector: &str, text: &str) -> Result<(), CommandError>;
    async fn text(&self, selector: &str) -> Result<String, CommandError>;
    /// Whether at least one element matches `selector`
    async fn exists(&self, selector: &str) -> Result<bool, CommandError>;
    async fn execute(&self, script: &str) -> Result<serde_json::Value, CommandError>;
    /// Saves a step screenshot and returns its path
    async fn screenshot(&self, tag: &str) -> Result<String, CommandError>;
}

pub struct BrowserModule {
    commands: Arc<dyn BrowserCommands>,
    crashed: Arc<AtomicBool>,
}

impl BrowserModule {
    pub fn new(commands: Arc<dyn BrowserCommands>) -> Self {
        Self {
            commands,
            crashed: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Set once any command fails with [`CommandError::ConnectionLost`]
    pub fn crash_flag(&self) -> Arc<AtomicBool> {
        self.crashed.clone()
    }
}

/// Script-supplied seconds, clamped to something `Duration` accepts
fn seconds_to_duration(seconds: f64) -> Duration {
    if seconds.is_nan() {
        return Duration::ZERO;
    }
    Duration::from_secs_f64(seconds.clamp(0.0, 86_400.0))
}

fn into_lua_error(crashed: &AtomicBool, err: CommandError) -> LuaError {
    if err.is_connection_lost() {
        crashed.store(true, Ordering::SeqCst);
    }
    LuaError::external(err)
}

impl VigilModule for BrowserModule {
    fn id(&self) -> &'static str {
        "browser"
    }

    fn register(&self, lua: &Lua) -> LuaResult<()> {
        let browser = lua.create_table()?;

        {
            let (commands, crashed) = (self.commands.clone(), self.crashed.clone());
            browser.set(
                "open",
                lua.create_async_function(move |_, url: String| {
                    let (commands, crashed) = (commands.clone(), crashed.clone());
                    async move {
                        commands
                            .open(&url)
                            .await
                            .map_err(|e| into_lua_error(&crashed, e))
                    }
                })?,
            )?;
        }

        {
            let (commands, crashed) = (self.commands.clone(), self.crashed.clone());
            browser.set(
                "title",
                lua.create_async_function(move |_, ()| {
                    let (commands, crashed) = (commands.clone(), crashed.clone());
                    async move {
                        commands
                            .title()
                            .await
                            .map_err(|e| into_lua_error(&crashed, e))
                    }
                })?,
            )?;
        }

        {
            let (commands, crashed) = (self.commands.clone(), self.crashed.clone());
            browser.set(
                "url",
                lua.create_async_function(move |_, ()| {
                    let (commands, crashed) = (commands.clone(), crashed.clone());
                    async move {
                        commands
                            .current_url()
                            .await
                            .map_err(|e| into_lua_error(&crashed, e))
                    }
                })?,
            )?;
        }

        {
            let (commands, crashed) = (self.commands.clone(), self.crashed.clone());
            browser.set(
                "click",
                lua.create_async_function(move |_, selector: String| {
                    let (commands, crashed) = (commands.clone(), crashed.clone());
                    async move {
                        commands
                            .click(&selector)
                            .await
                            .map_err(|e| into_lua_error(&crashed, e))
                    }
                })?,
            )?;
        }

        {
            let (commands, crashed) = (self.commands.clone(), self.crashed.clone());
            browser.set(
                "type",
                lua.create_async_function(move |_, (selector, text): (String, String)| {
                    let (commands, crashed) = (commands.clone(), crashed.clone());
                    async move {
                        commands
                            .type_text(&selector, &text)
                            .await
                            .map_err(|e| into_lua_error(&crashed, e))
                    }
                })?,
            )?;
        }

        {
            let (commands, crashed) = (self.commands.clone(), self.crashed.clone());
            browser.set(
                "text",
                lua.create_async_function(move |_, selector: String| {
                    let (commands, crashed) = (commands.clone(), crashed.clone());
                    async move {
                        commands
                            .text(&selector)
                            .await
                            .map_err(|e| into_lua_error(&crashed, e))
                    }
                })?,
            )?;
        }

        // browser.wait_for(selector, seconds?) polls until the element shows up
        {
            let (commands, crashed) = (self.commands.clone(), self.crashed.clone());
            browser.set(
                "wait_for",
                lua.create_async_function(move |_, (selector, seconds): (String, Option<f64>)| {
                    let (commands, crashed) = (commands.clone(), crashed.clone());
                    async move {
                        let limit = seconds_to_duration(seconds.unwrap_or(10.0));
                        let deadline = Instant::now() + limit;
                        loop {
                            let found = match commands.exists(&selector).await {
                                Ok(found) => found,
                                Err(e) => return Err(into_lua_error(&crashed, e)),
                            };
                            if found {
                                return Ok(());
                            }
                            if Instant::now() >= deadline {
                                return Err(LuaError::RuntimeError(format!(
                                    "timed out after {:.1}s waiting for '{}'",
                                    limit.as_secs_f64(),
                                    selector
                                )));
                            }
                            tokio::time::sleep(WAIT_POLL_INTERVAL).await;
                        }
                    }
                })?,
            )?;
        }

        {
            let (commands, crashed) = (self.commands.clone(), self.crashed.clone());
            browser.set(
                "execute",
                lua.create_async_function(move |lua, script: String| {
                    let (commands, crashed) = (commands.clone(), crashed.clone());
                    async move {
                        match commands.execute(&script).await {
                            Ok(value) => lua.to_value(&value),
                            Err(e) => Err(into_lua_error(&crashed, e)),
                        }
                    }
                })?,
            )?;
        }

        {
            let (commands, crashed) = (self.commands.clone(), self.crashed.clone());
            browser.set(
                "screenshot",
                lua.create_async_function(move |_, tag: Option<String>| {
                    let (commands, crashed) = (commands.clone(), crashed.clone());
                    async move {
                        let tag = tag.unwrap_or_else(|| "step".to_string());
                        commands
                            .screenshot(&tag)
                            .await
                            .map_err(|e| into_lua_error(&crashed, e))
                    }
                })?,
            )?;
        }

        browser.set(
            "sleep",
            lua.create_async_function(|_, seconds: f64| async move {
                tokio::time::sleep(seconds_to_duration(seconds)).await;
                Ok(())
            })?,
        )?;

        lua.globals().set(self.id(), browser)?;
        Ok(())
    }

    fn stubs(&self) -> String {
        BROWSER_STUBS.to_string()
    }

    fn metadata(&self) -> crate::module::ModuleMetadata {
        crate::module::ModuleMetadata {
            id: self.id(),
            version: "1.0.0",
            description: "Live browser session for the running test",
        }
    }
}

/// LuaLS definitions for the `browser` module
pub const BROWSER_STUBS: &str = r#"---@meta

---Live browser session. Every function raises an error on failure.
---@class browser
browser = {}

---Navigate to a URL
---@param url string
function browser.open(url) end

---Title of the current page
---@return string
function browser.title() end

---URL of the current page
---@return string
function browser.url() end

---Click the first element matching a CSS selector
---@param selector string
function browser.click(selector) end

---Type text into the first element matching a CSS selector
---@param selector string
---@param text string
function browser.type(selector, text) end

---Visible text of the first element matching a CSS selector
---@param selector string
---@return string
function browser.text(selector) end

---Wait until an element matching the selector exists
---@param selector string
---@param seconds? number Defaults to 10
function browser.wait_for(selector, seconds) end

---Run JavaScript in the page and return its result
---@param script string
---@return any
function browser.execute(script) end

---Save a step screenshot and return its path
---@param tag? string Defaults to "step"
---@return string
function browser.screenshot(tag) end

---Pause the script
---@param seconds number
function browser.sleep(seconds) end
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Records calls and serves a tiny fake page
    #[derive(Default)]
    struct FakePage {
        calls: Mutex<Vec<String>>,
        disconnected: bool,
    }

    #[async_trait]
    impl BrowserCommands for FakePage {
        async fn open(&self, url: &str) -> Result<(), CommandError> {
            if self.disconnected {
                return Err(CommandError::ConnectionLost("driver gone".to_string()));
            }
            self.calls.lock().unwrap().push(format!("open {}", url));
            Ok(())
        }

        async fn title(&self) -> Result<String, CommandError> {
            Ok("Example Domain".to_string())
        }

        async fn current_url(&self) -> Result<String, CommandError> {
            Ok("https://example.com/".to_string())
        }

        async fn click(&self, selector: &str) -> Result<(), CommandError> {
            if selector == "#missing" {
                return Err(CommandError::Failed("no such element".to_string()));
            }
            self.calls.lock().unwrap().push(format!("click {}", selector));
            Ok(())
        }

        async fn type_text(&self, selector: &str, text: &str) -> Result<(), CommandError> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("type {} {}", selector, text));
            Ok(())
        }

        async fn text(&self, _selector: &str) -> Result<String, CommandError> {
            Ok("Example Domain".to_string())
        }

        async fn exists(&self, selector: &str) -> Result<bool, CommandError> {
            Ok(selector == "h1")
        }

        async fn execute(&self, _script: &str) -> Result<serde_json::Value, CommandError> {
            Ok(serde_json::json!({"ready": true, "count": 3}))
        }

        async fn screenshot(&self, tag: &str) -> Result<String, CommandError> {
            Ok(format!("/out/screenshots/t1_step_{}.png", tag))
        }
    }

    fn sandbox_with(page: Arc<FakePage>) -> (Lua, Arc<AtomicBool>) {
        let lua = Lua::new();
        let module = BrowserModule::new(page);
        let crashed = module.crash_flag();
        module.register(&lua).unwrap();
        (lua, crashed)
    }

    #[tokio::test]
    async fn test_browser_commands_reach_session() {
        let page = Arc::new(FakePage::default());
        let (lua, crashed) = sandbox_with(page.clone());

        let title: String = lua
            .load(
                r##"
                browser.open("https://example.com")
                browser.type("#q", "rust")
                browser.click("#go")
                browser.wait_for("h1", 1)
                return browser.title()
            "##,
            )
            .eval_async()
            .await
            .unwrap();

        assert_eq!(title, "Example Domain");
        assert!(!crashed.load(Ordering::SeqCst));
        let calls = page.calls.lock().unwrap();
        assert_eq!(
            *calls,
            vec!["open https://example.com", "type #q rust", "click #go"]
        );
    }

    #[tokio::test]
    async fn test_execute_converts_json() {
        let (lua, _) = sandbox_with(Arc::new(FakePage::default()));

        let count: i64 = lua
            .load(r#"local r = browser.execute("return 1") return r.count"#)
            .eval_async()
            .await
            .unwrap();
        assert_eq!(count, 3);
    }

    #[tokio::test]
    async fn test_command_failure_is_not_a_crash() {
        let (lua, crashed) = sandbox_with(Arc::new(FakePage::default()));

        let result = lua.load(r##"browser.click("#missing")"##).exec_async().await;
        let err = result.unwrap_err().to_string();
        assert!(err.contains("no such element"));
        assert!(!crashed.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_connection_loss_trips_crash_flag() {
        let page = Arc::new(FakePage {
            disconnected: true,
            ..Default::default()
        });
        let (lua, crashed) = sandbox_with(page);

        let result = lua
            .load(r#"browser.open("https://example.com")"#)
            .exec_async()
            .await;
        assert!(result.is_err());
        assert!(crashed.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_wait_for_times_out() {
        let (lua, _) = sandbox_with(Arc::new(FakePage::default()));

        let result = lua
            .load(r#"browser.wait_for(".never", 0.3)"#)
            .exec_async()
            .await;
        let err = result.unwrap_err().to_string();
        assert!(err.contains("waiting for '.never'"));
    }

    #[tokio::test]
    async fn test_screenshot_default_tag() {
        let (lua, _) = sandbox_with(Arc::new(FakePage::default()));

        let path: String = lua
            .load("return browser.screenshot()")
            .eval_async()
            .await
            .unwrap();
        assert_eq!(path, "/out/screenshots/t1_step_step.png");
    }
}
