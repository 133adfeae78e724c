//! Test script loading and verdicts
//!
//! A script is a Lua chunk. It passes unless it raises an error or returns
//! `false`. If the chunk defines a global `run` function, `run(browser)` is
//! called after the chunk and its return value decides instead:
//!
//! ```lua
//! function run(browser)
//!     browser.open("https://www.example.com")
//!     browser.wait_for("h1", 10)
//!     local title = browser.title()
//!     return title:find("Example") ~= nil, "title does not contain 'Example'"
//! end
//! ```

use mlua::{Function, Lua, Result as LuaResult, Value};

use crate::sandbox::create_sandbox;

/// Pass/fail decision returned by a script that ran to completion
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Passed,
    Failed(Option<String>),
}

impl Verdict {
    pub fn passed(&self) -> bool {
        matches!(self, Verdict::Passed)
    }

    fn from_returns(value: Value, message: Value) -> Self {
        match value {
            Value::Boolean(false) => Verdict::Failed(match message {
                Value::String(s) => Some(s.to_string_lossy().to_string()),
                _ => None,
            }),
            _ => Verdict::Passed,
        }
    }
}

/// Compiles `source` without running it
///
/// Returns the Lua syntax error message on failure.
pub fn check_syntax(source: &str) -> Result<(), String> {
    let lua = create_sandbox().map_err(|e| e.to_string())?;
    lua.load(source)
        .set_name("=script")
        .into_function()
        .map(|_| ())
        .map_err(|e| e.to_string())
}

/// Runs a script chunk inside `lua` and returns its verdict
///
/// Modules must already be registered. Lua errors (including failed
/// `assert`s) are returned as `Err` for the caller to classify.
pub async fn run_script(lua: &Lua, name: &str, source: &str) -> LuaResult<Verdict> {
    let (value, message): (Value, Value) = lua
        .load(source)
        .set_name(format!("={}", name))
        .call_async(())
        .await?;

    let run: Value = lua.globals().get("run")?;
    if let Value::Function(run) = run {
        return call_run(lua, run).await;
    }

    Ok(Verdict::from_returns(value, message))
}

async fn call_run(lua: &Lua, run: Function) -> LuaResult<Verdict> {
    let browser: Value = lua.globals().get("browser")?;
    let (value, message): (Value, Value) = run.call_async(browser).await?;
    Ok(Verdict::from_returns(value, message))
}
