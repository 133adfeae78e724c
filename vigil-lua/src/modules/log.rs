//! Logging module for test scripts
//!
//! Exposes `log.debug/info/warning/error` and replaces the global `print` so
//! that everything a script reports ends up in the job log instead of the
//! worker's stdout.

use crate::module::VigilModule;
use mlua::prelude::*;
use std::sync::{Arc, Mutex};
use vigil_core::domain::log::LogLevel;

/// Destination for script log lines
///
/// # Thread Safety
/// Implementations must be Send + Sync to work with Lua's threading model.
pub trait LogSink: Send + Sync {
    fn write(&mut self, level: LogLevel, message: &str);
}

/// Logging module, generic over where the lines go
pub struct LogModule<S: LogSink> {
    sink: Arc<Mutex<S>>,
}

impl<S: LogSink> LogModule<S> {
    pub fn new(sink: S) -> Self {
        Self {
            sink: Arc::new(Mutex::new(sink)),
        }
    }
}

fn write_to<S: LogSink>(sink: &Mutex<S>, level: LogLevel, message: &str) -> LuaResult<()> {
    sink.lock()
        .map_err(|e| LuaError::RuntimeError(format!("Failed to lock sink: {}", e)))?
        .write(level, message);
    Ok(())
}

/// Renders a Lua value the way `print` would, without invoking metamethods
fn display_value(value: &LuaValue) -> String {
    match value {
        LuaValue::Nil => "nil".to_string(),
        LuaValue::Boolean(b) => b.to_string(),
        LuaValue::Integer(i) => i.to_string(),
        LuaValue::Number(n) => n.to_string(),
        LuaValue::String(s) => s.to_string_lossy().to_string(),
        other => other.type_name().to_string(),
    }
}

impl<S: LogSink + 'static> VigilModule for LogModule<S> {
    fn id(&self) -> &'static str {
        "log"
    }

    fn register(&self, lua: &Lua) -> LuaResult<()> {
        let log_table = lua.create_table()?;

        let levels = [
            ("debug", LogLevel::Debug),
            ("info", LogLevel::Info),
            ("warning", LogLevel::Warning),
            ("error", LogLevel::Error),
        ];

        for (name, level) in levels {
            let sink = self.sink.clone();
            log_table.set(
                name,
                lua.create_function(move |_, msg: String| write_to(&sink, level, &msg))?,
            )?;
        }

        // print(...) joins its arguments with tabs, like the stock print
        {
            let sink = self.sink.clone();
            let print = lua.create_function(move |_, args: LuaVariadic<LuaValue>| {
                let line = args.iter().map(display_value).collect::<Vec<_>>().join("\t");
                write_to(&sink, LogLevel::Info, &line)
            })?;
            lua.globals().set("print", print)?;
        }

        lua.globals().set(self.id(), log_table)?;
        Ok(())
    }

    fn stubs(&self) -> String {
        r#"---@meta

---Job log. Everything written here is uploaded with the test result.
---@class log
log = {}

---Log a debug message
---@param msg string The message to log
function log.debug(msg) end

---Log an info message
---@param msg string The message to log
function log.info(msg) end

---Log a warning message
---@param msg string The message to log
function log.warning(msg) end

---Log an error message
---@param msg string The message to log
function log.error(msg) end
"#
        .to_string()
    }

    fn metadata(&self) -> crate::module::ModuleMetadata {
        crate::module::ModuleMetadata {
            id: self.id(),
            version: "1.0.0",
            description: "Job log for test scripts",
        }
    }
}
