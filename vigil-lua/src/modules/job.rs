//! Job module
//!
//! Gives scripts read-only access to the job they are running for
//! (`job.test_id`, `job.user_id`, `job.browser`, `job.headless`, `job.timeout`).

use crate::module::VigilModule;
use mlua::prelude::*;
use vigil_core::domain::job::JobRecord;

/// Job fields visible to scripts
#[derive(Debug, Clone)]
pub struct JobInfo {
    pub test_id: String,
    pub user_id: String,
    pub browser: String,
    pub headless: bool,
    pub timeout_seconds: u64,
}

impl From<&JobRecord> for JobInfo {
    fn from(job: &JobRecord) -> Self {
        Self {
            test_id: job.test_id().to_string(),
            user_id: job.user_id().to_string(),
            browser: job.browser().to_string(),
            headless: job.headless(),
            timeout_seconds: job.timeout_seconds(),
        }
    }
}

pub struct JobModule {
    info: JobInfo,
}

impl JobModule {
    pub fn new(info: JobInfo) -> Self {
        Self { info }
    }
}

impl VigilModule for JobModule {
    fn id(&self) -> &'static str {
        "job"
    }

    fn register(&self, lua: &Lua) -> LuaResult<()> {
        let fields = lua.create_table()?;
        fields.set("test_id", self.info.test_id.as_str())?;
        fields.set("user_id", self.info.user_id.as_str())?;
        fields.set("browser", self.info.browser.as_str())?;
        fields.set("headless", self.info.headless)?;
        fields.set("timeout", self.info.timeout_seconds)?;

        // Empty proxy table: reads fall through to `fields`, writes raise
        let proxy = lua.create_table()?;
        let metatable = lua.create_table()?;
        metatable.set("__index", fields)?;
        metatable.set(
            "__newindex",
            lua.create_function(|_, (_, key): (LuaTable, LuaValue)| -> LuaResult<()> {
                let key = match key {
                    LuaValue::String(s) => s.to_string_lossy().to_string(),
                    other => other.type_name().to_string(),
                };
                Err(LuaError::RuntimeError(format!(
                    "job is read-only (attempted to set '{}')",
                    key
                )))
            })?,
        )?;
        metatable.set("__metatable", false)?;
        proxy.set_metatable(Some(metatable))?;

        lua.globals().set(self.id(), proxy)?;
        Ok(())
    }

    fn stubs(&self) -> String {
        r#"---@meta

---The job this script is running for (read-only)
---@class job
---@field test_id string Test identifier
---@field user_id string Submitting user, "unknown" when not provided
---@field browser string "chrome" or "firefox"
---@field headless boolean Whether the browser runs headless
---@field timeout integer Script deadline in seconds
job = {}
"#
        .to_string()
    }
}
