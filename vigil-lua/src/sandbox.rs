//! Lua sandbox creation
//!
//! Test scripts run in a restricted Lua state without filesystem, process or
//! module-loading access. Everything a script may do to the outside world goes
//! through the modules registered by the runner (`log`, `job`, `browser`).

use mlua::{HookTriggers, Lua, LuaOptions, Result as LuaResult, StdLib};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

/// Number of VM instructions between deadline checks
const DEADLINE_CHECK_INTERVAL: u32 = 10_000;

/// Create a restricted Lua sandbox
///
/// Only the base functions plus the table, string, math, utf8 and coroutine
/// libraries are loaded. `io`, `os`, `package` and `debug` are absent, and
/// `require`, `dofile`, `loadfile` and `collectgarbage` are removed.
///
/// # Example
/// ```no_run
/// use vigil_lua::sandbox::create_sandbox;
///
/// let lua = create_sandbox()?;
/// let n: i64 = lua.load("return #string.rep('a', 3)").eval()?;
/// assert_eq!(n, 3);
/// # Ok::<(), mlua::Error>(())
/// ```
pub fn create_sandbox() -> LuaResult<Lua> {
    let lua = Lua::new_with(
        StdLib::TABLE | StdLib::STRING | StdLib::MATH | StdLib::UTF8 | StdLib::COROUTINE,
        LuaOptions::default(),
    )?;

    let globals = lua.globals();
    globals.set("require", mlua::Nil)?;
    globals.set("dofile", mlua::Nil)?;
    globals.set("loadfile", mlua::Nil)?;
    globals.set("collectgarbage", mlua::Nil)?;

    Ok(lua)
}

/// Re-raises errors caught by `pcall`, `xpcall` and `coroutine.resume` once
/// the deadline has expired, so a script cannot swallow it.
const GUARD_PROTECTED_CALLS: &str = r#"
local expired = ...
local pcall, xpcall, resume = pcall, xpcall, coroutine.resume

local function settle(ok, ...)
    if not ok and expired() then
        error((...), 0)
    end
    return ok, ...
end

_G.pcall = function(...) return settle(pcall(...)) end
_G.xpcall = function(...) return settle(xpcall(...)) end
coroutine.resume = function(...) return settle(resume(...)) end
"#;

/// Aborts script execution once `deadline` has passed
///
/// The async timeout around a script only fires when the script yields (for
/// example inside a browser command). This hook covers pure-Lua loops: every
/// few thousand instructions, on every thread created after this call, it
/// checks the clock and raises an error once the deadline is gone, setting
/// `expired` so callers can tell a deadline abort apart from an ordinary
/// script error. After expiry, protected calls no longer catch errors.
///
/// Install it before the script is loaded.
pub fn install_deadline(lua: &Lua, deadline: Instant, expired: Arc<AtomicBool>) -> LuaResult<()> {
    let probe = expired.clone();
    let is_expired = lua.create_function(move |_, ()| Ok(probe.load(Ordering::SeqCst)))?;
    lua.load(GUARD_PROTECTED_CALLS)
        .set_name("=deadline")
        .call::<()>(is_expired)?;

    let triggers = HookTriggers::new().every_nth_instruction(DEADLINE_CHECK_INTERVAL);
    lua.set_global_hook(triggers, move |_lua, _debug| {
        if expired.load(Ordering::SeqCst) || Instant::now() >= deadline {
            expired.store(true, Ordering::SeqCst);
            return Err(mlua::Error::RuntimeError(
                "script exceeded its deadline".to_string(),
            ));
        }
        Ok(mlua::VmState::Continue)
    })
}
