//! Lua execution layer
//!
//! Connects the sandbox from `vigil-lua` to the worker: script logs go to
//! the job's log buffer, browser commands go to the leased session.

pub mod browser;
pub mod executor;
pub mod sinks;

pub use executor::ScriptExecutor;
