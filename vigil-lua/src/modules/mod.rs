//! Core modules for test scripts
//!
//! Each module is generic over a trait supplied by its host, so the same Lua
//! surface can be backed differently:
//! - Runner: live browser session, buffered job log
//! - CLI: stub generation only

pub mod browser;
pub mod job;
pub mod log;

pub use browser::{BrowserCommands, BrowserModule, CommandError};
pub use job::{JobInfo, JobModule};
pub use log::{LogModule, LogSink};
