//! Vigil Lua Infrastructure
//!
//! Test scripts are Lua chunks executed in a restricted sandbox. This crate
//! provides:
//! - Module trait and registry for the modules scripts can use
//! - The sandbox itself, with a deadline hook for runaway scripts
//! - Core modules: `log`, `job` and `browser`
//! - Script loading, syntax checking and verdict extraction

pub mod module;
pub mod modules;
pub mod sandbox;
pub mod script;

pub use module::{ModuleMetadata, ModuleRegistry, VigilModule};
pub use modules::{BrowserCommands, BrowserModule, CommandError, JobInfo, JobModule, LogModule, LogSink};
pub use sandbox::{create_sandbox, install_deadline};
pub use script::{Verdict, check_syntax, run_script};
