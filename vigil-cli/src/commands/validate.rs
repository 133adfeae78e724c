//! Validate command handler
//!
//! Runs the same checks a worker applies to a payload, plus a Lua syntax
//! check, without touching the queue.

use anyhow::{Context, Result};
use colored::*;
use std::fs;
use std::path::Path;
use vigil_core::domain::job::{JobRecord, parse};
use vigil_lua::check_syntax;

/// Parse and syntax-check a raw payload
pub fn check_payload(raw: &[u8]) -> Result<JobRecord> {
    let job = parse(raw)?;
    check_syntax(job.script())
        .map_err(|e| anyhow::anyhow!("script does not compile: {}", e))?;
    Ok(job)
}

/// Validate a job file and print its effective settings
pub fn validate_file(path: &Path) -> Result<()> {
    let raw = fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;

    match check_payload(&raw) {
        Ok(job) => {
            println!("{}", "✓ Job is valid".green().bold());
            print_summary(&job);
            Ok(())
        }
        Err(e) => {
            println!("{} {}", "✗".red().bold(), path.display());
            Err(e)
        }
    }
}

/// Print the effective job settings after defaults are applied
pub fn print_summary(job: &JobRecord) {
    println!("  {}: {}", "Test".bold(), job.test_id().cyan());
    println!("  {}: {}", "Browser".bold(), job.browser());
    println!("  {}: {}", "Headless".bold(), job.headless());
    println!("  {}: {}s", "Timeout".bold(), job.timeout_seconds());
    println!("  {}: {}", "User".bold(), job.user_id());
    println!("  {}: {} bytes", "Script".bold(), job.script().len());
}
