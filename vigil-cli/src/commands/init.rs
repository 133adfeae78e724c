//! Init command handlers
//!
//! Generates the Lua Language Server setup for writing test scripts:
//! .luarc.json plus one stub file per script module.

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::*;
use std::fs;
use std::path::Path;
use vigil_core::domain::log::LogLevel;
use vigil_lua::module::VigilModule;
use vigil_lua::modules::browser::BROWSER_STUBS;
use vigil_lua::{JobInfo, JobModule, LogModule, LogSink};

use crate::config::Config;

/// Init subcommands
#[derive(Subcommand)]
pub enum InitCommands {
    /// Generate Lua development files (.luarc.json and stubs)
    Lua {
        /// Output directory for generated files
        #[arg(short, long, default_value = ".")]
        output: String,

        /// Generate only .luarc.json
        #[arg(long)]
        config_only: bool,

        /// Generate only stub files
        #[arg(long)]
        stubs_only: bool,
    },
}

/// Handle init commands
pub async fn handle_init_command(command: InitCommands, _config: &Config) -> Result<()> {
    match command {
        InitCommands::Lua {
            output,
            config_only,
            stubs_only,
        } => generate_lua_dev_files(Path::new(&output), config_only, stubs_only),
    }
}

fn generate_lua_dev_files(output_path: &Path, config_only: bool, stubs_only: bool) -> Result<()> {
    if !stubs_only {
        generate_luarc_json(output_path)?;
    }

    if !config_only {
        generate_stub_files(output_path)?;
    }

    println!("{}", "✓ Lua development files generated!".green().bold());
    println!();
    println!("{}", "Next steps:".bold());
    println!("  1. Install Lua Language Server in your editor");
    println!("  2. Open your test script to see autocomplete and type hints");
    println!(
        "  3. Use {} to submit it",
        "vigil enqueue --script test.lua --test-id my-test".cyan()
    );

    Ok(())
}

/// Generate .luarc.json for Lua LSP configuration
fn generate_luarc_json(output_path: &Path) -> Result<()> {
    fs::create_dir_all(output_path)
        .with_context(|| format!("Failed to create {:?}", output_path))?;
    let luarc_path = output_path.join(".luarc.json");

    let luarc_content = r#"{
  "$schema": "https://raw.githubusercontent.com/sumneko/vscode-lua/master/setting/schema.json",
  "runtime": {
    "version": "Lua 5.4"
  },
  "diagnostics": {
    "globals": ["log", "job", "browser"]
  },
  "workspace": {
    "library": [".vigil/stubs"],
    "checkThirdParty": false
  },
  "completion": {
    "callSnippet": "Both"
  }
}
"#;

    fs::write(&luarc_path, luarc_content)
        .with_context(|| format!("Failed to write .luarc.json to {:?}", luarc_path))?;

    println!("  {} .luarc.json", "Created".green());

    Ok(())
}

/// Generate one stub file per script module
///
/// Log and job stubs come from the module implementations themselves. The
/// browser module needs a live session to construct, so its stubs are the
/// constant the module serves.
fn generate_stub_files(output_path: &Path) -> Result<()> {
    let stubs_dir = output_path.join(".vigil").join("stubs");
    fs::create_dir_all(&stubs_dir)
        .with_context(|| format!("Failed to create stubs directory at {:?}", stubs_dir))?;

    let stubs = [
        ("log", LogModule::new(NoOpLogSink).stubs()),
        ("job", JobModule::new(placeholder_job()).stubs()),
        ("browser", BROWSER_STUBS.to_string()),
    ];

    for (name, content) in stubs {
        let stub_path = stubs_dir.join(format!("{}.lua", name));
        fs::write(&stub_path, content)
            .with_context(|| format!("Failed to write stub file {:?}", stub_path))?;

        println!("  {} {}.lua", "Created".green(), name);
    }

    println!(
        "  {} in {}",
        "Stubs ready".green(),
        stubs_dir.display().to_string().cyan()
    );

    Ok(())
}

fn placeholder_job() -> JobInfo {
    JobInfo {
        test_id: String::new(),
        user_id: String::new(),
        browser: String::new(),
        headless: false,
        timeout_seconds: 0,
    }
}

/// No-op log sink for stub generation
struct NoOpLogSink;

impl LogSink for NoOpLogSink {
    fn write(&mut self, _level: LogLevel, _message: &str) {}
}
