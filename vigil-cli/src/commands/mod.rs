//! Commands module
//!
//! Defines all CLI commands and their handlers.

mod enqueue;
mod init;
mod validate;

pub use init::InitCommands;

use anyhow::Result;
use clap::Subcommand;
use std::path::PathBuf;

use crate::config::Config;

/// Top-level CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Validate a job and push it onto the queue
    ///
    /// Either pass a job JSON file, or build the job from a Lua script with
    /// --script and --test-id.
    Enqueue {
        /// Job payload file (JSON)
        #[arg(required_unless_present = "script", conflicts_with = "script")]
        file: Option<PathBuf>,

        /// Lua test script to wrap into a job
        #[arg(long, requires = "test_id")]
        script: Option<PathBuf>,

        /// Test identifier (with --script)
        #[arg(long)]
        test_id: Option<String>,

        /// Browser: chrome or firefox (with --script)
        #[arg(long)]
        browser: Option<String>,

        /// Run headless (with --script)
        #[arg(long)]
        headless: bool,

        /// Timeout in seconds (with --script)
        #[arg(long)]
        timeout: Option<u64>,

        /// Submitting user (with --script)
        #[arg(long)]
        user_id: Option<String>,
    },
    /// Check a job file without enqueueing it
    Validate {
        /// Job payload file (JSON)
        file: PathBuf,
    },
    /// Show how many jobs are waiting
    Status,
    /// Initialize development environment
    Init {
        #[command(subcommand)]
        command: InitCommands,
    },
}

/// Handle a CLI command
///
/// Routes the command to the appropriate handler module.
pub async fn handle_command(command: Commands, config: &Config) -> Result<()> {
    match command {
        Commands::Enqueue {
            file,
            script,
            test_id,
            browser,
            headless,
            timeout,
            user_id,
        } => {
            let source = match (file, script, test_id) {
                (Some(file), _, _) => enqueue::JobSource::File(file),
                (None, Some(script), Some(test_id)) => enqueue::JobSource::Script {
                    script,
                    test_id,
                    browser,
                    headless,
                    timeout,
                    user_id,
                },
                _ => anyhow::bail!("either a job file or --script with --test-id is required"),
            };
            enqueue::enqueue(source, config).await
        }
        Commands::Validate { file } => validate::validate_file(&file),
        Commands::Status => enqueue::status(config).await,
        Commands::Init { command } => init::handle_init_command(command, config).await,
    }
}
