//! Vigil CLI
//!
//! Command-line interface for submitting and checking browser test jobs.

mod commands;
mod config;

use anyhow::Result;
use clap::Parser;
use commands::{Commands, handle_command};
use config::Config;

#[derive(Parser)]
#[command(name = "vigil")]
#[command(about = "Vigil browser test CLI", long_about = None)]
struct Cli {
    /// Redis URL of the job queue
    #[arg(long, env = "REDIS_URL", default_value = "redis://localhost:6379")]
    redis_url: String,

    /// Name of the queue list
    #[arg(long, env = "QUEUE_NAME", default_value = "test_jobs")]
    queue: String,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = Config {
        redis_url: cli.redis_url,
        queue_name: cli.queue,
    };

    handle_command(cli.command, &config).await
}
