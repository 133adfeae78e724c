//! Configuration module
//!
//! Handles CLI configuration: where the job queue lives.

/// CLI configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Redis URL of the job queue
    pub redis_url: String,

    /// Name of the Redis list jobs are pushed to
    pub queue_name: String,
}
