//! Core domain types
//!
//! These types describe a test job from the moment its payload is pulled off
//! the queue until its outcome has been reported. They are shared between the
//! runner (which executes jobs) and the CLI (which validates and enqueues them).

pub mod job;
pub mod log;
pub mod outcome;
