//! Scheduler layer for the worker
//!
//! Runs the job loop: dequeue, validate, lease, execute, capture, release,
//! report. One job at a time per worker process.

pub mod worker;

pub use worker::{Worker, WorkerSettings};
