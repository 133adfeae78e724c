//! Repository layer
//!
//! Repositories are thin adapters over the worker's remote collaborators:
//! the job queue it pulls from and the backend it reports to. They carry no
//! business logic.
//!
//! All repositories are trait-based to enable testing and mocking.

mod queue;
mod results;

// Re-export traits
pub use queue::JobQueue;
pub use results::ResultRepository;
