//! Service layer
//!
//! Services contain the business logic of a job run that sits around script
//! execution: log buffering, artifact capture and result delivery.

mod capture;
mod log_buffer;
mod reporter;

pub use capture::ArtifactCapture;
pub use log_buffer::{InMemoryLogBuffer, LogBufferService};
pub use reporter::{ResultReporter, RetryPolicy};
