//! Log buffer service
//!
//! Collects the script log of one job in memory. Everything a script writes
//! through `log.*` or `print` lands here, and the drained entries become the
//! `logs` field of the job's report.

use std::sync::{Arc, Mutex};
use vigil_core::domain::log::{LogEntry, render_log_text};

/// Service for managing log buffers
pub trait LogBufferService: Send + Sync {
    /// Adds a log entry to the buffer
    fn add_entry(&self, entry: LogEntry);

    /// Drains all log entries from the buffer
    fn drain(&self) -> Vec<LogEntry>;

    /// Drains the buffer and renders it as report text
    fn drain_text(&self) -> String {
        render_log_text(&self.drain())
    }
}

/// In-memory implementation of LogBufferService
///
/// Uses Arc<Mutex<Vec<LogEntry>>> for thread-safe access across tasks.
#[derive(Clone)]
pub struct InMemoryLogBuffer {
    buffer: Arc<Mutex<Vec<LogEntry>>>,
}

impl InMemoryLogBuffer {
    /// Creates a new in-memory log buffer
    pub fn new() -> Self {
        Self {
            buffer: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

impl Default for InMemoryLogBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl LogBufferService for InMemoryLogBuffer {
    fn add_entry(&self, entry: LogEntry) {
        let mut buffer = self.buffer.lock().unwrap();
        buffer.push(entry);
    }

    fn drain(&self) -> Vec<LogEntry> {
        let mut buffer = self.buffer.lock().unwrap();
        buffer.drain(..).collect()
    }
}
