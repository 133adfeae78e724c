//! LogSink implementation for the worker
//!
//! Connects the Lua `log` module (and `print`) to the job's log buffer.

use std::sync::Arc;
use vigil_core::domain::log::{LogEntry, LogLevel};
use vigil_lua::LogSink;

use crate::service::LogBufferService;

/// Buffered log sink that writes to a LogBufferService
pub struct BufferedLogSink {
    buffer: Arc<dyn LogBufferService>,
}

impl BufferedLogSink {
    pub fn new(buffer: Arc<dyn LogBufferService>) -> Self {
        Self { buffer }
    }
}

impl LogSink for BufferedLogSink {
    fn write(&mut self, level: LogLevel, message: &str) {
        self.buffer.add_entry(LogEntry::new(level, message));
    }
}
