//! Per-worker log buffers
//!
//! Workers never write to the output directly. Each collects its lines in
//! a [`WorkerLog`] and hands the finished buffer to a shared [`LogPool`];
//! the pool is flushed through `tracing` once every worker has joined, so
//! the lines of one container always come out together.

use parking_lot::Mutex;
use tracing::{error, info, warn};

/// Severity of a buffered line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Progress
    Info,
    /// Recoverable per-item problem
    Warn,
    /// Container-level failure
    Error,
}

/// One buffered line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogLine {
    /// Severity
    pub level: LogLevel,
    /// Message text
    pub message: String,
}

/// Line buffer owned by one worker
#[derive(Debug, Clone)]
pub struct WorkerLog {
    label: String,
    verbose: bool,
    lines: Vec<LogLine>,
}

impl WorkerLog {
    /// Buffer for the worker patching `label`
    pub fn new(label: impl Into<String>, verbose: bool) -> Self {
        Self {
            label: label.into(),
            verbose,
            lines: Vec::new(),
        }
    }

    /// Container or archive this buffer belongs to
    pub fn label(&self) -> &str {
        &self.label
    }

    fn push(&mut self, level: LogLevel, message: impl Into<String>) {
        self.lines.push(LogLine {
            level,
            message: message.into(),
        });
    }

    /// Buffer a progress line
    pub fn info(&mut self, message: impl Into<String>) {
        self.push(LogLevel::Info, message);
    }

    /// Buffer a warning
    pub fn warn(&mut self, message: impl Into<String>) {
        self.push(LogLevel::Warn, message);
    }

    /// Buffer an error
    pub fn error(&mut self, message: impl Into<String>) {
        self.push(LogLevel::Error, message);
    }

    /// Buffer a warning only in verbose mode
    pub fn detail(&mut self, message: impl Into<String>) {
        if self.verbose {
            self.push(LogLevel::Warn, message);
        }
    }

    /// Buffered lines in order
    pub fn lines(&self) -> &[LogLine] {
        &self.lines
    }

    /// Number of buffered lines
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    /// Whether nothing was buffered
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Emit every line through `tracing`
    pub fn emit(&self) {
        for line in &self.lines {
            match line.level {
                LogLevel::Info => info!(container = %self.label, "{}", line.message),
                LogLevel::Warn => warn!(container = %self.label, "{}", line.message),
                LogLevel::Error => error!(container = %self.label, "{}", line.message),
            }
        }
    }
}

/// Completed worker buffers in completion order
#[derive(Debug, Default)]
pub struct LogPool {
    finished: Mutex<Vec<WorkerLog>>,
}

impl LogPool {
    /// Empty pool
    pub fn new() -> Self {
        Self::default()
    }

    /// Hand over a finished buffer
    pub fn submit(&self, log: WorkerLog) {
        self.finished.lock().push(log);
    }

    /// Number of buffers waiting to be flushed
    pub fn pending(&self) -> usize {
        self.finished.lock().len()
    }

    /// Remove and return all buffers
    pub fn take(&self) -> Vec<WorkerLog> {
        std::mem::take(&mut *self.finished.lock())
    }

    /// Emit all buffers in completion order; returns the number of lines
    pub fn flush(&self) -> usize {
        let logs = self.take();
        logs.iter()
            .map(|log| {
                log.emit();
                log.len()
            })
            .sum()
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_detail_lines_need_verbose() {
        let mut quiet = WorkerLog::new("a.resources", false);
        quiet.info("patched");
        quiet.detail("duplicate skipped");
        assert_eq!(quiet.len(), 1);

        let mut loud = WorkerLog::new("a.resources", true);
        loud.detail("duplicate skipped");
        assert_eq!(loud.lines()[0].level, LogLevel::Warn);
    }

    #[test]
    fn test_pool_keeps_completion_order() {
        let pool = LogPool::new();
        let mut first = WorkerLog::new("first", false);
        first.info("one");
        let mut second = WorkerLog::new("second", false);
        second.warn("two");
        second.error("three");

        pool.submit(first);
        pool.submit(second);
        assert_eq!(pool.pending(), 2);

        let taken = pool.take();
        let labels: Vec<&str> = taken.iter().map(WorkerLog::label).collect();
        assert_eq!(labels, ["first", "second"]);
        assert_eq!(pool.pending(), 0);
    }

    #[test]
    fn test_flush_counts_lines_from_threads() {
        let pool = Arc::new(LogPool::new());
        std::thread::scope(|scope| {
            for worker in 0..4 {
                let pool = Arc::clone(&pool);
                scope.spawn(move || {
                    let mut log = WorkerLog::new(format!("worker-{worker}"), false);
                    log.info("start");
                    log.info("done");
                    pool.submit(log);
                });
            }
        });
        assert_eq!(pool.flush(), 8);
        assert_eq!(pool.pending(), 0);
    }
}
