//! User-facing status lines.
//!
//! Workers report through [`LogSink`]; [`StatusLog`] keeps the last lines for
//! display and forwards every line to the `log` facade.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;

pub const DEFAULT_STATUS_LINES: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum LogLevel {
    /// Raw tool output
    Raw,
    Info,
    Warn,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogLine {
    pub level: LogLevel,
    pub source: String,
    pub message: String,
}

pub trait LogSink: Send + Sync {
    fn write(&self, line: LogLine);

    fn raw(&self, source: &str, message: &str) {
        self.write(LogLine {
            level: LogLevel::Raw,
            source: source.to_string(),
            message: message.to_string(),
        });
    }

    fn info(&self, source: &str, message: &str) {
        self.write(LogLine {
            level: LogLevel::Info,
            source: source.to_string(),
            message: message.to_string(),
        });
    }

    fn warn(&self, source: &str, message: &str) {
        self.write(LogLine {
            level: LogLevel::Warn,
            source: source.to_string(),
            message: message.to_string(),
        });
    }

    fn error(&self, source: &str, message: &str) {
        self.write(LogLine {
            level: LogLevel::Error,
            source: source.to_string(),
            message: message.to_string(),
        });
    }
}

/// Bounded in-memory log shared between workers and the presenter.
#[derive(Debug, Clone)]
pub struct StatusLog {
    max_lines: usize,
    lines: Arc<Mutex<VecDeque<LogLine>>>,
}

impl StatusLog {
    pub fn new(max_lines: usize) -> Self {
        let max_lines = max_lines.max(1);
        Self {
            max_lines,
            lines: Arc::new(Mutex::new(VecDeque::with_capacity(max_lines))),
        }
    }

    pub fn lines(&self) -> Vec<LogLine> {
        self.lines.lock().iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.lines.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.lock().is_empty()
    }

    /// Lines matching `pred`, oldest first.
    pub fn find<F>(&self, pred: F) -> Vec<LogLine>
    where
        F: Fn(&LogLine) -> bool,
    {
        self.lines.lock().iter().filter(|l| pred(l)).cloned().collect()
    }
}

impl Default for StatusLog {
    fn default() -> Self {
        Self::new(DEFAULT_STATUS_LINES)
    }
}

impl LogSink for StatusLog {
    fn write(&self, line: LogLine) {
        match line.level {
            LogLevel::Raw => log::trace!("[{}] {}", line.source, line.message),
            LogLevel::Info => log::info!("[{}] {}", line.source, line.message),
            LogLevel::Warn => log::warn!("[{}] {}", line.source, line.message),
            LogLevel::Error => log::error!("[{}] {}", line.source, line.message),
        }

        let mut lines = self.lines.lock();
        if lines.len() >= self.max_lines {
            lines.pop_front();
        }
        lines.push_back(line);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keeps_last_lines() {
        let log = StatusLog::new(2);
        log.info("a", "one");
        log.warn("b", "two");
        log.error("c", "three");

        let lines = log.lines();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].message, "two");
        assert_eq!(lines[1].level, LogLevel::Error);
    }

    #[test]
    fn test_find_by_level() {
        let log = StatusLog::default();
        log.raw("dmon", "0 75 60 - 12 8");
        log.error("dmon", "boom");
        assert_eq!(log.find(|l| l.level == LogLevel::Error).len(), 1);
    }
}
