//! Report log stream
//!
//! The batch runner reports per-file progress as a stream of [`LogEvent`]s delivered to an
//! injected [`LogSink`]. The sink is scoped to one run; there is no global logger behind it.
//! Internal diagnostics that are not part of the report go through `tracing` instead.

use std::fmt;
use std::io::Write;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Local};
use serde::Serialize;
use tracing::warn;

/// Severity of a report event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    Info,
    Warning,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Info => "INFO",
            LogLevel::Warning => "WARNING",
            LogLevel::Error => "ERROR",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // pad so width specifiers line the levels up
        f.pad(self.as_str())
    }
}

/// One line of the report stream
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogEvent {
    pub timestamp: DateTime<Local>,
    pub level: LogLevel,
    pub message: String,
}

impl LogEvent {
    pub fn new(level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            timestamp: Local::now(),
            level,
            message: message.into(),
        }
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self::new(LogLevel::Info, message)
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self::new(LogLevel::Warning, message)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(LogLevel::Error, message)
    }

    /// `[YYYY-MM-DD HH:MM:SS] LEVEL  message`
    pub fn render(&self) -> String {
        format!(
            "[{}] {:<6} {}",
            self.timestamp.format("%Y-%m-%d %H:%M:%S"),
            self.level,
            self.message
        )
    }
}

impl fmt::Display for LogEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

/// Destination for report events
pub trait LogSink: Send + Sync {
    fn emit(&self, event: LogEvent);
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    // a panicked writer leaves the buffer usable
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Renders events line by line to any writer
pub struct WriterSink<W: Write + Send> {
    writer: Mutex<W>,
}

impl<W: Write + Send> WriterSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }

    pub fn into_inner(self) -> W {
        self.writer
            .into_inner()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl WriterSink<std::io::Stderr> {
    pub fn stderr() -> Self {
        Self::new(std::io::stderr())
    }
}

impl<W: Write + Send> LogSink for WriterSink<W> {
    fn emit(&self, event: LogEvent) {
        let mut writer = lock(&self.writer);
        if let Err(e) = writeln!(writer, "{}", event.render()) {
            warn!("failed to write report event: {}", e);
        }
    }
}

/// Keeps events in memory; used to inspect a run's report stream
#[derive(Debug, Default)]
pub struct MemorySink {
    events: Mutex<Vec<LogEvent>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<LogEvent> {
        lock(&self.events).clone()
    }

    /// Events as `LEVEL message` pairs, without timestamps
    pub fn lines(&self) -> Vec<(LogLevel, String)> {
        lock(&self.events)
            .iter()
            .map(|e| (e.level, e.message.clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        lock(&self.events).len()
    }

    pub fn is_empty(&self) -> bool {
        lock(&self.events).is_empty()
    }
}

impl LogSink for MemorySink {
    fn emit(&self, event: LogEvent) {
        lock(&self.events).push(event);
    }
}

/// Discards every event
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl LogSink for NullSink {
    fn emit(&self, _event: LogEvent) {}
}
