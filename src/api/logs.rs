//! Leveled log entries broadcast to SSE subscribers.
//!
//! The import coordinator reports row-level progress through these helpers;
//! entries are mirrored to stdout and fanned out to any connected frontend
//! via `GET /api/logs`. Sends are fire-and-forget: no subscriber, no problem.

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Severity, as the frontend wants to color it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Info,
    Success,
    Warning,
    Error,
}

/// One log line.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    pub level: LogLevel,
    pub message: String,
}

/// Process-wide broadcaster.
pub static LOG_BROADCASTER: Lazy<LogBroadcaster> = Lazy::new(LogBroadcaster::new);

/// Fans log entries out to all connected SSE clients.
pub struct LogBroadcaster {
    sender: broadcast::Sender<LogEntry>,
}

impl LogBroadcaster {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(100);
        Self { sender }
    }

    /// Print the entry and broadcast it; dropped if nobody is listening.
    pub fn log(&self, level: LogLevel, message: impl Into<String>) {
        let entry = LogEntry { level, message: message.into() };
        let prefix = match entry.level {
            LogLevel::Info => "  ",
            LogLevel::Success => "✓ ",
            LogLevel::Warning => "⚠ ",
            LogLevel::Error => "✗ ",
        };
        println!("{}{}", prefix, entry.message);
        let _ = self.sender.send(entry);
    }

    /// A receiver for SSE streaming.
    pub fn subscribe(&self) -> broadcast::Receiver<LogEntry> {
        self.sender.subscribe()
    }
}

impl Default for LogBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}

pub fn log_info(msg: impl Into<String>) {
    LOG_BROADCASTER.log(LogLevel::Info, msg);
}

pub fn log_success(msg: impl Into<String>) {
    LOG_BROADCASTER.log(LogLevel::Success, msg);
}

pub fn log_warning(msg: impl Into<String>) {
    LOG_BROADCASTER.log(LogLevel::Warning, msg);
}

pub fn log_error(msg: impl Into<String>) {
    LOG_BROADCASTER.log(LogLevel::Error, msg);
}
