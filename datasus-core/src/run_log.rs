//! Run log: ordered, timestamped events for one run.
//!
//! Every entry is echoed to `tracing` as it is appended and kept in memory.
//! `flush` rewrites the whole log file from memory, so a later flush always
//! contains everything an earlier one did.

use crate::clock::Clock;
use chrono::NaiveDateTime;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";

/// Severity of a log entry. Only affects the console echo.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Info,
    Failure,
}

/// A single log event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub at: NaiveDateTime,
    pub level: Level,
    pub message: String,
}

impl LogEntry {
    /// `<timestamp> - <message>`
    pub fn render(&self) -> String {
        format!("{} - {}", self.at.format(TIMESTAMP_FORMAT), self.message)
    }
}

pub struct RunLog {
    path: PathBuf,
    clock: Arc<dyn Clock>,
    entries: Vec<LogEntry>,
}

impl RunLog {
    pub fn new(path: impl Into<PathBuf>, clock: Arc<dyn Clock>) -> Self {
        Self {
            path: path.into(),
            clock,
            entries: Vec::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn append(&mut self, message: impl Into<String>) {
        self.push(Level::Info, message.into());
    }

    /// Append an entry describing a failure.
    pub fn append_failure(&mut self, message: impl Into<String>) {
        self.push(Level::Failure, message.into());
    }

    fn push(&mut self, level: Level, message: String) {
        match level {
            Level::Info => tracing::info!("{message}"),
            Level::Failure => tracing::warn!("{message}"),
        }
        self.entries.push(LogEntry {
            at: self.clock.now(),
            level,
            message,
        });
    }

    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.entries.iter().any(|e| e.message.contains(needle))
    }

    /// Full log content, one rendered entry per line.
    pub fn render(&self) -> String {
        self.entries
            .iter()
            .map(LogEntry::render)
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Overwrite the log file with every entry appended so far.
    pub fn flush(&self) -> io::Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::write(&self.path, self.render())
    }
}
