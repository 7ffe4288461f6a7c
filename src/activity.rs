//! Activity log for backup operations.
//!
//! The storage engine reports what it did through the [`Logger`] trait rather
//! than a global. [`ActivityLog`] is the default collaborator:
//! - keeps a short in-memory history for interactive display
//! - appends every entry to a log file when one is configured
//! - forwards every entry to the `log` facade
//!
//! Logging never fails the caller. Sink errors are dropped.

use std::collections::VecDeque;
use std::fmt;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Mutex;

use chrono::{DateTime, Local};

pub const MAX_LOG_ENTRIES: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Debug,
    Info,
    Success,
    Warning,
    Error,
}

impl Level {
    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Debug => "DEBUG",
            Level::Info => "INFO",
            Level::Success => "SUCCESS",
            Level::Warning => "WARNING",
            Level::Error => "ERROR",
        }
    }

    fn as_log_level(&self) -> log::Level {
        match self {
            Level::Debug => log::Level::Debug,
            Level::Info | Level::Success => log::Level::Info,
            Level::Warning => log::Level::Warn,
            Level::Error => log::Level::Error,
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct Entry {
    pub timestamp: DateTime<Local>,
    pub level: Level,
    pub message: String,
}

impl Entry {
    /// Short form used by the dashboard feed.
    pub fn display_line(&self) -> String {
        format!(
            "[{}] {}: {}",
            self.timestamp.format("%H:%M:%S"),
            self.level,
            self.message
        )
    }

    fn file_line(&self) -> String {
        format!(
            "{} {}: {}\n",
            self.timestamp.to_rfc3339(),
            self.level,
            self.message
        )
    }
}

pub trait Logger {
    fn log(&self, level: Level, message: &str);

    fn debug(&self, message: &str) {
        self.log(Level::Debug, message);
    }

    fn info(&self, message: &str) {
        self.log(Level::Info, message);
    }

    fn success(&self, message: &str) {
        self.log(Level::Success, message);
    }

    fn warning(&self, message: &str) {
        self.log(Level::Warning, message);
    }

    fn error(&self, message: &str) {
        self.log(Level::Error, message);
    }
}

pub struct ActivityLog {
    file: Option<PathBuf>,
    entries: Mutex<VecDeque<Entry>>,
    capacity: usize,
}

impl ActivityLog {
    /// Keeps entries in memory and appends them to `path`.
    pub fn with_file(path: impl Into<PathBuf>) -> Self {
        ActivityLog {
            file: Some(path.into()),
            entries: Mutex::new(VecDeque::new()),
            capacity: MAX_LOG_ENTRIES,
        }
    }

    pub fn in_memory() -> Self {
        ActivityLog {
            file: None,
            entries: Mutex::new(VecDeque::new()),
            capacity: MAX_LOG_ENTRIES,
        }
    }

    /// Most recent `count` entries, oldest first.
    pub fn recent(&self, count: usize) -> Vec<Entry> {
        let Ok(entries) = self.entries.lock() else {
            return Vec::new();
        };
        let skip = entries.len().saturating_sub(count);
        entries.iter().skip(skip).cloned().collect()
    }

    pub fn recent_lines(&self, count: usize) -> Vec<String> {
        self.recent(count).iter().map(Entry::display_line).collect()
    }

    pub fn clear(&self) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.clear();
        }
    }

    fn append_to_file(&self, entry: &Entry) {
        let Some(path) = &self.file else { return };

        if let Some(parent) = path.parent() {
            if fs::create_dir_all(parent).is_err() {
                return;
            }
        }

        if let Ok(mut file) = OpenOptions::new().create(true).append(true).open(path) {
            let _ = file.write_all(entry.file_line().as_bytes());
        }
    }
}

impl Logger for ActivityLog {
    fn log(&self, level: Level, message: &str) {
        let entry = Entry {
            timestamp: Local::now(),
            level,
            message: message.to_string(),
        };

        log::log!(target: "hades_backup", level.as_log_level(), "{message}");
        self.append_to_file(&entry);

        if let Ok(mut entries) = self.entries.lock() {
            entries.push_back(entry);
            while entries.len() > self.capacity {
                entries.pop_front();
            }
        }
    }
}
