//! Operator event log
//!
//! A bounded, most-recent-first list of human-readable notices. Every component
//! reports here; the log never fails and never grows past [`LOG_CAPACITY`].

use std::collections::VecDeque;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Maximum number of retained log entries
pub const LOG_CAPACITY: usize = 50;

/// Severity of a log entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogKind {
    #[default]
    Info,
    Success,
    Warning,
    Error,
}

impl fmt::Display for LogKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Info => "INFO",
            Self::Success => "SUCCESS",
            Self::Warning => "WARNING",
            Self::Error => "ERROR",
        };
        f.write_str(label)
    }
}

/// A single operator notice
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct LogEntry {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "type")]
    pub kind: LogKind,
    pub message: String,
}

impl LogEntry {
    /// Create an entry stamped with the current time
    #[must_use]
    pub fn new(message: impl Into<String>, kind: LogKind) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            kind,
            message: message.into(),
        }
    }
}

/// Fixed-capacity event log, newest entry first
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    entries: VecDeque<LogEntry>,
}

impl EventLog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a log from persisted entries (newest first), enforcing the cap
    #[must_use]
    pub fn from_entries(entries: Vec<LogEntry>) -> Self {
        let mut entries: VecDeque<LogEntry> = entries.into();
        entries.truncate(LOG_CAPACITY);
        Self { entries }
    }

    /// Prepend a notice, evicting the oldest entry on overflow
    pub fn append(&mut self, message: impl Into<String>, kind: LogKind) -> &LogEntry {
        let entry = LogEntry::new(message, kind);
        tracing::debug!(kind = %entry.kind, message = %entry.message, "event log");
        self.entries.push_front(entry);
        self.entries.truncate(LOG_CAPACITY);
        &self.entries[0]
    }

    /// Drop every entry
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// The `n` most recent entries
    pub fn recent(&self, n: usize) -> impl Iterator<Item = &LogEntry> {
        self.entries.iter().take(n)
    }

    pub fn iter(&self) -> impl Iterator<Item = &LogEntry> {
        self.entries.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries as a newest-first vector (for persistence)
    #[must_use]
    pub fn to_vec(&self) -> Vec<LogEntry> {
        self.entries.iter().cloned().collect()
    }
}
