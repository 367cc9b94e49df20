//! Logging sink consumed by every pipeline component
//!
//! Components never reach for a global logger. They receive an
//! `Arc<dyn LogSink>` at construction time and report through it, which keeps
//! concurrent runs on separate threads writing to one shared sink and lets
//! tests capture exactly what a run reported.

use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, Mutex};

/// Log severity, ordered from least to most severe
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    Debug,
    Info,
    Warning,
    Error,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Debug => "DEBUG",
            Severity::Info => "INFO",
            Severity::Warning => "WARNING",
            Severity::Error => "ERROR",
        }
    }

    /// Matching `tracing` level
    pub fn as_level(&self) -> tracing::Level {
        match self {
            Severity::Debug => tracing::Level::DEBUG,
            Severity::Info => tracing::Level::INFO,
            Severity::Warning => tracing::Level::WARN,
            Severity::Error => tracing::Level::ERROR,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "debug" => Ok(Severity::Debug),
            "info" => Ok(Severity::Info),
            "warn" | "warning" => Ok(Severity::Warning),
            "error" => Ok(Severity::Error),
            other => Err(format!(
                "invalid log level '{}' (expected debug|info|warn|error)",
                other
            )),
        }
    }
}

/// Thread-safe destination for log records.
///
/// Implementations must never fail observably and must emit each record as
/// one whole line.
pub trait LogSink: Send + Sync {
    fn log(&self, severity: Severity, message: &str);

    fn debug(&self, message: &str) {
        self.log(Severity::Debug, message);
    }

    fn info(&self, message: &str) {
        self.log(Severity::Info, message);
    }

    fn warn(&self, message: &str) {
        self.log(Severity::Warning, message);
    }

    fn error(&self, message: &str) {
        self.log(Severity::Error, message);
    }
}

impl<S: LogSink + ?Sized> LogSink for Arc<S> {
    fn log(&self, severity: Severity, message: &str) {
        (**self).log(severity, message);
    }
}

/// Forwards records to `tracing` under the `sqlship` target.
///
/// Line serialization across threads is the subscriber's job; the CLI installs
/// writers that receive each formatted event in a single call.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl LogSink for TracingSink {
    fn log(&self, severity: Severity, message: &str) {
        match severity {
            Severity::Debug => tracing::debug!(target: "sqlship", "{}", message),
            Severity::Info => tracing::info!(target: "sqlship", "{}", message),
            Severity::Warning => tracing::warn!(target: "sqlship", "{}", message),
            Severity::Error => tracing::error!(target: "sqlship", "{}", message),
        }
    }
}

/// Drops records below a minimum severity before handing them on
pub struct LevelFilter<S> {
    min: Severity,
    inner: S,
}

impl<S: LogSink> LevelFilter<S> {
    pub fn new(min: Severity, inner: S) -> Self {
        Self { min, inner }
    }

    pub fn min_severity(&self) -> Severity {
        self.min
    }
}

impl<S: LogSink> LogSink for LevelFilter<S> {
    fn log(&self, severity: Severity, message: &str) {
        if severity >= self.min {
            self.inner.log(severity, message);
        }
    }
}

/// In-memory sink that keeps every record, used to assert on what a run logged
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    records: Arc<Mutex<Vec<(Severity, String)>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all records so far
    pub fn records(&self) -> Vec<(Severity, String)> {
        match self.records.lock() {
            Ok(records) => records.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Messages logged at exactly `severity`
    pub fn messages_at(&self, severity: Severity) -> Vec<String> {
        self.records()
            .into_iter()
            .filter(|(s, _)| *s == severity)
            .map(|(_, m)| m)
            .collect()
    }

    /// Number of records whose message contains `needle`
    pub fn count_containing(&self, needle: &str) -> usize {
        self.records()
            .iter()
            .filter(|(_, m)| m.contains(needle))
            .count()
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.count_containing(needle) > 0
    }

    pub fn clear(&self) {
        match self.records.lock() {
            Ok(mut records) => records.clear(),
            Err(poisoned) => poisoned.into_inner().clear(),
        }
    }
}

impl LogSink for MemorySink {
    fn log(&self, severity: Severity, message: &str) {
        // A poisoned lock still holds valid records; keep appending.
        let mut records = match self.records.lock() {
            Ok(records) => records,
            Err(poisoned) => poisoned.into_inner(),
        };
        records.push((severity, message.to_string()));
    }
}
