//! Error taxonomy for the backup pipeline.
//!
//! Each stage returns its own error type. [`PipelineError`] wraps all of them
//! and is only ever observed by the orchestrator, which turns it into a log
//! entry and a boolean outcome.

use std::fmt;
use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

/// Result type for pipeline operations
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Invalid endpoint, credentials or transfer settings, detected before any I/O.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("Missing required setting: {field}")]
    MissingField { field: &'static str },

    #[error("Invalid host '{host}': {reason}")]
    InvalidHost { host: String, reason: String },

    #[error("Invalid remote directory '{directory}': {reason}")]
    InvalidDirectory { directory: String, reason: String },

    #[error("Invalid environment variable '{key}': {message}")]
    InvalidEnvVar { key: String, message: String },

    #[error("Invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Snapshot engine failures. Busy/locked statuses are absorbed by the engine
/// and never surface here.
#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("Source database {path} is unreadable: {reason}")]
    SourceUnavailable { path: PathBuf, reason: String },

    #[error("Cannot create snapshot destination {path}: {reason}")]
    DestinationUnavailable { path: PathBuf, reason: String },

    #[error("Page copy failed: {reason}")]
    CopyFailed { reason: String },
}

impl SnapshotError {
    /// Human readable failure reason without the variant prefix
    pub fn reason(&self) -> &str {
        match self {
            SnapshotError::SourceUnavailable { reason, .. }
            | SnapshotError::DestinationUnavailable { reason, .. }
            | SnapshotError::CopyFailed { reason } => reason,
        }
    }

    pub fn copy_failed(reason: impl Into<String>) -> Self {
        Self::CopyFailed {
            reason: reason.into(),
        }
    }
}

/// The local artifact cannot be used as an upload source.
#[derive(Debug, Error)]
pub enum LocalResourceError {
    #[error("Local file does not exist: {}", path.display())]
    Missing { path: PathBuf },

    #[error("Failed to open local file {}: {reason}", path.display())]
    Unreadable { path: PathBuf, reason: String },
}

/// Transport client failures.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Local artifact problem, never retried
    #[error(transparent)]
    LocalResource(#[from] LocalResourceError),

    /// The transfer primitive could not be set up at all, never retried
    #[error("Transfer primitive initialization failed: {detail}")]
    InitFailed { detail: String },

    /// Every attempt failed
    #[error("Upload failed after {attempts} attempts: {last_error}")]
    RetriesExhausted { attempts: u32, last_error: String },
}

impl TransportError {
    /// Whether the failure came from the network rather than local state
    pub fn is_transient(&self) -> bool {
        matches!(self, TransportError::RetriesExhausted { .. })
    }
}

/// Error category used for logging and exit-code mapping
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorKind {
    Configuration,
    Snapshot,
    Transport,
    LocalResource,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::Configuration => write!(f, "configuration"),
            ErrorKind::Snapshot => write!(f, "snapshot"),
            ErrorKind::Transport => write!(f, "transport"),
            ErrorKind::LocalResource => write!(f, "local-resource"),
        }
    }
}

/// Any failure of a pipeline run.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Snapshot error: {0}")]
    Snapshot(#[from] SnapshotError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),
}

impl PipelineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PipelineError::Config(_) => ErrorKind::Configuration,
            PipelineError::Snapshot(_) => ErrorKind::Snapshot,
            PipelineError::Transport(TransportError::LocalResource(_)) => ErrorKind::LocalResource,
            PipelineError::Transport(_) => ErrorKind::Transport,
        }
    }

    /// Only network failures are worth another run; everything else needs an operator.
    pub fn is_retryable(&self) -> bool {
        matches!(self, PipelineError::Transport(e) if e.is_transient())
    }
}
