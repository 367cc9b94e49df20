//! Snapshot artifact produced by the snapshot engine

use std::path::{Path, PathBuf};

use chrono::{DateTime, Local, Utc};
use serde::Serialize;

/// File extension of snapshot artifacts
pub const ARTIFACT_EXTENSION: &str = "sqlite";

/// Timestamp layout used in artifact file names
pub const ARTIFACT_TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Standalone snapshot file
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Artifact {
    pub path: PathBuf,
    pub size_bytes: u64,
    pub created_at: DateTime<Utc>,
}

impl Artifact {
    /// Describe an existing file on disk
    pub fn from_file(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = path.as_ref();
        let metadata = std::fs::metadata(path)?;
        let created_at = metadata
            .created()
            .or_else(|_| metadata.modified())
            .map(DateTime::<Utc>::from)
            .unwrap_or_else(|_| Utc::now());

        Ok(Self {
            path: path.to_path_buf(),
            size_bytes: metadata.len(),
            created_at,
        })
    }

    /// `<prefix>_backup_<YYYYMMDD_HHMMSS>.sqlite`
    pub fn path_for(prefix: &str, at: DateTime<Local>) -> PathBuf {
        PathBuf::from(format!(
            "{}_backup_{}.{}",
            prefix,
            at.format(ARTIFACT_TIMESTAMP_FORMAT),
            ARTIFACT_EXTENSION
        ))
    }

    /// Base name used as the remote file name
    pub fn file_name(&self) -> Option<&str> {
        self.path.file_name().and_then(|name| name.to_str())
    }
}
