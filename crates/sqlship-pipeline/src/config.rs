//! Run configuration

use std::path::PathBuf;

use sqlship_core::config::{Endpoint, SnapshotConfig, TransferConfig};
use sqlship_core::error::ConfigError;

/// Everything one pipeline run needs. Immutable for the duration of a run.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Live database to snapshot
    pub source_db: PathBuf,
    /// Artifact names are `<artifact_prefix>_backup_<timestamp>.sqlite`, with a
    /// one-second timestamp. Runs sharing a prefix must not start within the
    /// same second: the later one finds the name taken and fails with
    /// `SnapshotError::DestinationUnavailable`, leaving the other run's file alone.
    pub artifact_prefix: String,
    pub endpoint: Endpoint,
    pub transfer: TransferConfig,
    pub snapshot: SnapshotConfig,
}

impl PipelineConfig {
    pub fn new(
        source_db: impl Into<PathBuf>,
        artifact_prefix: impl Into<String>,
        endpoint: Endpoint,
    ) -> Self {
        Self {
            source_db: source_db.into(),
            artifact_prefix: artifact_prefix.into(),
            endpoint,
            transfer: TransferConfig::default(),
            snapshot: SnapshotConfig::default(),
        }
    }

    #[must_use]
    pub fn with_transfer(mut self, transfer: TransferConfig) -> Self {
        self.transfer = transfer;
        self
    }

    #[must_use]
    pub fn with_snapshot(mut self, snapshot: SnapshotConfig) -> Self {
        self.snapshot = snapshot;
        self
    }

    /// Checks that need no I/O
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.source_db.as_os_str().is_empty() {
            return Err(ConfigError::MissingField { field: "source_db" });
        }
        if self.artifact_prefix.trim().is_empty() {
            return Err(ConfigError::MissingField {
                field: "artifact_prefix",
            });
        }
        self.endpoint.validate()
    }
}
