//! Run state and the per-run report

use chrono::{DateTime, Utc};
use serde::Serialize;

use sqlship_core::Artifact;
use sqlship_core::error::ErrorKind;
use sqlship_transport::UploadReport;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunOutcome {
    Success,
    Failed,
}

/// `Idle → Snapshotting → Uploading → Cleaned`, one pass per run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Idle,
    Snapshotting,
    Uploading,
    /// Artifact removed, run finished
    Cleaned(RunOutcome),
}

/// What happened during one run
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub outcome: RunOutcome,
    /// Snapshot produced by the run. The file itself no longer exists.
    pub artifact: Option<Artifact>,
    pub upload: Option<UploadReport>,
    pub error_kind: Option<ErrorKind>,
    pub error: Option<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl RunReport {
    pub fn succeeded(&self) -> bool {
        self.outcome == RunOutcome::Success
    }

    pub fn duration(&self) -> chrono::Duration {
        self.finished_at - self.started_at
    }
}
