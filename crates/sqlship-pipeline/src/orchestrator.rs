//! Snapshot-then-upload orchestrator
//!
//! [`BackupPipeline::run`] is the single point where stage errors turn into a
//! pass/fail signal. Whatever happens inside a run, including a panic, the
//! artifact is removed before `run` returns.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{Local, Utc};

use sqlship_core::Artifact;
use sqlship_core::delay::Sleeper;
use sqlship_core::error::{ErrorKind, PipelineResult};
use sqlship_core::log::LogSink;
use sqlship_store::SnapshotEngine;
use sqlship_transport::{ProgressCallback, TransferPrimitive, TransportClient, UploadReport};

use crate::config::PipelineConfig;
use crate::guard::ArtifactGuard;
use crate::report::{PipelineState, RunOutcome, RunReport};

/// Facts gathered while a run progresses
#[derive(Default)]
struct RunRecord {
    artifact: Option<Artifact>,
    upload: Option<UploadReport>,
}

pub struct BackupPipeline {
    config: PipelineConfig,
    primitive: Arc<dyn TransferPrimitive>,
    sleeper: Arc<dyn Sleeper>,
    log: Arc<dyn LogSink>,
    state: PipelineState,
    last_report: Option<RunReport>,
}

impl BackupPipeline {
    pub fn new(
        config: PipelineConfig,
        primitive: Arc<dyn TransferPrimitive>,
        sleeper: Arc<dyn Sleeper>,
        log: Arc<dyn LogSink>,
    ) -> Self {
        Self {
            config,
            primitive,
            sleeper,
            log,
            state: PipelineState::Idle,
            last_report: None,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    pub fn last_report(&self) -> Option<&RunReport> {
        self.last_report.as_ref()
    }

    /// Snapshot the source database and upload it. Returns `true` on success.
    ///
    /// Failures are logged at ERROR and reported through [`last_report`](Self::last_report).
    pub fn run(&mut self) -> bool {
        let started_at = Utc::now();
        self.state = PipelineState::Idle;
        let mut record = RunRecord::default();

        let result = panic::catch_unwind(AssertUnwindSafe(|| self.execute(&mut record)));

        let (outcome, error_kind, error) = match result {
            Ok(Ok(())) => {
                self.log.info("Backup and upload completed successfully.");
                (RunOutcome::Success, None, None)
            }
            Ok(Err(e)) => {
                self.log.error(&format!("Backup pipeline failed: {}", e));
                (RunOutcome::Failed, Some(e.kind()), Some(e.to_string()))
            }
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                self.log
                    .error(&format!("Backup pipeline aborted by panic: {}", message));
                (RunOutcome::Failed, None, Some(format!("panic: {}", message)))
            }
        };

        self.state = PipelineState::Cleaned(outcome);
        self.last_report = Some(RunReport {
            outcome,
            artifact: record.artifact,
            upload: record.upload,
            error_kind,
            error,
            started_at,
            finished_at: Utc::now(),
        });
        outcome == RunOutcome::Success
    }

    /// Error kind of the most recent failed run
    pub fn last_error_kind(&self) -> Option<ErrorKind> {
        self.last_report.as_ref().and_then(|report| report.error_kind)
    }

    fn execute(&mut self, record: &mut RunRecord) -> PipelineResult<()> {
        self.config.validate()?;

        let destination = Artifact::path_for(&self.config.artifact_prefix, Local::now());
        self.state = PipelineState::Snapshotting;
        self.log.info(&format!(
            "Starting backup of {} to {}",
            self.config.source_db.display(),
            destination.display()
        ));

        // Armed before the copy so a partial snapshot is removed too
        let guard = ArtifactGuard::claim(destination, self.log.clone())?;

        let engine = SnapshotEngine::new(
            self.config.snapshot.clone(),
            self.sleeper.clone(),
            self.log.clone(),
        );
        let artifact = engine.snapshot_path_to_file(&self.config.source_db, guard.path())?;
        record.artifact = Some(artifact.clone());

        self.state = PipelineState::Uploading;
        self.log.info(&format!(
            "Uploading to FTP server: {}",
            self.config.endpoint.describe()
        ));

        let mut client = TransportClient::new(
            self.config.endpoint.clone(),
            self.config.transfer.clone(),
            self.primitive.clone(),
            self.sleeper.clone(),
            self.log.clone(),
        )
        .with_progress(progress_logger(self.log.clone()));

        let report = client.upload(&artifact.path, self.config.endpoint.remote_dir())?;
        record.upload = Some(report);

        drop(guard);
        Ok(())
    }
}

/// Logs upload percentage at DEBUG, once per whole percent
fn progress_logger(log: Arc<dyn LogSink>) -> ProgressCallback {
    let last_percent = AtomicU64::new(u64::MAX);
    Arc::new(move |sent, total| {
        if total == 0 {
            return;
        }
        let percent = sent.saturating_mul(100) / total;
        if last_percent.swap(percent, Ordering::Relaxed) != percent {
            log.debug(&format!("Upload progress: {}%", percent));
        }
    })
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
