//! End-to-End Pipeline Scenarios
//!
//! These tests drive the full snapshot-then-upload path against real SQLite
//! files, with the network replaced by scripted or file-copying transfer
//! primitives and time replaced by a recording sleeper.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use proptest::prelude::*;
use rstest::rstest;
use sqlship::transport::{
    PrimitiveError, StubOutcome, StubTransfer, TransferHooks, TransferRequest, total_backoff,
};
use sqlship::{
    BackupPipeline, Credentials, Endpoint, ErrorKind, MemorySink, PipelineConfig, PipelineState,
    RecordingSleeper, RunOutcome, SampleStore, Severity, TransferConfig, TransferPrimitive,
};
use tempfile::TempDir;

fn source_db(dir: &Path, rows: usize) -> PathBuf {
    let path = dir.join("people.sqlite");
    let mut store = SampleStore::open(&path, Arc::new(MemorySink::new()))
        .expect("open source")
        .with_seed(99);
    store.create_table().expect("create table");
    store.insert_random_rows(rows).expect("insert rows");
    path
}

fn pipeline_config(dir: &TempDir, rows: usize, retries: u32) -> PipelineConfig {
    let endpoint = Endpoint::new(
        "backup.example.org",
        990,
        Credentials::new("operator", "topsecret"),
        "\\archive\\sqlite\\",
    )
    .expect("valid endpoint");

    PipelineConfig::new(
        source_db(dir.path(), rows),
        dir.path().join("people").to_string_lossy().into_owned(),
        endpoint,
    )
    .with_transfer(TransferConfig::default().with_max_retries(retries))
}

fn backup_files(dir: &Path) -> Vec<PathBuf> {
    std::fs::read_dir(dir)
        .expect("read dir")
        .map(|entry| entry.expect("entry").path())
        .filter(|path| path.to_string_lossy().contains("_backup_"))
        .collect()
}

/// "Uploads" by copying the artifact into a local directory
#[derive(Clone)]
struct CopyToDirectory {
    remote: PathBuf,
    received: Arc<Mutex<Vec<PathBuf>>>,
}

impl CopyToDirectory {
    fn new(remote: PathBuf) -> Self {
        Self {
            remote,
            received: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn received(&self) -> Vec<PathBuf> {
        self.received.lock().unwrap().clone()
    }
}

impl TransferPrimitive for CopyToDirectory {
    fn transfer(
        &self,
        request: &TransferRequest,
        hooks: &mut TransferHooks<'_>,
    ) -> Result<(), PrimitiveError> {
        let name = request.local_path.file_name().expect("artifact name");
        let target = self.remote.join(name);
        let copied = std::fs::copy(&request.local_path, &target).map_err(|e| {
            PrimitiveError::Transfer {
                detail: e.to_string(),
            }
        })?;
        (hooks.progress)(copied, request.file_size);
        (hooks.response)(b"226 Closing data connection\r\n");
        self.received.lock().unwrap().push(target);
        Ok(())
    }
}

#[test]
fn test_three_refused_attempts_fail_the_run() {
    let dir = tempfile::tempdir().unwrap();
    let stub = StubTransfer::failing("connection refused");
    let sleeper = RecordingSleeper::new();
    let log = MemorySink::new();
    let mut pipeline = BackupPipeline::new(
        pipeline_config(&dir, 40, 3),
        Arc::new(stub.clone()),
        Arc::new(sleeper.clone()),
        Arc::new(log.clone()),
    );

    assert!(!pipeline.run());

    assert_eq!(log.count_containing("to URL:"), 3);
    assert_eq!(log.count_containing("failed after 3 attempts"), 1);
    assert_eq!(log.messages_at(Severity::Error).len(), 1);
    assert_eq!(
        sleeper.calls(),
        vec![Duration::from_millis(500), Duration::from_secs(1)]
    );
    assert!(backup_files(dir.path()).is_empty());
    assert_eq!(pipeline.state(), PipelineState::Cleaned(RunOutcome::Failed));
}

#[test]
fn test_second_attempt_succeeds_after_one_backoff() {
    let dir = tempfile::tempdir().unwrap();
    let stub = StubTransfer::scripted(
        vec![StubOutcome::Fail("connection refused".to_string())],
        StubOutcome::Succeed,
    );
    let sleeper = RecordingSleeper::new();
    let mut pipeline = BackupPipeline::new(
        pipeline_config(&dir, 40, 3),
        Arc::new(stub.clone()),
        Arc::new(sleeper.clone()),
        Arc::new(MemorySink::new()),
    );

    assert!(pipeline.run());

    assert_eq!(stub.call_count(), 2);
    assert_eq!(sleeper.calls(), vec![Duration::from_millis(500)]);
    assert!(backup_files(dir.path()).is_empty());
}

#[test]
fn test_uploaded_snapshot_holds_every_row() {
    let dir = tempfile::tempdir().unwrap();
    let remote = tempfile::tempdir().unwrap();
    let primitive = CopyToDirectory::new(remote.path().to_path_buf());
    let log = MemorySink::new();
    let mut pipeline = BackupPipeline::new(
        pipeline_config(&dir, 321, 3),
        Arc::new(primitive.clone()),
        Arc::new(RecordingSleeper::new()),
        Arc::new(log.clone()),
    );

    assert!(pipeline.run());

    let received = primitive.received();
    assert_eq!(received.len(), 1);
    let copy = SampleStore::open(&received[0], Arc::new(MemorySink::new())).unwrap();
    assert_eq!(copy.row_count().unwrap(), 321);

    let report = pipeline.last_report().unwrap();
    let upload = report.upload.as_ref().unwrap();
    assert!(
        upload
            .url
            .starts_with("ftp://backup.example.org:990/archive/sqlite/people_backup_")
    );
    assert_eq!(upload.bytes, report.artifact.as_ref().unwrap().size_bytes);
    assert!(log.contains("server: 226 Closing data connection"));
    assert!(log.contains("Upload progress: 100%"));
    assert!(backup_files(dir.path()).is_empty());
}

#[rstest]
#[case::succeeding(StubTransfer::succeeding(), true)]
#[case::refused(StubTransfer::failing("connection refused"), false)]
#[case::setup(
    StubTransfer::scripted(vec![StubOutcome::InitFail("bad url".to_string())], StubOutcome::Succeed),
    false
)]
fn test_artifact_never_outlives_the_run(#[case] stub: StubTransfer, #[case] expected: bool) {
    let dir = tempfile::tempdir().unwrap();
    let mut pipeline = BackupPipeline::new(
        pipeline_config(&dir, 10, 2),
        Arc::new(stub),
        Arc::new(RecordingSleeper::new()),
        Arc::new(MemorySink::new()),
    );

    assert_eq!(pipeline.run(), expected);

    let artifact = pipeline
        .last_report()
        .and_then(|report| report.artifact.clone())
        .expect("snapshot was taken");
    assert!(!artifact.path.exists());
    assert!(backup_files(dir.path()).is_empty());
}

#[test]
fn test_missing_source_never_touches_the_network() {
    let dir = tempfile::tempdir().unwrap();
    let stub = StubTransfer::succeeding();
    let mut config = pipeline_config(&dir, 1, 3);
    config.source_db = dir.path().join("elsewhere.sqlite");
    let mut pipeline = BackupPipeline::new(
        config,
        Arc::new(stub.clone()),
        Arc::new(RecordingSleeper::new()),
        Arc::new(MemorySink::new()),
    );

    assert!(!pipeline.run());
    assert_eq!(stub.call_count(), 0);
    assert_eq!(
        pipeline.last_report().unwrap().error_kind,
        Some(ErrorKind::Snapshot)
    );
    assert!(backup_files(dir.path()).is_empty());
}

#[test]
fn test_concurrent_runs_share_one_sink() {
    let log = MemorySink::new();
    let dirs: Vec<TempDir> = (0..4).map(|_| tempfile::tempdir().unwrap()).collect();

    let outcomes: Vec<bool> = std::thread::scope(|scope| {
        let handles: Vec<_> = dirs
            .iter()
            .map(|dir| {
                let log = log.clone();
                scope.spawn(move || {
                    let mut pipeline = BackupPipeline::new(
                        pipeline_config(dir, 50, 2),
                        Arc::new(StubTransfer::succeeding()),
                        Arc::new(RecordingSleeper::new()),
                        Arc::new(log),
                    );
                    pipeline.run()
                })
            })
            .collect();
        handles
            .into_iter()
            .map(|handle| handle.join().unwrap())
            .collect()
    });

    assert!(outcomes.iter().all(|&ok| ok));
    assert_eq!(log.count_containing("Backup and upload completed successfully."), 4);
    assert_eq!(log.count_containing("Temporary file removed"), 4);
    for dir in &dirs {
        assert!(backup_files(dir.path()).is_empty());
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(6))]

    /// Always-failing transfers make exactly R attempts and sleep the backoff sum
    #[test]
    fn prop_attempts_and_sleep_follow_retry_budget(retries in 1u32..6) {
        let dir = tempfile::tempdir().unwrap();
        let stub = StubTransfer::failing("connection refused");
        let sleeper = RecordingSleeper::new();
        let mut pipeline = BackupPipeline::new(
            pipeline_config(&dir, 5, retries),
            Arc::new(stub.clone()),
            Arc::new(sleeper.clone()),
            Arc::new(MemorySink::new()),
        );

        prop_assert!(!pipeline.run());
        prop_assert_eq!(stub.call_count(), retries as usize);
        prop_assert_eq!(sleeper.total(), total_backoff(retries));
        prop_assert!(backup_files(dir.path()).is_empty());
    }
}
