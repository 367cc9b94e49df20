//! Binary snapshot engine
//!
//! Copies a live SQLite database into a standalone file through the online
//! backup API. Transient busy/locked statuses from the source are waited out
//! with a fixed delay and the same step is retried, with no upper bound: a
//! snapshot either completes as a consistent full copy or fails on a fatal
//! status, it never returns a partial copy.

use std::path::Path;
use std::sync::Arc;

use rusqlite::backup::{Backup, StepResult};
use rusqlite::{Connection, OpenFlags};

use sqlship_core::config::SnapshotConfig;
use sqlship_core::delay::Sleeper;
use sqlship_core::error::SnapshotError;
use sqlship_core::log::LogSink;
use sqlship_core::Artifact;

/// Consecutive busy waits between "still waiting" warnings
const BUSY_WARN_INTERVAL: u64 = 100;

/// Outcome of one page-copy step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepStatus {
    /// Pages copied, more remain
    More,
    /// Source is busy or locked, retry the same step later
    Busy,
    /// Every page has been copied
    Done,
}

/// A source that can be copied in bounded page batches
pub trait PageCopy {
    /// Copy up to `pages` pages. Fatal statuses are returned as errors.
    fn copy_step(&mut self, pages: i32) -> Result<StepStatus, SnapshotError>;

    /// `(remaining, total)` pages, when known
    fn pages_remaining(&self) -> Option<(i32, i32)> {
        None
    }
}

impl PageCopy for Backup<'_, '_> {
    fn copy_step(&mut self, pages: i32) -> Result<StepStatus, SnapshotError> {
        match self.step(pages) {
            Ok(StepResult::More) => Ok(StepStatus::More),
            Ok(StepResult::Done) => Ok(StepStatus::Done),
            Ok(StepResult::Busy) | Ok(StepResult::Locked) => Ok(StepStatus::Busy),
            Ok(other) => Err(SnapshotError::copy_failed(format!(
                "unexpected backup step status: {:?}",
                other
            ))),
            Err(e) => Err(SnapshotError::copy_failed(e.to_string())),
        }
    }

    fn pages_remaining(&self) -> Option<(i32, i32)> {
        let progress = self.progress();
        Some((progress.remaining, progress.pagecount))
    }
}

/// Counters from one copy loop
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CopyStats {
    pub steps: u64,
    pub busy_waits: u64,
}

/// Page-by-page snapshot engine
pub struct SnapshotEngine {
    config: SnapshotConfig,
    sleeper: Arc<dyn Sleeper>,
    log: Arc<dyn LogSink>,
}

impl SnapshotEngine {
    pub fn new(config: SnapshotConfig, sleeper: Arc<dyn Sleeper>, log: Arc<dyn LogSink>) -> Self {
        Self {
            config,
            sleeper,
            log,
        }
    }

    pub fn config(&self) -> &SnapshotConfig {
        &self.config
    }

    /// Snapshot the database at `source_path`, opened read-only.
    pub fn snapshot_path_to_file(
        &self,
        source_path: &Path,
        destination: &Path,
    ) -> Result<Artifact, SnapshotError> {
        if !source_path.is_file() {
            return Err(SnapshotError::SourceUnavailable {
                path: source_path.to_path_buf(),
                reason: "file does not exist".to_string(),
            });
        }

        let source = Connection::open_with_flags(
            source_path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .map_err(|e| SnapshotError::SourceUnavailable {
            path: source_path.to_path_buf(),
            reason: e.to_string(),
        })?;

        self.snapshot_to_file(&source, destination)
    }

    /// Copy `source` into a new database file at `destination`.
    ///
    /// On error the destination file may exist in an indeterminate state and
    /// must be removed by the caller.
    pub fn snapshot_to_file(
        &self,
        source: &Connection,
        destination: &Path,
    ) -> Result<Artifact, SnapshotError> {
        self.log.info(&format!(
            "Performing binary backup to file: {}",
            destination.display()
        ));

        let destination_error = |reason: String| SnapshotError::DestinationUnavailable {
            path: destination.to_path_buf(),
            reason,
        };

        let mut target =
            Connection::open(destination).map_err(|e| destination_error(e.to_string()))?;

        let stats = {
            let mut backup = Backup::new(source, &mut target)
                .map_err(|e| SnapshotError::copy_failed(format!("backup init failed: {}", e)))?;
            self.copy_pages(&mut backup)?
        };

        target
            .close()
            .map_err(|(_, e)| destination_error(format!("failed to close snapshot: {}", e)))?;

        let artifact =
            Artifact::from_file(destination).map_err(|e| destination_error(e.to_string()))?;

        self.log.info(&format!(
            "Binary backup completed successfully to: {} ({} bytes, {} steps, {} busy waits)",
            destination.display(),
            artifact.size_bytes,
            stats.steps,
            stats.busy_waits
        ));
        Ok(artifact)
    }

    /// Drive `copier` until it reports `Done`.
    ///
    /// `Busy` sleeps for the configured delay and retries the same step with
    /// no retry limit.
    pub fn copy_pages<P: PageCopy + ?Sized>(
        &self,
        copier: &mut P,
    ) -> Result<CopyStats, SnapshotError> {
        let mut stats = CopyStats::default();
        let mut consecutive_busy = 0u64;

        loop {
            let status = copier.copy_step(self.config.pages_per_step)?;
            stats.steps += 1;

            match status {
                StepStatus::Done => return Ok(stats),
                StepStatus::More => {
                    consecutive_busy = 0;
                    if let Some((remaining, total)) = copier.pages_remaining() {
                        self.log.debug(&format!(
                            "Snapshot progress: {}/{} pages copied",
                            total - remaining,
                            total
                        ));
                    }
                }
                StepStatus::Busy => {
                    stats.busy_waits += 1;
                    consecutive_busy += 1;
                    if consecutive_busy % BUSY_WARN_INTERVAL == 0 {
                        self.log.warn(&format!(
                            "Source database still busy after {} consecutive retries",
                            consecutive_busy
                        ));
                    }
                    self.sleeper.sleep(self.config.busy_delay);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sample::SampleStore;
    use sqlship_core::delay::RecordingSleeper;
    use sqlship_core::log::MemorySink;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::time::Duration;
    use tempfile::tempdir;

    enum Scripted {
        More,
        Busy,
        Done,
        Fatal(&'static str),
    }

    struct ScriptedCopy {
        script: VecDeque<Scripted>,
        requested: Vec<i32>,
    }

    impl ScriptedCopy {
        fn new(script: Vec<Scripted>) -> Self {
            Self {
                script: script.into(),
                requested: Vec::new(),
            }
        }
    }

    impl PageCopy for ScriptedCopy {
        fn copy_step(&mut self, pages: i32) -> Result<StepStatus, SnapshotError> {
            self.requested.push(pages);
            match self.script.pop_front().expect("script exhausted") {
                Scripted::More => Ok(StepStatus::More),
                Scripted::Busy => Ok(StepStatus::Busy),
                Scripted::Done => Ok(StepStatus::Done),
                Scripted::Fatal(reason) => Err(SnapshotError::copy_failed(reason)),
            }
        }
    }

    fn engine(sleeper: Arc<dyn Sleeper>, log: MemorySink) -> SnapshotEngine {
        SnapshotEngine::new(SnapshotConfig::default(), sleeper, Arc::new(log))
    }

    #[test]
    fn test_copy_pages_waits_out_busy_steps() {
        let sleeper = RecordingSleeper::new();
        let engine = engine(Arc::new(sleeper.clone()), MemorySink::new());
        let mut copier = ScriptedCopy::new(vec![
            Scripted::More,
            Scripted::Busy,
            Scripted::Busy,
            Scripted::More,
            Scripted::Done,
        ]);

        let stats = engine.copy_pages(&mut copier).unwrap();

        assert_eq!(stats, CopyStats { steps: 5, busy_waits: 2 });
        assert_eq!(sleeper.calls(), vec![Duration::from_millis(50); 2]);
        assert!(copier.requested.iter().all(|&pages| pages == 1024));
    }

    #[test]
    fn test_copy_pages_has_no_busy_limit() {
        let sleeper = RecordingSleeper::new();
        let log = MemorySink::new();
        let engine = engine(Arc::new(sleeper.clone()), log.clone());

        let mut script: Vec<Scripted> = (0..250).map(|_| Scripted::Busy).collect();
        script.push(Scripted::Done);
        let mut copier = ScriptedCopy::new(script);

        let stats = engine.copy_pages(&mut copier).unwrap();

        assert_eq!(stats.busy_waits, 250);
        assert_eq!(sleeper.calls().len(), 250);
        assert_eq!(log.count_containing("still busy"), 2);
    }

    #[test]
    fn test_copy_pages_stops_on_fatal_status() {
        let sleeper = RecordingSleeper::new();
        let engine = engine(Arc::new(sleeper.clone()), MemorySink::new());
        let mut copier = ScriptedCopy::new(vec![
            Scripted::More,
            Scripted::Fatal("disk I/O error"),
            Scripted::Done,
        ]);

        let err = engine.copy_pages(&mut copier).unwrap_err();

        assert_eq!(err.reason(), "disk I/O error");
        assert_eq!(copier.script.len(), 1);
        assert!(sleeper.calls().is_empty());
    }

    #[test]
    fn test_snapshot_preserves_row_count() {
        let dir = tempdir().unwrap();
        let log = MemorySink::new();
        let mut store = SampleStore::open(dir.path().join("source.sqlite"), Arc::new(log.clone()))
            .unwrap()
            .with_seed(7);
        store.create_table().unwrap();
        store.insert_random_rows(250).unwrap();

        let destination = dir.path().join("copy.sqlite");
        let engine = engine(Arc::new(RecordingSleeper::new()), log.clone());
        let artifact = engine
            .snapshot_to_file(store.connection(), &destination)
            .unwrap();

        assert_eq!(artifact.path, destination);
        assert!(artifact.size_bytes > 0);

        let copy = Connection::open(&destination).unwrap();
        let count: i64 = copy
            .query_row("SELECT COUNT(*) FROM people", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 250);
        assert!(log.contains("Binary backup completed successfully"));
    }

    #[test]
    fn test_snapshot_small_batches_take_many_steps() {
        let dir = tempdir().unwrap();
        let log = MemorySink::new();
        let mut store = SampleStore::open(dir.path().join("source.sqlite"), Arc::new(log.clone()))
            .unwrap()
            .with_seed(11);
        store.create_table().unwrap();
        store.insert_random_rows(2000).unwrap();

        let engine = SnapshotEngine::new(
            SnapshotConfig::default().with_pages_per_step(1),
            Arc::new(RecordingSleeper::new()),
            Arc::new(log.clone()),
        );
        let destination = dir.path().join("copy.sqlite");
        engine
            .snapshot_to_file(store.connection(), &destination)
            .unwrap();

        assert!(log.contains("Snapshot progress:"));
        let copy = SampleStore::open(&destination, Arc::new(MemorySink::new())).unwrap();
        assert_eq!(copy.row_count().unwrap(), 2000);
    }

    /// Holds an exclusive lock on the source and releases it on the Nth sleep
    struct UnlockingSleeper {
        holder: Mutex<Option<Connection>>,
        release_after: usize,
        calls: Mutex<usize>,
    }

    impl Sleeper for UnlockingSleeper {
        fn sleep(&self, _duration: Duration) {
            let mut calls = self.calls.lock().unwrap();
            *calls += 1;
            if *calls == self.release_after {
                if let Some(conn) = self.holder.lock().unwrap().take() {
                    conn.execute_batch("COMMIT").unwrap();
                }
            }
        }
    }

    #[test]
    fn test_snapshot_waits_for_exclusive_lock_release() {
        let dir = tempdir().unwrap();
        let source_path = dir.path().join("source.sqlite");
        let mut store = SampleStore::open(&source_path, Arc::new(MemorySink::new()))
            .unwrap()
            .with_seed(3);
        store.create_table().unwrap();
        store.insert_random_rows(10).unwrap();

        let holder = Connection::open(&source_path).unwrap();
        holder.execute_batch("BEGIN EXCLUSIVE").unwrap();

        let source = Connection::open(&source_path).unwrap();
        source.busy_timeout(Duration::ZERO).unwrap();

        let sleeper = Arc::new(UnlockingSleeper {
            holder: Mutex::new(Some(holder)),
            release_after: 3,
            calls: Mutex::new(0),
        });
        let engine = SnapshotEngine::new(
            SnapshotConfig::default(),
            sleeper.clone(),
            Arc::new(MemorySink::new()),
        );

        let destination = dir.path().join("copy.sqlite");
        engine.snapshot_to_file(&source, &destination).unwrap();

        assert!(*sleeper.calls.lock().unwrap() >= 3);
        let copy = SampleStore::open(&destination, Arc::new(MemorySink::new())).unwrap();
        assert_eq!(copy.row_count().unwrap(), 10);
    }

    #[test]
    fn test_snapshot_missing_source() {
        let dir = tempdir().unwrap();
        let engine = engine(Arc::new(RecordingSleeper::new()), MemorySink::new());

        let err = engine
            .snapshot_path_to_file(&dir.path().join("nope.sqlite"), &dir.path().join("out.sqlite"))
            .unwrap_err();

        assert!(matches!(err, SnapshotError::SourceUnavailable { .. }));
        assert!(!dir.path().join("out.sqlite").exists());
    }

    #[test]
    fn test_snapshot_uncreatable_destination() {
        let dir = tempdir().unwrap();
        let source = Connection::open_in_memory().unwrap();
        let engine = engine(Arc::new(RecordingSleeper::new()), MemorySink::new());

        let err = engine
            .snapshot_to_file(&source, &dir.path().join("missing_dir").join("out.sqlite"))
            .unwrap_err();

        assert!(matches!(err, SnapshotError::DestinationUnavailable { .. }));
    }
}
