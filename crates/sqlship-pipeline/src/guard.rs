//! Drop guard owning the on-disk artifact for the length of a run

use std::fs::OpenOptions;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use sqlship_core::error::SnapshotError;
use sqlship_core::log::LogSink;

/// Removes its file when dropped, on every exit path including unwinding.
pub struct ArtifactGuard {
    path: PathBuf,
    log: Arc<dyn LogSink>,
}

impl ArtifactGuard {
    /// Create `path` exclusively and take ownership of it.
    ///
    /// An existing file is never adopted, so the guard can only ever delete
    /// what this run created.
    pub fn claim(path: impl Into<PathBuf>, log: Arc<dyn LogSink>) -> Result<Self, SnapshotError> {
        let path = path.into();
        OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .map_err(|e| SnapshotError::DestinationUnavailable {
                path: path.clone(),
                reason: e.to_string(),
            })?;
        Ok(Self { path, log })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ArtifactGuard {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => self.log.info(&format!(
                "Temporary file removed: {}",
                self.path.display()
            )),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => self.log.warn(&format!(
                "Failed to remove temporary file {}: {}",
                self.path.display(),
                e
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlship_core::log::MemorySink;

    #[test]
    fn test_drop_removes_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.sqlite");
        let log = MemorySink::new();

        {
            let guard = ArtifactGuard::claim(&path, Arc::new(log.clone())).unwrap();
            std::fs::write(guard.path(), b"snapshot").unwrap();
            assert!(path.exists());
        }

        assert!(!path.exists());
        assert_eq!(log.count_containing("Temporary file removed"), 1);
    }

    #[test]
    fn test_existing_file_is_not_claimed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("taken.sqlite");
        std::fs::write(&path, b"someone else's").unwrap();

        let err = ArtifactGuard::claim(&path, Arc::new(MemorySink::new())).err().unwrap();

        assert!(matches!(err, SnapshotError::DestinationUnavailable { .. }));
        assert_eq!(std::fs::read(&path).unwrap(), b"someone else's");
    }

    #[test]
    fn test_drop_after_external_removal_is_quiet() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("b.sqlite");
        let log = MemorySink::new();

        let guard = ArtifactGuard::claim(&path, Arc::new(log.clone())).unwrap();
        std::fs::remove_file(&path).unwrap();
        drop(guard);

        assert!(log.records().is_empty());
    }

    #[test]
    fn test_removed_during_unwind() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("c.sqlite");
        let claimed = path.clone();

        let result = std::panic::catch_unwind(move || {
            let _guard = ArtifactGuard::claim(&claimed, Arc::new(MemorySink::new())).unwrap();
            panic!("mid-run failure");
        });

        assert!(result.is_err());
        assert!(!path.exists());
    }
}
