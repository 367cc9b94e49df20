//! Console and rotating file log targets
//!
//! Every formatted event reaches a writer as one `write` call, and the file
//! writer holds its mutex for the whole call, so concurrent runs never
//! interleave partial lines.

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::Local;
use thiserror::Error;
use tracing_subscriber::filter::{EnvFilter, LevelFilter};
use tracing_subscriber::fmt::{self, MakeWriter};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use sqlship_core::log::Severity;

/// Timestamp layout of log file names
pub const LOG_TIMESTAMP_FORMAT: &str = "%Y-%m-%d_%H-%M-%S";

#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("Failed to prepare log directory {}: {source}", path.display())]
    Directory {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to open log file {}: {source}", path.display())]
    File {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to install log subscriber: {0}")]
    Install(String),
}

#[derive(Debug, Clone)]
pub struct LogOptions {
    pub level: Severity,
    pub dir: PathBuf,
    /// Start a new file once the current one reaches this size. 0 disables rotation.
    pub max_bytes: u64,
}

struct FileState {
    file: File,
    path: PathBuf,
    written: u64,
}

/// `app_<timestamp>.log` in a directory, rotated by size
pub struct RotatingFile {
    dir: PathBuf,
    max_bytes: u64,
    state: Mutex<FileState>,
}

impl RotatingFile {
    pub fn create(dir: impl Into<PathBuf>, max_bytes: u64) -> Result<Self, LoggingError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir).map_err(|source| LoggingError::Directory {
            path: dir.clone(),
            source,
        })?;

        let state = open_log_file(&dir)?;
        Ok(Self {
            dir,
            max_bytes,
            state: Mutex::new(state),
        })
    }

    /// File currently being written
    pub fn current_path(&self) -> PathBuf {
        self.lock().path.clone()
    }

    fn lock(&self) -> MutexGuard<'_, FileState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_line(&self, buf: &[u8]) -> io::Result<usize> {
        let mut state = self.lock();
        state.file.write_all(buf)?;
        state.file.flush()?;
        state.written += buf.len() as u64;

        if self.max_bytes > 0 && state.written >= self.max_bytes {
            *state = open_log_file(&self.dir).map_err(|e| io::Error::other(e.to_string()))?;
        }
        Ok(buf.len())
    }
}

/// Open a fresh file named after the current time, suffixing `_<n>` when a
/// file of that name already exists.
fn open_log_file(dir: &Path) -> Result<FileState, LoggingError> {
    let stamp = Local::now().format(LOG_TIMESTAMP_FORMAT).to_string();
    let mut sequence = 0u32;

    loop {
        let name = if sequence == 0 {
            format!("app_{}.log", stamp)
        } else {
            format!("app_{}_{}.log", stamp, sequence)
        };
        let path = dir.join(name);

        match OpenOptions::new().append(true).create_new(true).open(&path) {
            Ok(file) => {
                return Ok(FileState {
                    file,
                    path,
                    written: 0,
                });
            }
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => sequence += 1,
            Err(source) => return Err(LoggingError::File { path, source }),
        }
    }
}

/// Per-event handle returned to the fmt layer
pub struct RotatingWriter<'a> {
    target: &'a RotatingFile,
}

impl Write for RotatingWriter<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.target.write_line(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.target.lock().file.flush()
    }
}

impl<'a> MakeWriter<'a> for RotatingFile {
    type Writer = RotatingWriter<'a>;

    fn make_writer(&'a self) -> Self::Writer {
        RotatingWriter { target: self }
    }
}

/// What [`init`] installed
#[derive(Debug)]
pub struct Installed {
    /// Initial log file, or why the file target is missing. The console
    /// target is installed either way.
    pub file: Result<PathBuf, LoggingError>,
}

/// Install the console layer and, when its directory is usable, the file layer
pub fn init(options: &LogOptions) -> Result<Installed, LoggingError> {
    let (file_layer, file) = match RotatingFile::create(&options.dir, options.max_bytes) {
        Ok(target) => {
            let path = target.current_path();
            let layer = fmt::layer()
                .with_target(false)
                .with_ansi(false)
                .with_writer(target);
            (Some(layer), Ok(path))
        }
        Err(e) => (None, Err(e)),
    };

    let level = LevelFilter::from_level(options.level.as_level());
    let filter = EnvFilter::from_default_env().add_directive(level.into());

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).with_ansi(true))
        .with(file_layer)
        .try_init()
        .map_err(|e| LoggingError::Install(e.to_string()))?;

    Ok(Installed { file })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn log_files(dir: &Path) -> Vec<PathBuf> {
        let mut files: Vec<PathBuf> = std::fs::read_dir(dir)
            .unwrap()
            .map(|entry| entry.unwrap().path())
            .collect();
        files.sort();
        files
    }

    #[test]
    fn test_file_named_after_timestamp() {
        let dir = tempfile::tempdir().unwrap();
        let file = RotatingFile::create(dir.path().join("logs"), 0).unwrap();

        let name = file
            .current_path()
            .file_name()
            .unwrap()
            .to_string_lossy()
            .into_owned();
        assert!(name.starts_with("app_"));
        assert!(name.ends_with(".log"));
        assert!(dir.path().join("logs").is_dir());
    }

    #[test]
    fn test_no_rotation_when_disabled() {
        let dir = tempfile::tempdir().unwrap();
        let file = RotatingFile::create(dir.path(), 0).unwrap();
        for _ in 0..50 {
            file.make_writer().write_all(b"2024-01-01 INFO line\n").unwrap();
        }
        assert_eq!(log_files(dir.path()).len(), 1);
    }

    #[test]
    fn test_rotates_after_max_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let file = RotatingFile::create(dir.path(), 64).unwrap();
        let first = file.current_path();

        let line = [b'x'; 40];
        file.make_writer().write_all(&line).unwrap();
        assert_eq!(file.current_path(), first);
        file.make_writer().write_all(&line).unwrap();

        assert_ne!(file.current_path(), first);
        assert_eq!(std::fs::metadata(&first).unwrap().len(), 80);
        assert_eq!(log_files(dir.path()).len(), 2);
    }

    #[test]
    fn test_unusable_log_dir_keeps_console_logging() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, b"").unwrap();

        let installed = init(&LogOptions {
            level: Severity::Info,
            dir: blocker.join("logs"),
            max_bytes: 0,
        })
        .unwrap();

        assert!(matches!(installed.file, Err(LoggingError::Directory { .. })));
        assert!(tracing::dispatcher::has_been_set());
    }

    #[test]
    fn test_concurrent_lines_stay_whole() {
        let dir = tempfile::tempdir().unwrap();
        let file = Arc::new(RotatingFile::create(dir.path(), 0).unwrap());

        let handles: Vec<_> = (0..8)
            .map(|t| {
                let file = file.clone();
                std::thread::spawn(move || {
                    let line = format!("thread-{} {}\n", t, "y".repeat(200));
                    for _ in 0..50 {
                        file.make_writer().write_all(line.as_bytes()).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let text = std::fs::read_to_string(file.current_path()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 400);
        assert!(lines.iter().all(|line| line.len() == 209 && line.ends_with('y')));
    }
}
