//! # sqlship Core
//!
//! Shared building blocks for the sqlship backup pipeline: the error
//! taxonomy, the injected logging sink, the delay strategy used by busy waits
//! and retry backoff, and the run configuration types.

pub mod artifact;
pub mod config;
pub mod delay;
pub mod error;
pub mod log;

pub use artifact::Artifact;
pub use config::{Credentials, Endpoint, SnapshotConfig, TransferConfig};
pub use delay::{RecordingSleeper, Sleeper, ThreadSleeper};
pub use error::{
    ConfigError, ErrorKind, LocalResourceError, PipelineError, PipelineResult, SnapshotError,
    TransportError,
};
pub use log::{LevelFilter, LogSink, MemorySink, Severity, TracingSink};
