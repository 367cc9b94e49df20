//! # sqlship
//!
//! Unattended snapshots of a live SQLite database, shipped to an FTP endpoint
//! with TLS on both the control and data channels.
//!
//! ## Components
//!
//! - **[SnapshotEngine]**: page-by-page online backup that waits out lock contention
//! - **[TransportClient]**: upload with retry, exponential backoff and byte progress
//! - **[BackupPipeline]**: snapshot then upload, with the artifact removed on every exit path
//! - **[LogSink]**: the injected logging interface shared by all of the above
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use sqlship::{BackupPipeline, Credentials, CurlTransfer, Endpoint, PipelineConfig};
//! use sqlship::{ThreadSleeper, TracingSink};
//!
//! let endpoint = Endpoint::new(
//!     "ftp.example.com",
//!     21,
//!     Credentials::new("backup", "secret"),
//!     "nightly",
//! )?;
//! let config = PipelineConfig::new("people.sqlite", "people", endpoint);
//!
//! let mut pipeline = BackupPipeline::new(
//!     config,
//!     Arc::new(CurlTransfer::new()),
//!     Arc::new(ThreadSleeper),
//!     Arc::new(TracingSink),
//! );
//! let succeeded = pipeline.run();
//! # let _ = succeeded;
//! # Ok::<(), sqlship::ConfigError>(())
//! ```

// ============================================================================
// Module aliases for namespaced access
// ============================================================================

pub use sqlship_core as core;
pub use sqlship_pipeline as pipeline;
pub use sqlship_store as store;
pub use sqlship_transport as transport;

// ============================================================================
// Flat re-exports of the commonly used types
// ============================================================================

pub use sqlship_core::{
    Artifact, ConfigError, Credentials, Endpoint, ErrorKind, LogSink, MemorySink, PipelineError,
    RecordingSleeper, Severity, SnapshotConfig, SnapshotError, Sleeper, ThreadSleeper,
    TracingSink, TransferConfig, TransportError,
};
pub use sqlship_pipeline::{BackupPipeline, PipelineConfig, PipelineState, RunOutcome, RunReport};
pub use sqlship_store::{SampleStore, SnapshotEngine};
pub use sqlship_transport::{CurlTransfer, TransferPrimitive, TransportClient, UploadReport};

#[cfg(feature = "testing")]
pub use sqlship_transport::{StubOutcome, StubTransfer};
