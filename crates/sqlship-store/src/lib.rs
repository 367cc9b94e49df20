//! # sqlship Store
//!
//! SQLite side of the pipeline: the online-backup snapshot engine, the sample
//! record store used to populate source databases, and the SQL text dump.

pub mod dump;
pub mod error;
pub mod sample;
pub mod snapshot;

pub use dump::dump_to_file;
pub use error::{StoreError, StoreResult};
pub use sample::SampleStore;
pub use snapshot::{CopyStats, PageCopy, SnapshotEngine, StepStatus};
