//! # sqlship Pipeline
//!
//! Sequences the snapshot engine and the transport client, owns the artifact
//! for the length of a run and reduces every outcome to a boolean plus a
//! [`RunReport`].

pub mod config;
pub mod guard;
pub mod orchestrator;
pub mod report;

pub use config::PipelineConfig;
pub use guard::ArtifactGuard;
pub use orchestrator::BackupPipeline;
pub use report::{PipelineState, RunOutcome, RunReport};
