//! Command flow: validate settings, populate the source database, run the
//! backup pipeline and map the outcome to an exit status.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use sqlship_core::config::{Credentials, Endpoint, TransferConfig};
use sqlship_core::delay::{Sleeper, ThreadSleeper};
use sqlship_core::error::{ConfigError, ErrorKind};
use sqlship_core::log::{LevelFilter, LogSink, Severity, TracingSink};
use sqlship_pipeline::{BackupPipeline, PipelineConfig, RunReport};
use sqlship_store::{SampleStore, StoreResult};
use sqlship_transport::{CurlTransfer, TransferPrimitive};

/// Environment variable consulted when the password argument is `-`
pub const PASSWORD_ENV: &str = "FTP_PASS";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitStatus {
    Success,
    InvalidArgs,
    /// Database preparation, snapshot or upload failed
    RunFailed,
    ConfigError,
}

impl ExitStatus {
    pub fn code(self) -> u8 {
        match self {
            ExitStatus::Success => 0,
            ExitStatus::InvalidArgs => 1,
            ExitStatus::RunFailed => 2,
            ExitStatus::ConfigError => 3,
        }
    }

    /// One-line stderr summary for failed runs
    pub fn summary(self) -> Option<&'static str> {
        match self {
            ExitStatus::Success | ExitStatus::InvalidArgs => None,
            ExitStatus::RunFailed => Some("Backup and upload failed. See logs for details."),
            ExitStatus::ConfigError => Some("Invalid configuration. See logs for details."),
        }
    }
}

impl From<ExitStatus> for ExitCode {
    fn from(status: ExitStatus) -> Self {
        ExitCode::from(status.code())
    }
}

#[derive(Debug, Clone)]
pub struct RunArgs {
    pub sqlite_prefix: String,
    pub ftp_host: String,
    pub ftp_port: u16,
    pub ftp_user: String,
    pub ftp_pass: String,
    pub ftp_dir: String,
    pub tls_verify: bool,
    pub rows: u32,
    pub retries: Option<u32>,
    pub timeout_secs: Option<u64>,
    pub report: Option<PathBuf>,
}

/// Run against the real network, logging through `tracing` at `level` and above
pub fn run_backup<F>(args: RunArgs, level: Severity, lookup: F) -> ExitStatus
where
    F: Fn(&str) -> Option<String>,
{
    run_with(
        args,
        &lookup,
        Arc::new(CurlTransfer::new()),
        Arc::new(ThreadSleeper),
        Arc::new(LevelFilter::new(level, TracingSink)),
    )
}

fn run_with(
    args: RunArgs,
    lookup: &dyn Fn(&str) -> Option<String>,
    primitive: Arc<dyn TransferPrimitive>,
    sleeper: Arc<dyn Sleeper>,
    log: Arc<dyn LogSink>,
) -> ExitStatus {
    let (endpoint, transfer) = match resolve_settings(&args, lookup) {
        Ok(settings) => settings,
        Err(e) => {
            log.error(&format!("Configuration error: {}", e));
            return ExitStatus::ConfigError;
        }
    };

    log.info(&format!("Starting backup. FTP host: {}", endpoint.describe()));
    if !transfer.tls_verify() {
        log.warn("TLS certificate verification is disabled; the server will not be authenticated");
    }

    let source = match populate(&args, log.clone()) {
        Ok(path) => path,
        Err(e) => {
            log.error(&format!("Failed to prepare source database: {}", e));
            return ExitStatus::RunFailed;
        }
    };

    let config =
        PipelineConfig::new(source, args.sqlite_prefix.clone(), endpoint).with_transfer(transfer);
    let mut pipeline = BackupPipeline::new(config, primitive, sleeper, log.clone());
    let succeeded = pipeline.run();

    if let (Some(path), Some(report)) = (&args.report, pipeline.last_report()) {
        write_report(path, report, log.as_ref());
    }

    if succeeded {
        ExitStatus::Success
    } else if pipeline.last_error_kind() == Some(ErrorKind::Configuration) {
        ExitStatus::ConfigError
    } else {
        ExitStatus::RunFailed
    }
}

/// Endpoint and transfer settings; environment first, then command-line overrides
fn resolve_settings(
    args: &RunArgs,
    lookup: &dyn Fn(&str) -> Option<String>,
) -> Result<(Endpoint, TransferConfig), ConfigError> {
    let password = if args.ftp_pass == "-" {
        lookup(PASSWORD_ENV).ok_or(ConfigError::MissingField {
            field: PASSWORD_ENV,
        })?
    } else {
        args.ftp_pass.clone()
    };

    let mut transfer = TransferConfig::from_lookup(lookup)?;
    if let Some(retries) = args.retries {
        transfer = transfer.with_max_retries(retries);
    }
    if let Some(secs) = args.timeout_secs {
        transfer = transfer.with_timeout(Duration::from_secs(secs));
    }
    if !args.tls_verify {
        transfer = transfer.with_tls_verify(false);
    }

    let endpoint = Endpoint::new(
        args.ftp_host.clone(),
        args.ftp_port,
        Credentials::new(args.ftp_user.clone(), password),
        args.ftp_dir.clone(),
    )?;
    Ok((endpoint, transfer))
}

/// Create the timestamped source database and fill it
fn populate(args: &RunArgs, log: Arc<dyn LogSink>) -> StoreResult<PathBuf> {
    let mut store = SampleStore::open_timestamped(&args.sqlite_prefix, log.clone())?;
    store.create_table()?;
    store.insert_random_rows(args.rows as usize)?;
    let total = store.row_count()?;
    log.info(&format!("Total rows after insert: {}", total));
    Ok(store.path().to_path_buf())
}

fn write_report(path: &Path, report: &RunReport, log: &dyn LogSink) {
    let written = serde_json::to_string_pretty(report)
        .map_err(|e| e.to_string())
        .and_then(|json| std::fs::write(path, json).map_err(|e| e.to_string()));
    match written {
        Ok(()) => log.info(&format!("Run report written to {}", path.display())),
        Err(e) => log.warn(&format!(
            "Failed to write run report {}: {}",
            path.display(),
            e
        )),
    }
}
