use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

mod app;
mod logging;

use app::{ExitStatus, RunArgs, run_backup};
use logging::LogOptions;
use sqlship_core::log::Severity;

#[derive(Parser, Debug)]
#[command(name = "sqlship", version)]
#[command(about = "Populate a SQLite database, snapshot it and upload the snapshot over FTPS")]
#[command(after_help = "If <FTP_PASS> is '-', the password is read from the FTP_PASS \
environment variable.\n\nExit codes: 1 (bad args), 2 (backup or upload failed), 3 (config error)")]
struct Cli {
    /// Prefix of the SQLite database and of its backup artifacts
    sqlite_prefix: String,

    /// FTP server host name
    ftp_host: String,

    /// FTP server port (1-65535)
    #[arg(value_parser = clap::value_parser!(u16).range(1..))]
    ftp_port: u16,

    /// FTP user name
    ftp_user: String,

    /// FTP password, or '-' to read FTP_PASS
    ftp_pass: String,

    /// Remote directory, created when missing
    ftp_dir: String,

    /// Skip server certificate and hostname checks. The connection stays
    /// encrypted but the server is no longer authenticated, so an interceptor
    /// can impersonate it. Only for self-signed endpoints on trusted networks.
    #[arg(long)]
    no_ssl_verify: bool,

    /// Rows to insert into the database before the backup
    #[arg(long, default_value_t = 100, value_parser = clap::value_parser!(u32).range(1..))]
    rows: u32,

    /// Upload attempts before giving up (default: 3, minimum 1)
    #[arg(long)]
    retries: Option<u32>,

    /// Connection and response timeout per attempt (default: 30)
    #[arg(long, value_name = "SECONDS", value_parser = clap::value_parser!(u64).range(1..))]
    timeout: Option<u64>,

    /// Minimum log level: debug, info, warn or error
    #[arg(long, default_value = "info")]
    log_level: Severity,

    /// Directory for log files
    #[arg(long, default_value = "logs")]
    log_dir: PathBuf,

    /// Start a new log file after this many bytes (0 = never)
    #[arg(long, default_value_t = 0)]
    log_max_bytes: u64,

    /// Write the JSON run report to this path
    #[arg(long, value_name = "PATH")]
    report: Option<PathBuf>,
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            return if e.use_stderr() {
                ExitStatus::InvalidArgs.into()
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    let options = LogOptions {
        level: cli.log_level,
        dir: cli.log_dir.clone(),
        max_bytes: cli.log_max_bytes,
    };
    match logging::init(&options) {
        Ok(installed) => match installed.file {
            Ok(path) => tracing::debug!(log_file = %path.display(), "Logging initialized"),
            Err(e) => tracing::warn!("Logging to file disabled: {}", e),
        },
        Err(e) => eprintln!("Logging disabled: {}", e),
    }

    let args = RunArgs {
        sqlite_prefix: cli.sqlite_prefix,
        ftp_host: cli.ftp_host,
        ftp_port: cli.ftp_port,
        ftp_user: cli.ftp_user,
        ftp_pass: cli.ftp_pass,
        ftp_dir: cli.ftp_dir,
        tls_verify: !cli.no_ssl_verify,
        rows: cli.rows,
        retries: cli.retries,
        timeout_secs: cli.timeout,
        report: cli.report,
    };

    let status = run_backup(args, cli.log_level, |key| std::env::var(key).ok());
    if let Some(summary) = status.summary() {
        eprintln!("{}", summary);
    }
    status.into()
}
