//! # Pipeline Configuration
//!
//! Endpoint, credentials and per-run transfer/snapshot settings. All of these
//! are immutable for the duration of one pipeline run.
//!
//! ## Environment Variables
//!
//! `TransferConfig::from_env` reads:
//! - `SQLSHIP_TRANSFER_TIMEOUT_SECS` - Connect/response timeout per attempt (default: 30)
//! - `SQLSHIP_TRANSFER_MAX_RETRIES` - Attempts before giving up, minimum 1 (default: 3)
//! - `SQLSHIP_TLS_VERIFY` - Verify server certificate and hostname (default: true)
//! - `SQLSHIP_TRANSFER_VERBOSE` - Verbose transfer diagnostics (default: false)

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::ConfigError;

/// Default per-attempt timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
/// Default number of upload attempts
pub const DEFAULT_MAX_RETRIES: u32 = 3;
/// Pages copied per snapshot step
pub const DEFAULT_PAGES_PER_STEP: i32 = 1024;
/// Wait between snapshot steps when the source is busy
pub const DEFAULT_BUSY_DELAY: Duration = Duration::from_millis(50);

pub const ENV_TIMEOUT_SECS: &str = "SQLSHIP_TRANSFER_TIMEOUT_SECS";
pub const ENV_MAX_RETRIES: &str = "SQLSHIP_TRANSFER_MAX_RETRIES";
pub const ENV_TLS_VERIFY: &str = "SQLSHIP_TLS_VERIFY";
pub const ENV_VERBOSE: &str = "SQLSHIP_TRANSFER_VERBOSE";

/// Username/password pair. The password is wiped from memory on drop and
/// never appears in `Debug` output.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct Credentials {
    username: String,
    password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    pub fn anonymous() -> Self {
        Self::new("", "")
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn password(&self) -> &str {
        &self.password
    }

    /// `*` per character, or `<empty>`
    pub fn masked_password(&self) -> String {
        if self.password.is_empty() {
            "<empty>".to_string()
        } else {
            "*".repeat(self.password.chars().count())
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &self.masked_password())
            .finish()
    }
}

/// Remote upload target
#[derive(Debug, Clone)]
pub struct Endpoint {
    host: String,
    port: u16,
    credentials: Credentials,
    remote_dir: String,
}

impl Endpoint {
    /// Build a validated endpoint. A port of 0 leaves the port out of the URL.
    pub fn new(
        host: impl Into<String>,
        port: u16,
        credentials: Credentials,
        remote_dir: impl Into<String>,
    ) -> Result<Self, ConfigError> {
        let endpoint = Self {
            host: host.into().trim().to_string(),
            port,
            credentials,
            remote_dir: remote_dir.into(),
        };
        endpoint.validate()?;
        Ok(endpoint)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.host.is_empty() {
            return Err(ConfigError::MissingField { field: "host" });
        }
        if self.host.contains("://") {
            return Err(ConfigError::InvalidHost {
                host: self.host.clone(),
                reason: "host must not include a scheme".to_string(),
            });
        }
        if self
            .host
            .chars()
            .any(|c| c == '/' || c == '\\' || c.is_whitespace())
        {
            return Err(ConfigError::InvalidHost {
                host: self.host.clone(),
                reason: "host contains path separators or whitespace".to_string(),
            });
        }
        if self.remote_dir.split(['/', '\\']).any(|segment| segment == "..") {
            return Err(ConfigError::InvalidDirectory {
                directory: self.remote_dir.clone(),
                reason: "parent directory segments are not allowed".to_string(),
            });
        }
        Ok(())
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    pub fn remote_dir(&self) -> &str {
        &self.remote_dir
    }

    /// `host:port, user: name, pass: ****` for log lines
    pub fn describe(&self) -> String {
        format!(
            "{}:{}, user: {}, pass: {}",
            self.host,
            self.port,
            self.credentials.username(),
            self.credentials.masked_password()
        )
    }
}

/// Per-run transfer settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferConfig {
    timeout: Duration,
    max_retries: u32,
    tls_verify: bool,
    verbose: bool,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            max_retries: DEFAULT_MAX_RETRIES,
            tls_verify: true,
            verbose: false,
        }
    }
}

impl TransferConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Load overrides from process environment variables
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidEnvVar` if a variable is set but unparsable.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load overrides through an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(secs) = parse_var::<u64, _>(&lookup, ENV_TIMEOUT_SECS)? {
            if secs == 0 {
                return Err(ConfigError::InvalidEnvVar {
                    key: ENV_TIMEOUT_SECS.to_string(),
                    message: "timeout must be greater than zero".to_string(),
                });
            }
            config = config.with_timeout(Duration::from_secs(secs));
        }
        if let Some(retries) = parse_var::<u32, _>(&lookup, ENV_MAX_RETRIES)? {
            config = config.with_max_retries(retries);
        }
        if let Some(verify) = parse_bool(&lookup, ENV_TLS_VERIFY)? {
            config = config.with_tls_verify(verify);
        }
        if let Some(verbose) = parse_bool(&lookup, ENV_VERBOSE)? {
            config = config.with_verbose(verbose);
        }

        Ok(config)
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Values below 1 are raised to 1
    #[must_use]
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries.max(1);
        self
    }

    /// Disabling verification keeps TLS encryption on both channels but stops
    /// authenticating the server. Anyone able to intercept the connection can
    /// then impersonate the endpoint and receive the credentials and the
    /// artifact. Only use it for endpoints with self-signed certificates on a
    /// trusted network.
    #[must_use]
    pub fn with_tls_verify(mut self, tls_verify: bool) -> Self {
        self.tls_verify = tls_verify;
        self
    }

    #[must_use]
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    pub fn tls_verify(&self) -> bool {
        self.tls_verify
    }

    pub fn verbose(&self) -> bool {
        self.verbose
    }
}

/// Snapshot engine tuning
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotConfig {
    pub pages_per_step: i32,
    pub busy_delay: Duration,
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            pages_per_step: DEFAULT_PAGES_PER_STEP,
            busy_delay: DEFAULT_BUSY_DELAY,
        }
    }
}

impl SnapshotConfig {
    #[must_use]
    pub fn with_pages_per_step(mut self, pages: i32) -> Self {
        self.pages_per_step = pages.max(1);
        self
    }

    #[must_use]
    pub fn with_busy_delay(mut self, delay: Duration) -> Self {
        self.busy_delay = delay;
        self
    }
}

fn parse_var<T, F>(lookup: &F, key: &str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| ConfigError::InvalidEnvVar {
                key: key.to_string(),
                message: format!("'{}': {}", raw, e),
            }),
        None => Ok(None),
    }
}

fn parse_bool<F>(lookup: &F, key: &str) -> Result<Option<bool>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) => match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(Some(true)),
            "0" | "false" | "no" | "off" => Ok(Some(false)),
            _ => Err(ConfigError::InvalidEnvVar {
                key: key.to_string(),
                message: format!("'{}' is not a boolean", raw),
            }),
        },
        None => Ok(None),
    }
}
