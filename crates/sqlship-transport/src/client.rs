//! Retrying upload client
//!
//! Wraps a [`TransferPrimitive`] with the retry loop: attempts are numbered
//! from 1, a failed attempt with attempts remaining is followed by an
//! exponential backoff sleep, and the first success returns immediately.
//! Local file problems and primitive setup failures are never retried.
//!
//! Terminal errors are returned, not logged; the caller owns the final
//! failure line.

use std::fs::File;
use std::path::Path;
use std::sync::Arc;

use serde::Serialize;

use sqlship_core::config::{Endpoint, TransferConfig};
use sqlship_core::delay::Sleeper;
use sqlship_core::error::{LocalResourceError, TransportError};
use sqlship_core::log::LogSink;

use crate::backoff::backoff_delay;
use crate::primitive::{PrimitiveError, TransferHooks, TransferPrimitive, TransferRequest};
use crate::url::build_url;

/// Byte progress observer, `(bytes_so_far, total_bytes)`
pub type ProgressCallback = Arc<dyn Fn(u64, u64) + Send + Sync>;

/// Summary of a successful upload
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadReport {
    pub url: String,
    pub attempts: u32,
    pub bytes: u64,
}

/// One retry cycle; never stored beyond the loop iteration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferAttempt {
    pub number: u32,
    pub error: Option<PrimitiveError>,
}

impl TransferAttempt {
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

/// Splits response chunks into lines, carrying partial lines across chunks
#[derive(Debug, Default)]
struct ResponseLines {
    pending: Vec<u8>,
}

impl ResponseLines {
    fn push(&mut self, chunk: &[u8], emit: &mut dyn FnMut(&str)) {
        self.pending.extend_from_slice(chunk);
        while let Some(pos) = self.pending.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=pos).collect();
            Self::emit_line(&line, emit);
        }
    }

    fn finish(&mut self, emit: &mut dyn FnMut(&str)) {
        let rest = std::mem::take(&mut self.pending);
        Self::emit_line(&rest, emit);
    }

    fn emit_line(raw: &[u8], emit: &mut dyn FnMut(&str)) {
        let text = String::from_utf8_lossy(raw);
        let line = text.trim_end_matches(['\r', '\n']);
        if !line.trim().is_empty() {
            emit(line);
        }
    }
}

pub struct TransportClient {
    endpoint: Endpoint,
    config: TransferConfig,
    primitive: Arc<dyn TransferPrimitive>,
    sleeper: Arc<dyn Sleeper>,
    log: Arc<dyn LogSink>,
    progress: Option<ProgressCallback>,
    last_error: Option<String>,
}

impl TransportClient {
    pub fn new(
        endpoint: Endpoint,
        config: TransferConfig,
        primitive: Arc<dyn TransferPrimitive>,
        sleeper: Arc<dyn Sleeper>,
        log: Arc<dyn LogSink>,
    ) -> Self {
        Self {
            endpoint,
            config,
            primitive,
            sleeper,
            log,
            progress: None,
            last_error: None,
        }
    }

    #[must_use]
    pub fn with_progress(mut self, callback: ProgressCallback) -> Self {
        self.progress = Some(callback);
        self
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub fn config(&self) -> &TransferConfig {
        &self.config
    }

    /// Error detail of the most recent failed attempt
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Upload `local_path` into `remote_dir` on the endpoint.
    ///
    /// # Errors
    ///
    /// - `LocalResource` if the file is missing or unreadable (no attempt made)
    /// - `InitFailed` if the primitive cannot be set up (not retried)
    /// - `RetriesExhausted` after `max_retries` failed attempts
    pub fn upload(
        &mut self,
        local_path: &Path,
        remote_dir: &str,
    ) -> Result<UploadReport, TransportError> {
        self.last_error = None;
        let (filename, file_size) = Self::check_local(local_path)?;

        let url = build_url(
            self.endpoint.host(),
            self.endpoint.port(),
            remote_dir,
            &filename,
        );
        let request = TransferRequest {
            url: url.clone(),
            local_path: local_path.to_path_buf(),
            file_size,
            credentials: self.endpoint.credentials().clone(),
            timeout: self.config.timeout(),
            tls_verify: self.config.tls_verify(),
            verbose: self.config.verbose(),
        };

        let max_retries = self.config.max_retries().max(1);
        for number in 1..=max_retries {
            self.log.info(&format!("Upload attempt {} to URL: {}", number, url));

            let attempt = self.attempt(number, &request);
            match attempt.error {
                None => {
                    self.log.info(&format!("Upload succeeded: {}", filename));
                    return Ok(UploadReport {
                        url,
                        attempts: number,
                        bytes: file_size,
                    });
                }
                Some(PrimitiveError::Init { detail }) => {
                    self.last_error = Some(detail.clone());
                    return Err(TransportError::InitFailed { detail });
                }
                Some(PrimitiveError::LocalFile { detail }) => {
                    self.last_error = Some(detail.clone());
                    return Err(LocalResourceError::Unreadable {
                        path: local_path.to_path_buf(),
                        reason: detail,
                    }
                    .into());
                }
                Some(PrimitiveError::Transfer { detail }) => {
                    self.log.warn(&format!("Upload attempt {} failed: {}", number, detail));
                    self.last_error = Some(detail);
                    if number < max_retries {
                        let delay = backoff_delay(number);
                        self.log
                            .info(&format!("Retrying in {} ms...", delay.as_millis()));
                        self.sleeper.sleep(delay);
                    }
                }
            }
        }

        Err(TransportError::RetriesExhausted {
            attempts: max_retries,
            last_error: self.last_error.clone().unwrap_or_default(),
        })
    }

    /// Base name and size of an uploadable file
    fn check_local(local_path: &Path) -> Result<(String, u64), LocalResourceError> {
        if !local_path.exists() {
            return Err(LocalResourceError::Missing {
                path: local_path.to_path_buf(),
            });
        }

        let unreadable = |reason: String| LocalResourceError::Unreadable {
            path: local_path.to_path_buf(),
            reason,
        };

        let metadata = File::open(local_path)
            .and_then(|file| file.metadata())
            .map_err(|e| unreadable(e.to_string()))?;
        if !metadata.is_file() {
            return Err(unreadable("not a regular file".to_string()));
        }

        let filename = local_path
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| unreadable("file name is not valid UTF-8".to_string()))?;

        Ok((filename.to_string(), metadata.len()))
    }

    fn attempt(&self, number: u32, request: &TransferRequest) -> TransferAttempt {
        let log = &self.log;
        let mut emit = |line: &str| log.info(&format!("server: {}", line));
        let mut lines = ResponseLines::default();

        let progress = self.progress.as_ref();
        let mut on_progress = |sent: u64, total: u64| {
            if let Some(callback) = progress {
                callback(sent, total);
            }
        };

        let result = {
            let mut on_response = |chunk: &[u8]| lines.push(chunk, &mut emit);
            let mut hooks = TransferHooks {
                response: &mut on_response,
                progress: &mut on_progress,
            };
            self.primitive.transfer(request, &mut hooks)
        };
        lines.finish(&mut emit);

        TransferAttempt {
            number,
            error: result.err(),
        }
    }
}
