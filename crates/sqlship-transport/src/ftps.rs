//! libcurl-backed transfer primitive

use std::ffi::c_long;
use std::fs::File;
use std::io::{self, Read};

use curl::easy::{Easy, ReadError};

use crate::primitive::{PrimitiveError, TransferHooks, TransferPrimitive, TransferRequest};

/// `CURLFTP_CREATE_DIR_RETRY`: create missing directories, retrying CWD once
/// after a failed MKD
const CREATE_DIR_RETRY: c_long = 2;

/// Uploads over FTP with mandatory TLS on the control and data channels.
///
/// Certificate and hostname checks follow `TransferRequest::tls_verify`; the
/// channels are encrypted either way. A server that cannot negotiate TLS is
/// refused with "Requested SSL level failed".
#[derive(Debug, Clone, Copy, Default)]
pub struct CurlTransfer;

impl CurlTransfer {
    pub fn new() -> Self {
        Self
    }

    fn configure(easy: &mut Easy, request: &TransferRequest) -> Result<(), curl::Error> {
        easy.url(&request.url)?;
        easy.username(request.credentials.username())?;
        easy.password(request.credentials.password())?;

        set_long(easy, curl_sys::CURLOPT_USE_SSL, curl_sys::CURLUSESSL_ALL as c_long)?;
        easy.ssl_verify_peer(request.tls_verify)?;
        easy.ssl_verify_host(request.tls_verify)?;

        easy.upload(true)?;
        easy.in_filesize(request.file_size)?;
        set_long(easy, curl_sys::CURLOPT_FTP_CREATE_MISSING_DIRS, CREATE_DIR_RETRY)?;

        easy.connect_timeout(request.timeout)?;
        // Abort when the transfer stalls below 1 byte/s for a whole timeout window
        easy.low_speed_limit(1)?;
        easy.low_speed_time(request.timeout)?;

        easy.verbose(request.verbose)?;
        easy.progress(true)?;
        Ok(())
    }
}

/// Set a long-valued option the safe `Easy` API does not expose
fn set_long(easy: &Easy, option: curl_sys::CURLoption, value: c_long) -> Result<(), curl::Error> {
    // SAFETY: `easy.raw()` is a live handle owned by `easy`, and `option` takes a long.
    let code = unsafe { curl_sys::curl_easy_setopt(easy.raw(), option, value) };
    if code == curl_sys::CURLE_OK {
        Ok(())
    } else {
        Err(curl::Error::new(code))
    }
}

/// Errors that mean the request itself can never work
fn is_setup_error(err: &curl::Error) -> bool {
    err.is_failed_init() || err.is_unsupported_protocol() || err.is_url_malformed()
}

impl TransferPrimitive for CurlTransfer {
    fn transfer(
        &self,
        request: &TransferRequest,
        hooks: &mut TransferHooks<'_>,
    ) -> Result<(), PrimitiveError> {
        let local_file = |e: io::Error| PrimitiveError::LocalFile {
            detail: format!("{}: {}", request.local_path.display(), e),
        };
        let mut file = File::open(&request.local_path).map_err(local_file)?;

        let init = |e: curl::Error| PrimitiveError::Init {
            detail: e.to_string(),
        };

        let mut easy = Easy::new();
        Self::configure(&mut easy, request).map_err(init)?;

        let response = &mut *hooks.response;
        let progress = &mut *hooks.progress;
        let mut read_error: Option<io::Error> = None;

        let performed = {
            let mut transfer = easy.transfer();
            transfer
                .read_function(|buf| {
                    file.read(buf).map_err(|e| {
                        read_error = Some(e);
                        ReadError::Abort
                    })
                })
                .map_err(init)?;
            // FTP control replies arrive as headers
            transfer
                .header_function(|line| {
                    response(line);
                    true
                })
                .map_err(init)?;
            transfer
                .write_function(|data| Ok(data.len()))
                .map_err(init)?;
            transfer
                .progress_function(|_dl_total, _dl_now, ul_total, ul_now| {
                    progress(ul_now as u64, ul_total as u64);
                    true
                })
                .map_err(init)?;
            transfer.perform()
        };

        if let Some(e) = read_error {
            return Err(local_file(e));
        }

        performed.map_err(|e| {
            if is_setup_error(&e) {
                init(e)
            } else {
                PrimitiveError::Transfer {
                    detail: e.to_string(),
                }
            }
        })
    }
}
