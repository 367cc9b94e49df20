//! # sqlship Transport
//!
//! Uploads snapshot artifacts to an FTP endpoint with mandatory TLS on both
//! channels. [`TransportClient`] owns the retry and backoff policy and reports
//! byte progress; the network operation itself sits behind the
//! [`TransferPrimitive`] trait, implemented by [`CurlTransfer`] in production
//! and, with the `testing` feature, by the scripted `StubTransfer`.

pub mod backoff;
pub mod client;
pub mod ftps;
pub mod primitive;
#[cfg(any(test, feature = "testing"))]
pub mod stub;
pub mod url;

pub use backoff::{backoff_delay, total_backoff};
pub use client::{ProgressCallback, TransferAttempt, TransportClient, UploadReport};
pub use ftps::CurlTransfer;
pub use primitive::{PrimitiveError, TransferHooks, TransferPrimitive, TransferRequest};
#[cfg(any(test, feature = "testing"))]
pub use stub::{StubOutcome, StubTransfer};
pub use url::{build_url, clean_directory};
