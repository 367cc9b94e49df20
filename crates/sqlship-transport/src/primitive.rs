//! Pluggable network file-transfer operation beneath the client

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use sqlship_core::config::Credentials;

/// Everything one upload attempt needs
#[derive(Debug, Clone)]
pub struct TransferRequest {
    pub url: String,
    pub local_path: PathBuf,
    pub file_size: u64,
    pub credentials: Credentials,
    pub timeout: Duration,
    pub tls_verify: bool,
    pub verbose: bool,
}

/// Callbacks invoked by the primitive while an attempt runs
pub struct TransferHooks<'a> {
    /// Raw server response bytes, in arbitrary chunks
    pub response: &'a mut dyn FnMut(&[u8]),
    /// `(bytes_sent, total_bytes)`
    pub progress: &'a mut dyn FnMut(u64, u64),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PrimitiveError {
    /// The transfer could not be set up at all
    #[error("{detail}")]
    Init { detail: String },

    /// The local file could not be read
    #[error("{detail}")]
    LocalFile { detail: String },

    /// Network, protocol or authentication failure
    #[error("{detail}")]
    Transfer { detail: String },
}

impl PrimitiveError {
    pub fn detail(&self) -> &str {
        match self {
            PrimitiveError::Init { detail }
            | PrimitiveError::LocalFile { detail }
            | PrimitiveError::Transfer { detail } => detail,
        }
    }
}

/// Uploads one local file to one URL. Implementations perform a single
/// attempt; retries belong to the caller.
pub trait TransferPrimitive: Send + Sync {
    fn transfer(
        &self,
        request: &TransferRequest,
        hooks: &mut TransferHooks<'_>,
    ) -> Result<(), PrimitiveError>;
}
