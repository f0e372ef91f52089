//! SEEK HTTP clients
//!
//! Gateway and upload implementations of the remote traits in `seek-core`.

pub mod config;
pub mod rpc;
pub mod upload;

#[cfg(test)]
mod loopback;

pub use config::ApiConfig;
pub use rpc::HttpRpcClient;
pub use upload::HttpUploader;

use seek_core::remote::RemoteCallError;
use thiserror::Error;

/// Transport and decoding errors.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("{endpoint} answered with HTTP {status}")]
    Status { status: u16, endpoint: String },
    #[error("Invalid response: {0}")]
    Decode(String),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error(transparent)]
    Remote(RemoteCallError),
}

/// Result type for client operations.
pub type ClientResult<T> = Result<T, ClientError>;

impl ClientError {
    /// Flatten into the error type the remote traits report.
    pub fn into_remote(self, endpoint: &str) -> RemoteCallError {
        match self {
            ClientError::Remote(remote) => remote,
            other => RemoteCallError::new(endpoint, other.to_string()),
        }
    }
}
