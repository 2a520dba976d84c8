//! Error types for server pings.

use std::time::Duration;

use thiserror::Error;

/// Result type alias for ping operations.
pub type PingResult<T> = Result<T, PingError>;

/// Errors that can occur while querying a server.
#[derive(Debug, Error)]
pub enum PingError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("ping timed out after {0:?}")]
    Timeout(Duration),

    #[error("malformed response: {0}")]
    Malformed(String),

    #[error("could not resolve address: {0}")]
    Resolve(String),

    #[error("unknown server edition: {0}")]
    UnknownEdition(String),
}
