//! Error types for orchestrator signals.

use std::time::Duration;

use thiserror::Error;

/// Result type alias for orchestrator signals.
pub type SdkResult<T> = Result<T, SdkError>;

/// Errors that can occur while signalling the orchestrator.
#[derive(Debug, Error)]
pub enum SdkError {
    #[error("failed to connect to sdk server: {0}")]
    Connect(#[source] std::io::Error),

    #[error("http error: {0}")]
    Http(#[from] hyper::Error),

    #[error("invalid request: {0}")]
    Request(#[from] http::Error),

    #[error("sdk server answered {path} with {status}")]
    Status {
        path: &'static str,
        status: http::StatusCode,
    },

    #[error("sdk request timed out after {0:?}")]
    Timeout(Duration),
}
