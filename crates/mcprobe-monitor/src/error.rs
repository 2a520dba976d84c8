//! Errors from a single probe-and-report operation.

use thiserror::Error;

use mcprobe_ping::PingError;
use mcprobe_sdk::SdkError;

/// Why one probe-and-report attempt failed.
#[derive(Debug, Error)]
pub enum ProbeError {
    /// A zero timeout on the timed path is a misconfiguration.
    #[error("ping timeout is set to 0s")]
    ZeroTimeout,

    /// The server answered but reported zero capacity.
    #[error("server starting up")]
    StartingUp,

    #[error("ping failed: {0}")]
    Ping(#[from] PingError),

    #[error("orchestrator signal failed: {0}")]
    Signal(#[from] SdkError),
}

impl ProbeError {
    pub fn is_starting_up(&self) -> bool {
        matches!(self, ProbeError::StartingUp)
    }
}
