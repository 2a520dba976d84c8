//! mcprobe-ping: protocol-level status queries against a game server.
//!
//! Two editions are supported behind a single [`Pinger`] capability:
//!
//! ```text
//! Pinger
//!   ├── JavaPinger     (TCP, server list ping, JSON status)
//!   └── BedrockPinger  (UDP, RakNet unconnected ping)
//! ```
//!
//! Every query opens a fresh connection and returns a [`ProbeResult`].
//! A `max_capacity` of zero is what a server reports while it is still
//! initializing; interpreting that is left to the caller.

pub mod bedrock;
pub mod error;
pub mod java;

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::str::FromStr;
use std::time::Duration;

use serde::Serialize;

pub use bedrock::BedrockPinger;
pub use error::{PingError, PingResult};
pub use java::JavaPinger;

/// Capacity and occupancy summary returned by a single ping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProbeResult {
    pub protocol_version: i32,
    pub version_label: String,
    pub max_capacity: u32,
    pub current_occupancy: u32,
}

impl ProbeResult {
    /// Whether the server accepted the query but has not finished booting.
    pub fn is_starting_up(&self) -> bool {
        self.max_capacity == 0
    }
}

/// Boxed future returned by [`Pinger`] queries.
pub type PingFuture<'a> = Pin<Box<dyn Future<Output = PingResult<ProbeResult>> + Send + 'a>>;

/// A protocol-level status query against one server.
///
/// Implementations hold their own address and timeout and are immutable
/// after construction.
pub trait Pinger: Send + Sync {
    /// Query the server, waiting as long as the transport allows.
    fn ping(&self) -> PingFuture<'_>;

    /// Query the server, failing with [`PingError::Timeout`] once the
    /// configured timeout elapses.
    fn ping_with_timeout(&self) -> PingFuture<'_>;

    /// Whether the configured timeout is the zero duration.
    fn is_timeout_zero(&self) -> bool;
}

/// Server edition, selecting the wire protocol.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Edition {
    #[default]
    Java,
    Bedrock,
}

impl fmt::Display for Edition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Edition::Java => f.write_str("java"),
            Edition::Bedrock => f.write_str("bedrock"),
        }
    }
}

impl FromStr for Edition {
    type Err = PingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "java" => Ok(Edition::Java),
            "bedrock" => Ok(Edition::Bedrock),
            other => Err(PingError::UnknownEdition(other.to_string())),
        }
    }
}

/// Build the pinger for `edition`.
pub fn new_pinger(edition: Edition, host: &str, port: u16, timeout: Duration) -> Box<dyn Pinger> {
    match edition {
        Edition::Java => Box::new(JavaPinger::new(host, port, timeout)),
        Edition::Bedrock => Box::new(BedrockPinger::new(host, port, timeout)),
    }
}
