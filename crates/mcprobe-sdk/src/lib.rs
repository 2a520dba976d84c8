//! mcprobe-sdk: readiness and health signals to the orchestrator.
//!
//! The game server sidecar exposes a local control plane that the
//! monitor notifies once the server is ready and on every healthy
//! probe afterwards. [`Orchestrator`] is the capability the monitor
//! depends on; [`AgonesSdk`] implements it against the sidecar's REST
//! gateway.

pub mod agones;
pub mod error;

use std::future::Future;
use std::pin::Pin;

pub use agones::AgonesSdk;
pub use error::{SdkError, SdkResult};

/// Boxed future returned by [`Orchestrator`] signals.
pub type SignalFuture<'a> = Pin<Box<dyn Future<Output = SdkResult<()>> + Send + 'a>>;

/// External control plane consuming readiness and health transitions.
///
/// Both signals are idempotent on the control plane side. Failures are
/// always returned to the caller.
pub trait Orchestrator: Send + Sync {
    /// Mark the server ready to receive traffic.
    fn ready(&self) -> SignalFuture<'_>;

    /// Report that the server is still healthy.
    fn health(&self) -> SignalFuture<'_>;
}
