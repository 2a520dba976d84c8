//! mcprobe-monitor: lifecycle of a monitored game server.
//!
//! Drives a server through startup detection and then continuous health
//! monitoring, reporting each transition to the orchestrator.
//!
//! # Architecture
//!
//! ```text
//! Monitor (lifecycle state machine)
//!   ├── retry_with_backoff()  bounded attempts, fixed interval
//!   │   ├── Pinger::ping_with_timeout() → ProbeResult
//!   │   └── Orchestrator::ready() / health()
//!   └── CancellationSignal ← Canceller ← SIGINT / SIGTERM listener
//! ```
//!
//! # Retry budget
//!
//! Each call to [`retry_with_backoff`] starts from the full budget.
//! A server that alternates failures and successes never exhausts it;
//! only `attempts` consecutive failures inside one call do.

pub mod cancel;
pub mod error;
pub mod lifecycle;
pub mod retry;

pub use cancel::{cancellation, spawn_signal_listener, CancellationSignal, Canceller, TerminationRequest};
pub use error::ProbeError;
pub use lifecycle::{LifecycleState, Monitor, MonitorConfig, Outcome};
pub use retry::{retry_with_backoff, sleep_or_cancel, RetryError, RetryPolicy, Wake};
