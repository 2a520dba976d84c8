//! Lifecycle controller: startup detection, then health monitoring.
//!
//! ```text
//! Initializing ──► AwaitingStartup ──► Ready ──► MonitoringHealth
//!      │                │   ▲                          │
//!      │                └───┘ starting up              │
//!      └────────────────┴─────────────┬────────────────┘
//!                                     ▼
//!                             Failed | Stopped
//! ```
//!
//! Every phase is a sequence of [`retry_with_backoff`] calls, each with a
//! fresh budget. A server reporting zero capacity keeps the controller in
//! `AwaitingStartup` indefinitely; only hard failures exhaust a budget
//! into `Failed`. Cancellation is observed at every wait and at the top
//! of each loop iteration, and always ends in `Stopped`.

use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use mcprobe_ping::{Pinger, ProbeResult};
use mcprobe_sdk::Orchestrator;

use crate::cancel::CancellationSignal;
use crate::error::ProbeError;
use crate::retry::{retry_with_backoff, sleep_or_cancel, RetryError, RetryPolicy, Wake};

/// State of the monitored server as seen by the controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleState {
    Initializing,
    AwaitingStartup,
    Ready,
    MonitoringHealth,
    /// Terminal; carries the causal error message.
    Failed(String),
    /// Terminal; shutdown was requested externally.
    Stopped,
}

impl LifecycleState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, LifecycleState::Failed(_) | LifecycleState::Stopped)
    }
}

/// How a monitor run ended.
#[derive(Debug)]
pub enum Outcome {
    Stopped,
    Failed(ProbeError),
}

impl Outcome {
    /// Process exit status for this outcome.
    pub fn exit_code(&self) -> u8 {
        match self {
            Outcome::Stopped => 0,
            Outcome::Failed(_) => 1,
        }
    }
}

/// Timing configuration for a monitor run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonitorConfig {
    /// Attempt budget and interval for every probe cycle.
    pub policy: RetryPolicy,
    /// Grace period before the first probe.
    pub initial_delay: Duration,
}

/// Drives one server through its lifecycle.
pub struct Monitor {
    pinger: Box<dyn Pinger>,
    orchestrator: Box<dyn Orchestrator>,
    config: MonitorConfig,
    cancel: CancellationSignal,
    state: watch::Sender<LifecycleState>,
}

impl Monitor {
    pub fn new(
        pinger: Box<dyn Pinger>,
        orchestrator: Box<dyn Orchestrator>,
        config: MonitorConfig,
        cancel: CancellationSignal,
    ) -> Self {
        let (state, _) = watch::channel(LifecycleState::Initializing);
        Self {
            pinger,
            orchestrator,
            config,
            cancel,
            state,
        }
    }

    /// Watch lifecycle transitions.
    pub fn subscribe(&self) -> watch::Receiver<LifecycleState> {
        self.state.subscribe()
    }

    /// Run until the server fails or cancellation fires.
    pub async fn run(self) -> Outcome {
        info!(initial_delay = ?self.config.initial_delay, "starting up");
        if sleep_or_cancel(self.config.initial_delay, &self.cancel).await == Wake::Cancelled {
            return self.conclude(RetryError::Stopped);
        }

        self.transition(LifecycleState::AwaitingStartup);
        if let Err(e) = self.await_startup().await {
            return self.conclude(e);
        }

        info!("server ready");
        self.transition(LifecycleState::Ready);
        self.transition(LifecycleState::MonitoringHealth);

        let err = self.monitor_health().await;
        self.conclude(err)
    }

    /// Probe until the server reports non-zero capacity and the
    /// orchestrator accepts the ready signal.
    async fn await_startup(&self) -> Result<(), RetryError<ProbeError>> {
        let policy = self.config.policy;
        loop {
            if self.cancel.is_cancelled() {
                return Err(RetryError::Stopped);
            }

            match retry_with_backoff(policy, &self.cancel, || self.ready_probe()).await {
                Ok(()) => return Ok(()),
                Err(RetryError::Exhausted(e)) if e.is_starting_up() => {
                    warn!(attempts = policy.attempts, error = %e, "server still starting");
                }
                Err(e) => return Err(e),
            }

            self.pause().await?;
        }
    }

    /// Probe and report health until a cycle exhausts its budget or
    /// cancellation fires. Never returns success.
    async fn monitor_health(&self) -> RetryError<ProbeError> {
        let policy = self.config.policy;
        loop {
            if let Err(e) = self.pause().await {
                return e;
            }
            if self.cancel.is_cancelled() {
                return RetryError::Stopped;
            }

            if let Err(e) = retry_with_backoff(policy, &self.cancel, || self.health_probe()).await {
                return e;
            }
            info!("server healthy");
        }
    }

    async fn ready_probe(&self) -> Result<(), ProbeError> {
        let result = self.timed_ping().await?;
        if result.is_starting_up() {
            return Err(ProbeError::StartingUp);
        }
        self.orchestrator.ready().await?;
        Ok(())
    }

    async fn health_probe(&self) -> Result<(), ProbeError> {
        self.timed_ping().await?;
        self.orchestrator.health().await?;
        Ok(())
    }

    async fn timed_ping(&self) -> Result<ProbeResult, ProbeError> {
        if self.pinger.is_timeout_zero() {
            return Err(ProbeError::ZeroTimeout);
        }
        let result = self.pinger.ping_with_timeout().await?;
        debug!(
            version = %result.version_label,
            protocol = result.protocol_version,
            online = result.current_occupancy,
            max = result.max_capacity,
            "ping succeeded"
        );
        Ok(result)
    }

    /// Wait one interval, racing cancellation.
    async fn pause(&self) -> Result<(), RetryError<ProbeError>> {
        match sleep_or_cancel(self.config.policy.interval, &self.cancel).await {
            Wake::Elapsed => Ok(()),
            Wake::Cancelled => Err(RetryError::Stopped),
        }
    }

    fn transition(&self, next: LifecycleState) {
        let from = self.state.send_replace(next.clone());
        debug!(?from, to = ?next, "lifecycle transition");
    }

    fn conclude(&self, err: RetryError<ProbeError>) -> Outcome {
        match err {
            RetryError::Stopped => {
                info!("monitor stopped");
                self.transition(LifecycleState::Stopped);
                Outcome::Stopped
            }
            RetryError::Exhausted(e) => {
                error!(error = %e, "server failed");
                self.transition(LifecycleState::Failed(e.to_string()));
                Outcome::Failed(e)
            }
        }
    }
}
