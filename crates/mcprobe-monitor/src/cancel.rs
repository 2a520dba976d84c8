//! One-shot, process-wide cancellation.
//!
//! A [`Canceller`] fires exactly once; every [`CancellationSignal`]
//! cloned from it observes the same firing. The signal never resets.
//! [`spawn_signal_listener`] wires SIGINT and SIGTERM to a canceller.

use std::fmt;
use std::future::Future;
use std::io;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Create a linked canceller and signal, initially armed.
pub fn cancellation() -> (Canceller, CancellationSignal) {
    let (tx, rx) = watch::channel(false);
    (Canceller { tx }, CancellationSignal { rx })
}

/// Write side of the cancellation signal.
#[derive(Debug)]
pub struct Canceller {
    tx: watch::Sender<bool>,
}

impl Canceller {
    /// Fire the signal. Returns `true` only for the call that fired it.
    pub fn cancel(&self) -> bool {
        self.tx.send_if_modified(|fired| {
            if *fired {
                false
            } else {
                *fired = true;
                true
            }
        })
    }

    /// Another read handle on this canceller's signal.
    pub fn signal(&self) -> CancellationSignal {
        CancellationSignal {
            rx: self.tx.subscribe(),
        }
    }
}

/// Read side of the cancellation signal. Cheap to clone.
#[derive(Debug, Clone)]
pub struct CancellationSignal {
    rx: watch::Receiver<bool>,
}

impl CancellationSignal {
    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolve once the signal has fired.
    ///
    /// Never resolves if the canceller is dropped without firing.
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        let fired = rx.wait_for(|fired| *fired).await.is_ok();
        if !fired {
            std::future::pending::<()>().await;
        }
    }
}

/// The kind of external termination request received.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationRequest {
    /// SIGINT / Ctrl-C.
    Interrupt,
    /// SIGTERM.
    Terminate,
}

impl fmt::Display for TerminationRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TerminationRequest::Interrupt => f.write_str("SIGINT"),
            TerminationRequest::Terminate => f.write_str("SIGTERM"),
        }
    }
}

/// Fire `canceller` on the first interrupt or terminate request.
///
/// Must be called from within a tokio runtime. Handlers are installed
/// before this returns, so no request is missed once it succeeds.
pub fn spawn_signal_listener(canceller: Canceller) -> io::Result<JoinHandle<()>> {
    let requests = termination_requests()?;
    Ok(tokio::spawn(relay(canceller, requests)))
}

#[cfg(unix)]
fn termination_requests() -> io::Result<impl Future<Output = TerminationRequest> + Send + 'static> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;

    Ok(async move {
        tokio::select! {
            _ = sigterm.recv() => TerminationRequest::Terminate,
            _ = sigint.recv() => TerminationRequest::Interrupt,
        }
    })
}

#[cfg(not(unix))]
fn termination_requests() -> io::Result<impl Future<Output = TerminationRequest> + Send + 'static> {
    Ok(async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "ctrl-c handler failed, termination requests will be ignored");
            std::future::pending::<()>().await;
        }
        TerminationRequest::Interrupt
    })
}

async fn relay(canceller: Canceller, requests: impl Future<Output = TerminationRequest>) {
    let request = requests.await;
    info!(signal = %request, "received termination request, stopping");
    if !canceller.cancel() {
        warn!(signal = %request, "cancellation already fired");
    }
}
