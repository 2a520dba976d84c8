//! `mcprobed monitor`: full lifecycle against the Agones sidecar.

use std::process::ExitCode;

use anyhow::Context;
use tracing::{info, warn};

use mcprobe_monitor::{cancellation, spawn_signal_listener, Monitor};
use mcprobe_ping::new_pinger;
use mcprobe_sdk::AgonesSdk;

use crate::config::MonitorArgs;

pub async fn run(args: MonitorArgs) -> anyhow::Result<ExitCode> {
    let (canceller, cancel) = cancellation();
    let _listener =
        spawn_signal_listener(canceller).context("failed to install termination handlers")?;

    if args.timeout.is_zero() {
        warn!("ping timeout is zero, every timed ping will fail");
    }

    let server = &args.server;
    let pinger = new_pinger(server.edition, &server.host, server.port, args.timeout);
    let sdk = AgonesSdk::localhost(args.sdk_port);

    info!(
        edition = %server.edition,
        host = %server.host,
        port = server.port,
        interval = ?args.interval,
        attempts = args.max_attempts,
        timeout = ?args.timeout,
        sdk = %sdk.address(),
        "monitor configured"
    );

    let monitor = Monitor::new(pinger, Box::new(sdk), args.monitor_config(), cancel);
    let outcome = monitor.run().await;

    Ok(ExitCode::from(outcome.exit_code()))
}
