//! `mcprobed ping`: one status query, printed as JSON.

use std::process::ExitCode;

use anyhow::{bail, Context};
use tracing::debug;

use mcprobe_ping::new_pinger;

use crate::config::PingArgs;

pub async fn run(args: PingArgs) -> anyhow::Result<ExitCode> {
    let server = &args.server;
    let pinger = new_pinger(
        server.edition,
        &server.host,
        server.port,
        args.timeout.unwrap_or_default(),
    );

    let result = match args.timeout {
        Some(timeout) if timeout.is_zero() => bail!("ping timeout is set to 0s"),
        Some(_) => pinger.ping_with_timeout().await,
        None => pinger.ping().await,
    }
    .with_context(|| format!("failed to ping {}:{}", server.host, server.port))?;

    debug!(edition = %server.edition, starting_up = result.is_starting_up(), "ping succeeded");
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(ExitCode::SUCCESS)
}
