//! mcprobed: readiness and health monitor for a game server.
//!
//! Runs beside the game server in the same pod, pings it, and reports
//! `Ready` and `Health` to the Agones SDK sidecar.
//!
//! # Usage
//!
//! ```text
//! mcprobed monitor --host localhost --port 25565 --edition java
//! mcprobed ping --edition bedrock --port 19132 --timeout 5s
//! ```
//!
//! Every option also reads from the environment (`HOST`, `PORT`,
//! `EDITION`, `INTERVAL`, `MAX_ATTEMPTS`, `TIMEOUT`, `INITIAL_DELAY`,
//! `ENVIRONMENT`, `AGONES_SDK_HTTP_PORT`).

use std::process::ExitCode;

use clap::{Parser, Subcommand};

mod commands;
mod config;
mod logging;

use config::{Environment, MonitorArgs, PingArgs};

#[derive(Parser)]
#[command(
    name = "mcprobed",
    about = "Game server readiness and health monitor",
    version,
    propagate_version = true
)]
struct Cli {
    /// Log format: development (human-readable) or production (JSON).
    #[arg(
        long,
        env = "ENVIRONMENT",
        value_enum,
        default_value_t = Environment::Development,
        global = true
    )]
    environment: Environment,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Ping the server until it is ready, then report health until it fails.
    Monitor(MonitorArgs),
    /// Ping the server once and print its status as JSON.
    Ping(PingArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    logging::init(cli.environment)?;

    match cli.command {
        Command::Monitor(args) => commands::monitor::run(args).await,
        Command::Ping(args) => commands::ping::run(args).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use mcprobe_ping::Edition;
    use std::time::Duration;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_monitor_subcommand() {
        let cli = Cli::try_parse_from([
            "mcprobed",
            "--environment",
            "production",
            "monitor",
            "--host",
            "mc.internal",
            "--port",
            "25566",
            "--edition",
            "bedrock",
            "--interval",
            "5s",
            "--max-attempts",
            "3",
            "--timeout",
            "2s",
            "--initial-delay",
            "1m",
            "--sdk-port",
            "9999",
        ])
        .unwrap();

        assert_eq!(cli.environment, Environment::Production);
        let Command::Monitor(args) = cli.command else {
            panic!("expected monitor subcommand");
        };
        assert_eq!(args.server.host, "mc.internal");
        assert_eq!(args.server.port, 25566);
        assert_eq!(args.server.edition, Edition::Bedrock);
        assert_eq!(args.interval, Duration::from_secs(5));
        assert_eq!(args.max_attempts, 3);
        assert_eq!(args.timeout, Duration::from_secs(2));
        assert_eq!(args.initial_delay, Duration::from_secs(60));
        assert_eq!(args.sdk_port, 9999);
    }

    #[test]
    fn environment_flag_is_global() {
        let cli = Cli::try_parse_from([
            "mcprobed",
            "ping",
            "--host",
            "127.0.0.1",
            "--environment",
            "production",
        ])
        .unwrap();
        assert_eq!(cli.environment, Environment::Production);
        assert!(matches!(cli.command, Command::Ping(_)));
    }

    #[test]
    fn rejects_unknown_edition() {
        let result = Cli::try_parse_from(["mcprobed", "monitor", "--edition", "pocket"]);
        assert!(result.is_err());
    }

    #[test]
    fn rejects_malformed_duration() {
        let result = Cli::try_parse_from(["mcprobed", "monitor", "--interval", "ten seconds"]);
        assert!(result.is_err());
    }
}
