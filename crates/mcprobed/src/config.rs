//! Command-line and environment configuration.
//!
//! Every option can come from a flag or from the environment variable
//! named on it; flags win.

use std::time::Duration;

use clap::{Args, ValueEnum};

use mcprobe_monitor::{MonitorConfig, RetryPolicy};
use mcprobe_ping::Edition;
use mcprobe_sdk::agones::{DEFAULT_HTTP_PORT, HTTP_PORT_ENV};

/// Deployment environment, selecting the log format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum Environment {
    #[default]
    Development,
    Production,
}

/// Where the game server listens.
#[derive(Debug, Clone, Args)]
pub struct ServerArgs {
    /// Game server host.
    #[arg(long, env = "HOST", default_value = "localhost")]
    pub host: String,

    /// Game server port.
    #[arg(long, env = "PORT", default_value_t = 25565)]
    pub port: u16,

    /// Server edition: java or bedrock.
    #[arg(long, env = "EDITION", default_value = "java")]
    pub edition: Edition,
}

#[derive(Debug, Clone, Args)]
pub struct MonitorArgs {
    #[command(flatten)]
    pub server: ServerArgs,

    /// Wait between pings, and between retries of a failed ping.
    #[arg(long, env = "INTERVAL", default_value = "10s", value_parser = parse_duration)]
    pub interval: Duration,

    /// Consecutive failed attempts tolerated per probe cycle.
    #[arg(long, env = "MAX_ATTEMPTS", default_value_t = 5)]
    pub max_attempts: u32,

    /// Timeout for each ping.
    #[arg(long, env = "TIMEOUT", default_value = "10s", value_parser = parse_duration)]
    pub timeout: Duration,

    /// Grace period before the first ping.
    #[arg(long, env = "INITIAL_DELAY", default_value = "30s", value_parser = parse_duration)]
    pub initial_delay: Duration,

    /// Port of the Agones SDK REST gateway on localhost.
    #[arg(long, env = HTTP_PORT_ENV, default_value_t = DEFAULT_HTTP_PORT)]
    pub sdk_port: u16,
}

impl MonitorArgs {
    pub fn monitor_config(&self) -> MonitorConfig {
        MonitorConfig {
            policy: RetryPolicy::new(self.max_attempts, self.interval),
            initial_delay: self.initial_delay,
        }
    }
}

#[derive(Debug, Clone, Args)]
pub struct PingArgs {
    #[command(flatten)]
    pub server: ServerArgs,

    /// Fail if the server has not answered within this duration.
    #[arg(long, value_parser = parse_duration)]
    pub timeout: Option<Duration>,
}

/// Parse a duration such as `500ms`, `10s`, `1m30s` or `1.5h`.
///
/// Units are `ns`, `us`, `ms`, `s`, `m` and `h`. A bare number is seconds.
pub fn parse_duration(s: &str) -> Result<Duration, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("empty duration".to_string());
    }
    if let Ok(secs) = s.parse::<u64>() {
        return Ok(Duration::from_secs(secs));
    }

    let mut total: u128 = 0;
    let mut rest = s;
    while !rest.is_empty() {
        let num_len = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .ok_or_else(|| format!("missing unit in duration {s:?}"))?;
        let (num, tail) = rest.split_at(num_len);
        let unit_len = tail
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(tail.len());
        let (unit, tail) = tail.split_at(unit_len);

        let unit_nanos: u128 = match unit {
            "ns" => 1,
            "us" | "µs" => 1_000,
            "ms" => 1_000_000,
            "s" => 1_000_000_000,
            "m" => 60 * 1_000_000_000,
            "h" => 3_600 * 1_000_000_000,
            other => return Err(format!("unknown unit {other:?} in duration {s:?}")),
        };
        let nanos = segment_nanos(num, unit_nanos)
            .ok_or_else(|| format!("invalid number {num:?} in duration {s:?}"))?;
        total = total
            .checked_add(nanos)
            .ok_or_else(|| format!("duration {s:?} overflows"))?;
        rest = tail;
    }

    let secs = u64::try_from(total / 1_000_000_000).map_err(|_| format!("duration {s:?} overflows"))?;
    Ok(Duration::new(secs, (total % 1_000_000_000) as u32))
}

/// Nanoseconds in `num` units of `unit_nanos`; `num` may carry a fraction.
fn segment_nanos(num: &str, unit_nanos: u128) -> Option<u128> {
    let (whole, frac) = num.split_once('.').unwrap_or((num, ""));
    if whole.is_empty() && frac.is_empty() {
        return None;
    }

    let whole: u128 = if whole.is_empty() { 0 } else { whole.parse().ok()? };
    let mut nanos = whole.checked_mul(unit_nanos)?;

    if !frac.is_empty() {
        let frac = &frac[..frac.len().min(18)];
        let scale = 10u128.pow(frac.len() as u32);
        let frac: u128 = frac.parse().ok()?;
        nanos = nanos.checked_add(frac * unit_nanos / scale)?;
    }
    Some(nanos)
}
