//! Tracing subscriber setup.

use tracing_subscriber::EnvFilter;

use crate::config::Environment;

/// Filter used when `RUST_LOG` is unset or invalid.
const DEFAULT_FILTER: &str = "info,mcprobe=debug";

/// Install the global subscriber: pretty output in development, JSON
/// lines in production.
pub fn init(environment: Environment) -> anyhow::Result<()> {
    let filter =
        EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(DEFAULT_FILTER))?;

    let installed = match environment {
        Environment::Development => tracing_subscriber::fmt().with_env_filter(filter).try_init(),
        Environment::Production => tracing_subscriber::fmt()
            .json()
            .with_current_span(false)
            .with_env_filter(filter)
            .try_init(),
    };

    installed.map_err(|e| anyhow::anyhow!("failed to install tracing subscriber: {e}"))
}
