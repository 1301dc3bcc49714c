//! Setup and initialization functions for the CLI
//!
//! Installs the tracing subscriber and merges command-line overrides into
//! the loaded configuration.

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use crate::config::ShellConfig;
use crate::errors::{Result, ShellError};

/// Environment variable holding a log filter; takes precedence over `RUST_LOG`
pub const LOG_ENV: &str = "PIPESHELL_LOG";

/// Filter directive used when no environment variable sets one
pub fn default_directive(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}

/// Pure function to pick the log filter from the environment or the `-v` count
pub fn build_filter(verbosity: u8) -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV)
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new(default_directive(verbosity)))
}

/// Install a stderr subscriber once at startup. `log` records from the
/// config loader are forwarded to it as well.
pub fn init_logging(verbosity: u8) {
    let result = tracing_subscriber::registry()
        .with(build_filter(verbosity))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init();

    if let Err(e) = result {
        // Already installed (tests, embedding applications)
        tracing::debug!("Logging already configured: {}", e);
    }
}

/// Apply `--execution-limit` on top of the loaded configuration
pub fn apply_overrides(mut config: ShellConfig, execution_limit: Option<u32>) -> Result<ShellConfig> {
    if let Some(limit) = execution_limit {
        config.engine.execution_limit = limit;
    }
    config.validate().map_err(ShellError::config)?;
    Ok(config)
}
