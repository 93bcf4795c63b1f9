//! Structured logging setup.
//!
//! Every engine crate logs through `tracing`; this module installs the
//! global `tracing-subscriber` that renders those events. `RUST_LOG`, when
//! set, takes precedence over the configured level.

use tracing_subscriber::EnvFilter;

use crate::config::LoggingConfig;
use crate::error::LoggingError;

/// Build the filter: `RUST_LOG` if set, otherwise the configured level.
pub fn build_filter(config: &LoggingConfig) -> Result<EnvFilter, LoggingError> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    EnvFilter::try_new(&config.level).map_err(|err| LoggingError::Filter {
        filter: config.level.clone(),
        reason: err.to_string(),
    })
}

/// Install the global subscriber.
///
/// Fails if the level is not a valid directive or a subscriber is already
/// installed.
pub fn init_logging(config: &LoggingConfig) -> Result<(), LoggingError> {
    let filter = build_filter(config)?;
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);
    let installed = if config.json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    installed.map_err(|err| LoggingError::Install {
        reason: err.to_string(),
    })
}
