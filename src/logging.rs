//! `tracing` subscriber setup for binaries
//!
//! The library itself only emits events, installing a subscriber is up to the application.

use std::io;

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Registry};

use crate::config::LoggingOptions;
use crate::error::{Error, Result};

/// Installs the global subscriber, later calls are ignored
///
/// `WGCAM_LOG` takes precedence over the configured level.
pub fn init(options: &LoggingOptions) -> Result<()> {
    if tracing::dispatcher::has_been_set() {
        return Ok(());
    }

    let level = std::env::var("WGCAM_LOG").unwrap_or_else(|_| options.level.clone());
    let filter = EnvFilter::try_new(level.as_str())
        .map_err(|e| Error::Config(format!("invalid log level '{}': {}", level, e)))?;

    Registry::default()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(io::stderr)
                .with_ansi(options.color)
                .with_target(true),
        )
        .try_init()
        .map_err(|e| Error::Config(format!("cannot install tracing subscriber: {}", e)))
}
