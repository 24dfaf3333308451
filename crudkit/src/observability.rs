//! Structured logging setup

use tracing_subscriber::EnvFilter;

use crate::{config::Config, error::Result};

/// Install a JSON `tracing` subscriber filtered by `service.log_level`
///
/// An unparseable level falls back to `info`. Calling this again after a
/// subscriber is installed is a no-op.
pub fn init_tracing(config: &Config) -> Result<()> {
    let filter = env_filter(&config.service.log_level);

    match tracing_subscriber::fmt().json().with_env_filter(filter).try_init() {
        Ok(()) => {
            tracing::info!("Tracing initialized for service: {}", config.service.name);
        }
        Err(_) => {
            tracing::debug!("Tracing subscriber already installed");
        }
    }

    Ok(())
}

fn env_filter(level: &str) -> EnvFilter {
    EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"))
}
