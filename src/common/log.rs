//! Logging setup built on `tracing`.
//!
//! `RUST_LOG` takes precedence over the configured level. Only the first call installs;
//! later calls return the outcome of that first attempt.

use std::sync::OnceLock;

use tracing_subscriber::{fmt, prelude::*, EnvFilter, Registry};

use crate::common::error::{RetroError, RetroResult};

static INSTALLED: OnceLock<Result<(), String>> = OnceLock::new();

/// Install the global subscriber with `level` as the fallback filter.
pub fn init(level: &str) -> RetroResult<()> {
    INSTALLED
        .get_or_init(|| {
            let subscriber = Registry::default()
                .with(build_env_filter(level))
                .with(fmt::layer().with_target(true).with_writer(std::io::stderr));
            tracing::subscriber::set_global_default(subscriber).map_err(|err| err.to_string())?;
            tracing::debug!(level, "logging initialised");
            Ok(())
        })
        .clone()
        .map_err(|err| RetroError::Internal(format!("tracing subscriber: {err}")))
}

fn build_env_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}
