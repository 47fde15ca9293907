//! Tracing subscriber setup for binaries embedding the core.

use crate::config::LoggingConfig;
use tracing_subscriber::{
    layer::SubscriberExt,
    util::{SubscriberInitExt, TryInitError},
    EnvFilter,
};

/// Filter used when `RUST_LOG` is not set.
fn default_filter(level: &str) -> EnvFilter {
    EnvFilter::try_new(format!("warn,relay_core={level}"))
        .unwrap_or_else(|_| EnvFilter::new("warn,relay_core=info"))
}

/// Builds the filter: `RUST_LOG` wins, with `debug`/`trace` shorthands scoped to this crate.
#[must_use]
pub fn build_filter(config: &LoggingConfig) -> EnvFilter {
    match std::env::var("RUST_LOG") {
        Ok(level) if level == "debug" || level == "trace" => default_filter(&level),
        Ok(_) => EnvFilter::try_from_env("RUST_LOG").unwrap_or_else(|_| default_filter("debug")),
        Err(_) => default_filter(&config.level),
    }
}

/// Installs the global subscriber with a `json` or `pretty` formatter.
///
/// # Errors
///
/// Fails if a global subscriber is already installed.
pub fn init_logging(config: &LoggingConfig) -> Result<(), TryInitError> {
    let registry = tracing_subscriber::registry().with(build_filter(config));

    if config.format.as_str() == "json" {
        registry.with(tracing_subscriber::fmt::layer().json()).try_init()
    } else {
        // "pretty" and any other format default to pretty logging
        let fmt_layer = tracing_subscriber::fmt::layer()
            .pretty()
            .with_file(true)
            .with_line_number(true)
            .with_target(false);
        registry.with(fmt_layer).try_init()
    }
}
