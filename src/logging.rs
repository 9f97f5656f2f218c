//! Logging - tracing subscriber setup for engine hosts
//!
//! The engine only emits `tracing` events; a host installs the subscriber
//! once at startup via [`init_logging`]. The per-event debug lines from
//! the hot-path modules (engine dispatch, sharded stats, window counters)
//! are a flood at production event rates, so their targets are clamped to
//! `warn` unless [`LogConfig::trace_hot_path`] is set.

use crate::config::LogConfig;
use crate::error::ConfigError;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Targets that log per event; clamped unless `trace_hot_path` is set.
const HOT_PATH_CLAMP: &str =
    "riskgate::engine=warn,riskgate::sharded=warn,riskgate::window=warn,riskgate::batch=warn";

fn filter_directives(config: &LogConfig) -> String {
    if config.trace_hot_path {
        config.log_level.clone()
    } else {
        format!("{},{}", config.log_level, HOT_PATH_CLAMP)
    }
}

fn build_filter(config: &LogConfig) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter_directives(config)))
}

/// Install the global subscriber.
///
/// Returns the non-blocking writer guard when file logging is enabled
/// (`log_dir` non-empty); keep it alive for the process lifetime or
/// buffered lines are lost on exit. An empty `log_dir` logs to stdout
/// only and returns no guard. A second call fails with
/// [`ConfigError::Logging`] instead of panicking.
pub fn init_logging(config: &LogConfig) -> Result<Option<WorkerGuard>, ConfigError> {
    let registry = tracing_subscriber::registry().with(build_filter(config));

    if config.log_dir.is_empty() {
        registry
            .with(fmt::layer().with_target(false).with_ansi(true))
            .try_init()
            .map_err(|e| ConfigError::Logging(e.to_string()))?;
        return Ok(None);
    }

    let file_appender = match config.rotation.as_str() {
        "hourly" => tracing_appender::rolling::hourly(&config.log_dir, &config.log_file),
        "daily" => tracing_appender::rolling::daily(&config.log_dir, &config.log_file),
        _ => tracing_appender::rolling::never(&config.log_dir, &config.log_file),
    };
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let result = if config.use_json {
        registry
            .with(
                fmt::layer()
                    .json()
                    .with_target(true) // Keep target in JSON for structured queries
                    .with_writer(non_blocking)
                    .with_ansi(false),
            )
            .try_init()
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_writer(non_blocking)
                    .with_ansi(false),
            )
            .with(fmt::layer().with_target(false).with_ansi(true))
            .try_init()
    };
    result.map_err(|e| ConfigError::Logging(e.to_string()))?;
    Ok(Some(guard))
}
