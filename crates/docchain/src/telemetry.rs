//! Tracing subscriber setup.
//!
//! Installs a `tracing-subscriber` registry with an `EnvFilter` and a pretty
//! or JSON `fmt` layer, and bridges `log` records into it so that the worker
//! pool and database lifecycle messages end up in the same stream as the
//! pipeline spans.

use thiserror::Error;
use tracing::Subscriber;
use tracing_log::LogTracer;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{fmt, EnvFilter, Registry};

use crate::config::LogFormat;

#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("Invalid log filter '{filter}': {reason}")]
    InvalidFilter { filter: String, reason: String },

    #[error("A global tracing subscriber is already installed: {0}")]
    AlreadyInstalled(String),
}

/// Installs the global subscriber.
///
/// `RUST_LOG` overrides `level` when set. Calling this a second time returns
/// `TelemetryError::AlreadyInstalled` and leaves the first subscriber active.
pub fn init_tracing(level: &str, format: LogFormat) -> Result<(), TelemetryError> {
    let filter = build_filter(level)?;
    let registry = Registry::default().with(filter);

    match format {
        LogFormat::Pretty => install(registry.with(fmt::layer().with_target(false))),
        LogFormat::Json => install(registry.with(fmt::layer().json().with_current_span(true))),
    }
}

fn install<S>(subscriber: S) -> Result<(), TelemetryError>
where
    S: Subscriber + Send + Sync + 'static,
{
    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| TelemetryError::AlreadyInstalled(e.to_string()))?;
    LogTracer::init().map_err(|e| TelemetryError::AlreadyInstalled(e.to_string()))
}

fn build_filter(level: &str) -> Result<EnvFilter, TelemetryError> {
    if let Ok(from_env) = EnvFilter::try_from_default_env() {
        return Ok(from_env);
    }
    EnvFilter::try_new(level).map_err(|e| TelemetryError::InvalidFilter {
        filter: level.to_string(),
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_filter_accepts_levels_and_directives() {
        if std::env::var("RUST_LOG").is_ok() {
            return;
        }
        assert!(build_filter("info").is_ok());
        assert!(build_filter("docchain=debug,warn").is_ok());
    }

    #[test]
    fn test_second_install_is_reported() {
        let first = init_tracing("warn", LogFormat::Pretty);
        let second = init_tracing("warn", LogFormat::Json);
        assert!(first.is_ok() || matches!(first, Err(TelemetryError::AlreadyInstalled(_))));
        assert!(matches!(second, Err(TelemetryError::AlreadyInstalled(_))));
    }
}
