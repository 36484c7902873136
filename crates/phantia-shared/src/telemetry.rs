//! Telemetry setup

use tracing::level_filters::LevelFilter;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use crate::config::AppSettings;
use crate::error::AppError;

/// Keeps the background log writers alive; drop only at process exit.
pub struct TelemetryGuard {
    _guards: Vec<WorkerGuard>,
}

/// Install the global subscriber: console output plus `combined.log`
/// (every level) and `error.log` (errors only) under `app.log_dir`.
///
/// `RUST_LOG` wins over `LOG_LEVEL`; both fall back to `info`.
pub fn init_telemetry(app: &AppSettings) -> Result<TelemetryGuard, AppError> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".into())))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    std::fs::create_dir_all(&app.log_dir)
        .map_err(|e| AppError::TelemetryError(format!("cannot create {}: {}", app.log_dir, e)))?;

    let (combined, combined_guard) =
        tracing_appender::non_blocking(tracing_appender::rolling::never(&app.log_dir, "combined.log"));
    let (errors, errors_guard) =
        tracing_appender::non_blocking(tracing_appender::rolling::never(&app.log_dir, "error.log"));

    let console = if app.is_production() {
        fmt::layer().json().with_target(true).boxed()
    } else {
        fmt::layer().with_target(true).boxed()
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console)
        .with(fmt::layer().json().with_writer(combined))
        .with(
            fmt::layer()
                .json()
                .with_writer(errors)
                .with_filter(LevelFilter::ERROR),
        )
        .try_init()
        .map_err(|e| AppError::TelemetryError(e.to_string()))?;

    Ok(TelemetryGuard {
        _guards: vec![combined_guard, errors_guard],
    })
}
