//! Application error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    ConfigError(#[from] config::ConfigError),

    #[error("Store bootstrap error: {0}")]
    StoreBootstrap(String),

    #[error("Telemetry error: {0}")]
    TelemetryError(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_errors_convert() {
        let err: AppError = config::ConfigError::Message("bad prefix".into()).into();
        assert!(matches!(err, AppError::ConfigError(_)));
        assert_eq!(err.to_string(), "Configuration error: bad prefix");
    }
}
