use crate::config::ConfigError;
use crate::report::ReportError;
use thiserror::Error;

/// Failures that end a run. Marketplace and rate errors are logged and
/// absorbed by the collector, so they never reach this level.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("Report error: {0}")]
    Report(#[from] ReportError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_app_error_wraps_layers() {
        let err: AppError = ConfigError::MissingEnv("SALES_START".to_string()).into();
        assert_eq!(
            err.to_string(),
            "Configuration error: Missing required environment variable: SALES_START"
        );

        let io = std::io::Error::new(std::io::ErrorKind::Other, "disk full");
        let err: AppError = ReportError::Io(io).into();
        assert_eq!(err.to_string(), "Report error: io error: disk full");
    }
}
