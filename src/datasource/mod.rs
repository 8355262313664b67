//! Marketplace source abstraction for fetching normalized trade history.

use crate::domain::{TimeMs, Transaction};
use async_trait::async_trait;
use std::fmt;

pub mod buffmarket;
pub mod csfloat;
pub mod csmoney;
pub mod currency;
pub mod dmarket;
pub mod http;
pub mod mock;
pub mod youpin;

pub use buffmarket::BuffMarketSource;
pub use csfloat::CsFloatSource;
pub use csmoney::CsMoneySource;
pub use currency::{RateError, RateProvider, RateState};
pub use dmarket::DMarketSource;
pub use mock::MockSource;
pub use youpin::YoupinSource;

/// One marketplace's trade history, normalized to [`Transaction`]s.
///
/// Implementations own pagination, authentication, rate limiting and
/// retry/backoff. Every returned transaction already carries its signature.
#[async_trait]
pub trait MarketSource: Send + Sync + fmt::Debug {
    /// Display name, also written as the transaction source.
    fn name(&self) -> &str;

    /// Completed sales with `start <= time <= end`.
    async fn get_sales(&self, start: TimeMs, end: TimeMs)
        -> Result<Vec<Transaction>, DataSourceError>;

    /// Completed purchases with `start <= time <= end`.
    async fn get_buys(&self, start: TimeMs, end: TimeMs)
        -> Result<Vec<Transaction>, DataSourceError>;
}

/// Inclusive time window applied to newest-first history pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    pub start: TimeMs,
    pub end: TimeMs,
}

/// What to do with a history record given its time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowPosition {
    /// Newer than the window; keep paging.
    After,
    Within,
    /// Older than the window; history is newest-first, so stop paging.
    Before,
}

impl TimeWindow {
    pub fn new(start: TimeMs, end: TimeMs) -> Self {
        Self { start, end }
    }

    pub fn position(&self, time_ms: TimeMs) -> WindowPosition {
        if time_ms > self.end {
            WindowPosition::After
        } else if time_ms < self.start {
            WindowPosition::Before
        } else {
            WindowPosition::Within
        }
    }
}

/// Error type for marketplace fetches.
#[derive(Debug, Clone)]
pub enum DataSourceError {
    /// Network error (e.g., connection timeout, DNS failure)
    NetworkError(String),
    /// HTTP error (e.g., 429 rate limit, 5xx server error)
    HttpError { status: u16, message: String },
    /// Parsing error (invalid JSON or malformed response)
    ParseError(String),
    /// Marketplace-level rejection carried in an HTTP 200 body
    ApiError(String),
    /// Credentials missing or unusable
    Auth(String),
    /// Rate limit exceeded (caller should implement backoff)
    RateLimited,
}

impl fmt::Display for DataSourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataSourceError::NetworkError(msg) => write!(f, "Network error: {}", msg),
            DataSourceError::HttpError { status, message } => {
                write!(f, "HTTP error {}: {}", status, message)
            }
            DataSourceError::ParseError(msg) => write!(f, "Parse error: {}", msg),
            DataSourceError::ApiError(msg) => write!(f, "API error: {}", msg),
            DataSourceError::Auth(msg) => write!(f, "Auth error: {}", msg),
            DataSourceError::RateLimited => write!(f, "Rate limited"),
        }
    }
}

impl std::error::Error for DataSourceError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_datasource_error_display() {
        let err = DataSourceError::NetworkError("connection timeout".to_string());
        assert_eq!(err.to_string(), "Network error: connection timeout");

        let err = DataSourceError::HttpError {
            status: 429,
            message: "Too many requests".to_string(),
        };
        assert_eq!(err.to_string(), "HTTP error 429: Too many requests");

        let err = DataSourceError::ParseError("invalid JSON".to_string());
        assert_eq!(err.to_string(), "Parse error: invalid JSON");

        let err = DataSourceError::RateLimited;
        assert_eq!(err.to_string(), "Rate limited");
    }

    #[test]
    fn test_time_window_is_inclusive() {
        let window = TimeWindow::new(TimeMs::new(100), TimeMs::new(200));
        assert_eq!(window.position(TimeMs::new(201)), WindowPosition::After);
        assert_eq!(window.position(TimeMs::new(200)), WindowPosition::Within);
        assert_eq!(window.position(TimeMs::new(100)), WindowPosition::Within);
        assert_eq!(window.position(TimeMs::new(99)), WindowPosition::Before);
    }
}
