//! Domain primitives: TimeMs, TxKind.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// Time in milliseconds since Unix epoch.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct TimeMs(pub i64);

impl TimeMs {
    /// Create a TimeMs from milliseconds.
    pub fn new(ms: i64) -> Self {
        TimeMs(ms)
    }

    /// Create a TimeMs from whole seconds.
    pub fn from_secs(secs: i64) -> Self {
        TimeMs(secs.saturating_mul(1000))
    }

    pub fn now() -> Self {
        TimeMs(Utc::now().timestamp_millis())
    }

    /// Get the underlying milliseconds value.
    pub fn as_ms(&self) -> i64 {
        self.0
    }

    /// UTC datetime, or `None` when out of chrono's range.
    pub fn to_datetime(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_millis_opt(self.0).single()
    }

    /// Format as `YYYY-MM-DD HH:MM` (UTC); empty when out of range.
    pub fn format_minutes(&self) -> String {
        self.to_datetime()
            .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_default()
    }
}

impl From<DateTime<Utc>> for TimeMs {
    fn from(dt: DateTime<Utc>) -> Self {
        TimeMs(dt.timestamp_millis())
    }
}

/// Direction of a marketplace transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TxKind {
    Buy,
    Sell,
}

impl std::fmt::Display for TxKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TxKind::Buy => write!(f, "BUY"),
            TxKind::Sell => write!(f, "SELL"),
        }
    }
}
