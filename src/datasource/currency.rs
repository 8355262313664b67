//! Historical CNY→USD rates for sources that settle in yuan.
//!
//! The provider is constructed explicitly and shared by `Arc`; it loads the
//! full rate history once on first use.

use super::http::{build_client, send_json};
use super::DataSourceError;
use crate::domain::Decimal;
use chrono::{Days, NaiveDate};
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::str::FromStr;
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};
use tracing::{info, warn};

pub const DEFAULT_RATE_API_URL: &str = "https://api.frankfurter.dev";

/// First day of the loaded history.
pub const HISTORY_START: &str = "2020-01-01";

/// Days to look back when a date has no published rate (weekends, holidays).
pub const LOOKBACK_DAYS: u64 = 5;

/// Rate used when no published rate is available.
pub const FALLBACK_RATE: &str = "0.1395";

#[derive(Debug, Error)]
pub enum RateError {
    #[error("rate request failed: {0}")]
    Fetch(#[from] DataSourceError),
    #[error("rate response contained no usable rates")]
    Empty,
}

/// Lifecycle of the rate table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateState {
    Uninitialized,
    Loading,
    Ready,
}

#[derive(Debug)]
struct RateTable {
    state: RateState,
    rates: BTreeMap<NaiveDate, Decimal>,
}

#[derive(Debug, Deserialize)]
struct RateHistoryResponse {
    rates: HashMap<String, HashMap<String, f64>>,
}

/// Daily CNY→USD rates with a fixed fallback.
#[derive(Debug)]
pub struct RateProvider {
    client: reqwest::Client,
    base_url: String,
    table: RwLock<RateTable>,
    load_lock: Mutex<()>,
}

impl RateProvider {
    pub fn new(base_url: String) -> Self {
        Self::with_table(base_url, RateState::Uninitialized, BTreeMap::new())
    }

    pub fn default_url() -> Self {
        Self::new(DEFAULT_RATE_API_URL.to_string())
    }

    /// A provider that is already `Ready` with the given rates.
    pub fn preloaded(rates: BTreeMap<NaiveDate, Decimal>) -> Self {
        Self::with_table(String::new(), RateState::Ready, rates)
    }

    fn with_table(base_url: String, state: RateState, rates: BTreeMap<NaiveDate, Decimal>) -> Self {
        Self {
            client: build_client(),
            base_url,
            table: RwLock::new(RateTable { state, rates }),
            load_lock: Mutex::new(()),
        }
    }

    pub async fn state(&self) -> RateState {
        self.table.read().await.state
    }

    /// Load the rate history unless already loaded.
    ///
    /// Concurrent callers wait for a single load. A failed load returns the
    /// provider to `Uninitialized` so a later call may retry.
    pub async fn ensure_loaded(&self) -> Result<(), RateError> {
        let _guard = self.load_lock.lock().await;
        if self.state().await == RateState::Ready {
            return Ok(());
        }

        self.table.write().await.state = RateState::Loading;
        match self.fetch_history().await {
            Ok(rates) => {
                info!(days = rates.len(), "Loaded CNY/USD rates");
                let mut table = self.table.write().await;
                table.rates = rates;
                table.state = RateState::Ready;
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "Failed to load CNY/USD rates");
                self.table.write().await.state = RateState::Uninitialized;
                Err(e)
            }
        }
    }

    /// Rate for `date`, looking back up to [`LOOKBACK_DAYS`] days, else the
    /// fallback.
    pub async fn rate_on(&self, date: NaiveDate) -> Decimal {
        let table = self.table.read().await;
        lookup_rate(&table.rates, date)
    }

    async fn fetch_history(&self) -> Result<BTreeMap<NaiveDate, Decimal>, RateError> {
        let url = format!("{}/v1/{}..?from=CNY&to=USD", self.base_url, HISTORY_START);
        let response: RateHistoryResponse =
            send_json(|| Ok(self.client.get(&url))).await?;

        let rates = parse_rates(response);
        if rates.is_empty() {
            return Err(RateError::Empty);
        }
        Ok(rates)
    }
}

fn parse_rates(response: RateHistoryResponse) -> BTreeMap<NaiveDate, Decimal> {
    response
        .rates
        .into_iter()
        .filter_map(|(day, by_currency)| {
            let date = NaiveDate::parse_from_str(&day, "%Y-%m-%d").ok()?;
            let rate = Decimal::from_f64(*by_currency.get("USD")?)?;
            Some((date, rate))
        })
        .collect()
}

fn fallback_rate() -> Decimal {
    Decimal::from_str(FALLBACK_RATE).unwrap_or_else(|_| Decimal::zero())
}

fn lookup_rate(rates: &BTreeMap<NaiveDate, Decimal>, date: NaiveDate) -> Decimal {
    (0..LOOKBACK_DAYS)
        .filter_map(|back| date.checked_sub_days(Days::new(back)))
        .find_map(|day| rates.get(&day).copied())
        .unwrap_or_else(fallback_rate)
}
