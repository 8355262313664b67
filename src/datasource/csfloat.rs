//! CSFloat trade history client.

use super::http::{build_client, send_json, PageDelay};
use super::{DataSourceError, MarketSource, TimeWindow, WindowPosition};
use crate::domain::{resolve_pattern, Decimal, ItemIdentity, TimeMs, Transaction, TxKind};
use async_trait::async_trait;
use chrono::DateTime;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

pub const SOURCE_NAME: &str = "CSFloat";
pub const DEFAULT_BASE_URL: &str = "https://csfloat.com";

const PAGE_LIMIT: usize = 1000;
/// Seller proceeds after the marketplace fee.
const SELLER_SHARE: &str = "0.98";

#[derive(Debug, Deserialize)]
struct TradesPage {
    #[serde(default)]
    trades: Vec<RawTrade>,
}

#[derive(Debug, Deserialize)]
struct RawTrade {
    id: String,
    verified_at: Option<String>,
    contract: RawContract,
}

#[derive(Debug, Deserialize)]
struct RawContract {
    /// Cents.
    price: i64,
    item: RawItem,
}

#[derive(Debug, Deserialize)]
struct RawItem {
    #[serde(default)]
    asset_id: String,
    market_hash_name: String,
    float_value: Option<f64>,
    #[serde(default)]
    phase: Option<String>,
    paint_seed: Option<i64>,
    keychain_pattern: Option<i64>,
}

#[derive(Debug, Clone)]
pub struct CsFloatSource {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    page_delay: PageDelay,
}

impl CsFloatSource {
    pub fn new(base_url: String, api_key: String) -> Self {
        Self {
            client: build_client(),
            base_url,
            api_key,
            page_delay: PageDelay::fixed(Duration::from_millis(1500)),
        }
    }

    pub fn default_url(api_key: String) -> Self {
        Self::new(DEFAULT_BASE_URL.to_string(), api_key)
    }

    pub fn with_page_delay(mut self, page_delay: PageDelay) -> Self {
        self.page_delay = page_delay;
        self
    }

    async fn fetch_trades(
        &self,
        kind: TxKind,
        window: TimeWindow,
    ) -> Result<Vec<Transaction>, DataSourceError> {
        if self.api_key.is_empty() {
            return Err(DataSourceError::Auth("CSFloat API key not configured".to_string()));
        }

        let role = match kind {
            TxKind::Sell => "seller",
            TxKind::Buy => "buyer",
        };
        let mut txs = Vec::new();
        let mut page = 0usize;

        loop {
            let url = format!(
                "{}/api/v1/me/trades?role={}&state=verified&limit={}&page={}",
                self.base_url, role, PAGE_LIMIT, page
            );
            debug!(source = SOURCE_NAME, role, page, "Fetching trades page");

            let response: TradesPage = send_json(|| {
                Ok(self
                    .client
                    .get(&url)
                    .header(reqwest::header::AUTHORIZATION, self.api_key.as_str()))
            })
            .await?;

            if response.trades.is_empty() {
                return Ok(txs);
            }

            for raw in &response.trades {
                let tx = match normalize_trade(raw, kind) {
                    Ok(tx) => tx,
                    Err(e) => {
                        warn!(source = SOURCE_NAME, trade_id = %raw.id, error = %e, "Skipping trade");
                        continue;
                    }
                };
                match window.position(tx.time_ms) {
                    WindowPosition::After => continue,
                    WindowPosition::Before => return Ok(txs),
                    WindowPosition::Within => txs.push(tx),
                }
            }

            page += 1;
            self.page_delay.sleep().await;
        }
    }
}

fn normalize_trade(raw: &RawTrade, kind: TxKind) -> Result<Transaction, DataSourceError> {
    let verified_at = raw
        .verified_at
        .as_deref()
        .ok_or_else(|| DataSourceError::ParseError("Missing verified_at".to_string()))?;
    let time = DateTime::parse_from_rfc3339(verified_at)
        .map_err(|e| DataSourceError::ParseError(format!("Invalid verified_at: {}", e)))?;

    let gross = Decimal::from_minor_units(raw.contract.price);
    let price = match kind {
        TxKind::Sell => {
            let share = Decimal::from_str_canonical(SELLER_SHARE)
                .map_err(|e| DataSourceError::ParseError(e.to_string()))?;
            (gross * share).round2()
        }
        TxKind::Buy => gross,
    };

    let item = &raw.contract.item;
    Ok(Transaction::new(
        SOURCE_NAME,
        kind,
        raw.id.as_str(),
        item.asset_id.as_str(),
        ItemIdentity {
            name: item.market_hash_name.clone(),
            wear: item.float_value.unwrap_or_default(),
            pattern: resolve_pattern(item.paint_seed, item.keychain_pattern),
            phase: item.phase.clone().unwrap_or_default(),
        },
        price,
        TimeMs::new(time.timestamp_millis()),
    ))
}

#[async_trait]
impl MarketSource for CsFloatSource {
    fn name(&self) -> &str {
        SOURCE_NAME
    }

    async fn get_sales(
        &self,
        start: TimeMs,
        end: TimeMs,
    ) -> Result<Vec<Transaction>, DataSourceError> {
        self.fetch_trades(TxKind::Sell, TimeWindow::new(start, end)).await
    }

    async fn get_buys(
        &self,
        start: TimeMs,
        end: TimeMs,
    ) -> Result<Vec<Transaction>, DataSourceError> {
        self.fetch_trades(TxKind::Buy, TimeWindow::new(start, end)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(price: i64, seed: Option<i64>, charm: Option<i64>) -> RawTrade {
        serde_json::from_value(serde_json::json!({
            "id": "771",
            "verified_at": "2024-05-01T12:00:00Z",
            "contract": {
                "price": price,
                "item": {
                    "asset_id": "3001",
                    "market_hash_name": "AK-47 | Slate (Field-Tested)",
                    "float_value": 0.2234,
                    "phase": null,
                    "paint_seed": seed,
                    "keychain_pattern": charm
                }
            }
        }))
        .unwrap()
    }

    #[test]
    fn test_sale_price_is_net_of_fee() {
        let tx = normalize_trade(&raw(1999, Some(12), None), TxKind::Sell).unwrap();
        // 19.99 * 0.98 = 19.5902
        assert_eq!(tx.price, Decimal::from_str_canonical("19.59").unwrap());
        assert_eq!(tx.kind, TxKind::Sell);
        assert_eq!(tx.source, "CSFloat");
        assert_eq!(tx.time_ms, TimeMs::new(1_714_564_800_000));
    }

    #[test]
    fn test_buy_price_is_gross() {
        let tx = normalize_trade(&raw(1999, Some(12), None), TxKind::Buy).unwrap();
        assert_eq!(tx.price, Decimal::from_str_canonical("19.99").unwrap());
        assert_eq!(tx.pattern, Some(12));
        assert_eq!(
            tx.signature().as_str(),
            "AK-47 | Slate (Field-Tested)|0.22340000|12"
        );
    }

    #[test]
    fn test_charm_pattern_overrides_seed() {
        let tx = normalize_trade(&raw(100, Some(12), Some(88_000)), TxKind::Buy).unwrap();
        assert_eq!(tx.pattern, Some(88_000));
    }

    #[test]
    fn test_missing_verified_at_is_parse_error() {
        let mut trade = raw(100, None, None);
        trade.verified_at = None;
        assert!(matches!(
            normalize_trade(&trade, TxKind::Buy),
            Err(DataSourceError::ParseError(_))
        ));
    }
}
