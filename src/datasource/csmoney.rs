//! CS.MONEY market history client.

use super::http::{build_client, send_json, with_session, FlexScalar, PageDelay};
use super::{DataSourceError, MarketSource, TimeWindow, WindowPosition};
use crate::domain::{
    extract_phase, resolve_pattern, Decimal, ItemIdentity, TimeMs, Transaction, TxKind,
};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, warn};

pub const SOURCE_NAME: &str = "CSMoney";
pub const DEFAULT_BASE_URL: &str = "https://cs.money";

const PAGE_LIMIT: usize = 100;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawRecord {
    source_id: FlexScalar,
    #[serde(default)]
    update_time: i64,
    time_settlement: Option<i64>,
    #[serde(default)]
    offset: i64,
    #[serde(rename = "type")]
    record_type: String,
    #[serde(default)]
    details: RawDetails,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawDetails {
    on_wallet: Option<f64>,
    sell_order: Option<SellOrder>,
    offer: Option<Offer>,
}

#[derive(Debug, Deserialize)]
struct SellOrder {
    skins: SoldSkin,
}

#[derive(Debug, Deserialize)]
struct SoldSkin {
    asset: RawAsset,
}

#[derive(Debug, Deserialize)]
struct Offer {
    #[serde(default)]
    skins: Vec<BoughtSkin>,
}

#[derive(Debug, Deserialize)]
struct BoughtSkin {
    id: FlexScalar,
    asset: RawAsset,
    pricing: Pricing,
}

#[derive(Debug, Deserialize)]
struct Pricing {
    computed: f64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawAsset {
    id: FlexScalar,
    float: Option<FlexScalar>,
    /// Sell records call the seed `paintseed`, buy records `pattern`.
    #[serde(alias = "pattern")]
    paintseed: Option<i64>,
    keychain_pattern: Option<i64>,
    names: Names,
}

#[derive(Debug, Deserialize)]
struct Names {
    full: String,
}

#[derive(Debug, Clone)]
pub struct CsMoneySource {
    client: reqwest::Client,
    base_url: String,
    headers: HashMap<String, String>,
    cookies: HashMap<String, String>,
    page_delay: PageDelay,
}

impl CsMoneySource {
    pub fn new(base_url: String, cookies: HashMap<String, String>) -> Self {
        let mut headers = HashMap::new();
        headers.insert(
            "User-Agent".to_string(),
            "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36"
                .to_string(),
        );
        Self {
            client: build_client(),
            base_url,
            headers,
            cookies,
            page_delay: PageDelay::jittered(Duration::from_millis(3000), Duration::from_millis(1500)),
        }
    }

    pub fn default_url(cookies: HashMap<String, String>) -> Self {
        Self::new(DEFAULT_BASE_URL.to_string(), cookies)
    }

    pub fn with_page_delay(mut self, page_delay: PageDelay) -> Self {
        self.page_delay = page_delay;
        self
    }

    async fn fetch_history(
        &self,
        kind: TxKind,
        window: TimeWindow,
    ) -> Result<Vec<Transaction>, DataSourceError> {
        let (status, type_filter) = match kind {
            TxKind::Sell => ("sold", ""),
            TxKind::Buy => ("accepted", "&type=buy"),
        };
        let mut txs = Vec::new();
        let mut offset: Option<i64> = None;

        loop {
            let offset_param = offset.map(|o| format!("&offset={}", o)).unwrap_or_default();
            let url = format!(
                "{}/2.0/market/history?limit={}&noCache=true{}&status={}{}",
                self.base_url, PAGE_LIMIT, offset_param, status, type_filter
            );
            debug!(source = SOURCE_NAME, status, ?offset, "Fetching history page");

            let records: Vec<RawRecord> = send_json(|| {
                Ok(with_session(self.client.get(&url), &self.headers, &self.cookies))
            })
            .await?;

            let Some(last) = records.last() else {
                return Ok(txs);
            };
            let next_offset = last.offset;

            for raw in &records {
                let normalized = match normalize_record(raw) {
                    Ok(normalized) => normalized,
                    Err(e) => {
                        warn!(source = SOURCE_NAME, record = %raw.source_id.to_id_string(), error = %e, "Skipping record");
                        continue;
                    }
                };
                for tx in normalized.into_iter().filter(|t| t.kind == kind) {
                    match window.position(tx.time_ms) {
                        WindowPosition::After => continue,
                        WindowPosition::Before => return Ok(txs),
                        WindowPosition::Within => txs.push(tx),
                    }
                }
            }

            if records.len() < PAGE_LIMIT {
                return Ok(txs);
            }
            offset = Some(next_offset);
            self.page_delay.sleep().await;
        }
    }
}

fn record_time(raw: &RawRecord) -> TimeMs {
    match raw.time_settlement {
        Some(secs) => TimeMs::from_secs(secs),
        None => TimeMs::from_secs(raw.update_time / 1000),
    }
}

fn price_from(value: f64) -> Result<Decimal, DataSourceError> {
    Decimal::from_f64(value)
        .ok_or_else(|| DataSourceError::ParseError(format!("Invalid price: {}", value)))
}

fn identity(asset: &RawAsset) -> ItemIdentity {
    let (name, phase) = extract_phase(&asset.names.full);
    ItemIdentity {
        name,
        wear: asset.float.as_ref().and_then(FlexScalar::to_f64).unwrap_or_default(),
        pattern: resolve_pattern(asset.paintseed, asset.keychain_pattern),
        phase,
    }
}

/// A sale record yields one transaction; a buy record one per skin in the
/// offer.
fn normalize_record(raw: &RawRecord) -> Result<Vec<Transaction>, DataSourceError> {
    let time_ms = record_time(raw);

    match raw.record_type.as_str() {
        "sell" => {
            let order = raw
                .details
                .sell_order
                .as_ref()
                .ok_or_else(|| DataSourceError::ParseError("Missing sellOrder".to_string()))?;
            let on_wallet = raw
                .details
                .on_wallet
                .ok_or_else(|| DataSourceError::ParseError("Missing onWallet".to_string()))?;
            let asset = &order.skins.asset;

            Ok(vec![Transaction::new(
                SOURCE_NAME,
                TxKind::Sell,
                raw.source_id.to_id_string(),
                asset.id.to_id_string(),
                identity(asset),
                price_from(on_wallet)?,
                time_ms,
            )])
        }
        "buy" => {
            let offer = raw
                .details
                .offer
                .as_ref()
                .ok_or_else(|| DataSourceError::ParseError("Missing offer".to_string()))?;

            offer
                .skins
                .iter()
                .map(|skin| {
                    Ok(Transaction::new(
                        SOURCE_NAME,
                        TxKind::Buy,
                        skin.id.to_id_string(),
                        skin.asset.id.to_id_string(),
                        identity(&skin.asset),
                        price_from(skin.pricing.computed)?,
                        time_ms,
                    ))
                })
                .collect()
        }
        _ => Ok(Vec::new()),
    }
}

#[async_trait]
impl MarketSource for CsMoneySource {
    fn name(&self) -> &str {
        SOURCE_NAME
    }

    async fn get_sales(
        &self,
        start: TimeMs,
        end: TimeMs,
    ) -> Result<Vec<Transaction>, DataSourceError> {
        self.fetch_history(TxKind::Sell, TimeWindow::new(start, end)).await
    }

    async fn get_buys(
        &self,
        start: TimeMs,
        end: TimeMs,
    ) -> Result<Vec<Transaction>, DataSourceError> {
        self.fetch_history(TxKind::Buy, TimeWindow::new(start, end)).await
    }
}
