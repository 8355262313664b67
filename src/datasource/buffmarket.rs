//! BuffMarket order history client.

use super::http::{build_client, send_json, with_session, PageDelay};
use super::{DataSourceError, MarketSource, TimeWindow, WindowPosition};
use crate::domain::{resolve_pattern, Decimal, ItemIdentity, TimeMs, Transaction, TxKind};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, warn};

pub const SOURCE_NAME: &str = "BuffMarket";
pub const DEFAULT_BASE_URL: &str = "https://api.buff.market";

const PAGE_SIZE: usize = 200;
const UNKNOWN_ITEM: &str = "Unknown Item";

#[derive(Debug, Deserialize)]
struct HistoryResponse {
    code: String,
    #[serde(default)]
    msg: Option<String>,
    #[serde(default)]
    data: Option<HistoryData>,
}

#[derive(Debug, Default, Deserialize)]
struct HistoryData {
    #[serde(default)]
    goods_infos: HashMap<String, GoodsInfo>,
    #[serde(default)]
    items: Vec<RawOrder>,
    #[serde(default, rename = "total_page")]
    total_pages: usize,
}

#[derive(Debug, Deserialize)]
struct GoodsInfo {
    market_hash_name: String,
}

#[derive(Debug, Deserialize)]
struct RawOrder {
    id: String,
    goods_id: i64,
    price: String,
    #[serde(default)]
    fee: Option<String>,
    state: String,
    updated_at: i64,
    #[serde(default)]
    asset_info: RawAssetInfo,
}

#[derive(Debug, Default, Deserialize)]
struct RawAssetInfo {
    #[serde(default)]
    assetid: String,
    #[serde(default)]
    paintwear: Option<String>,
    #[serde(default)]
    info: RawInfo,
}

#[derive(Debug, Default, Deserialize)]
struct RawInfo {
    paintseed: Option<i64>,
    #[serde(default)]
    metaphysic: Option<Metaphysic>,
    #[serde(default)]
    keychains: Vec<Keychain>,
}

#[derive(Debug, Deserialize)]
struct Metaphysic {
    data: Option<MetaphysicData>,
}

#[derive(Debug, Deserialize)]
struct MetaphysicData {
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Keychain {
    name: String,
    pattern: Option<i64>,
}

#[derive(Debug, Clone)]
pub struct BuffMarketSource {
    client: reqwest::Client,
    base_url: String,
    headers: HashMap<String, String>,
    cookies: HashMap<String, String>,
    page_delay: PageDelay,
}

impl BuffMarketSource {
    pub fn new(
        base_url: String,
        headers: HashMap<String, String>,
        cookies: HashMap<String, String>,
    ) -> Self {
        Self {
            client: build_client(),
            base_url,
            headers,
            cookies,
            page_delay: PageDelay::fixed(Duration::from_secs(2)),
        }
    }

    pub fn default_url(headers: HashMap<String, String>, cookies: HashMap<String, String>) -> Self {
        Self::new(DEFAULT_BASE_URL.to_string(), headers, cookies)
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
        let action = match kind {
            TxKind::Sell => "sell",
            TxKind::Buy => "buy",
        };
        let mut txs = Vec::new();
        let mut page = 1usize;

        loop {
            let url = format!(
                "{}/api/market/{}_order/history?game=csgo&page_num={}&page_size={}&state=success",
                self.base_url, action, page, PAGE_SIZE
            );
            debug!(source = SOURCE_NAME, action, page, "Fetching order history page");

            let response: HistoryResponse = send_json(|| {
                Ok(with_session(self.client.get(&url), &self.headers, &self.cookies))
            })
            .await?;

            if response.code != "OK" {
                return Err(DataSourceError::ApiError(format!(
                    "{} - {}",
                    response.code,
                    response.msg.unwrap_or_default()
                )));
            }
            let data = response.data.unwrap_or_default();

            for raw in data.items.iter().filter(|o| o.state == "SUCCESS") {
                let name = data
                    .goods_infos
                    .get(&raw.goods_id.to_string())
                    .map(|g| g.market_hash_name.as_str())
                    .unwrap_or(UNKNOWN_ITEM);

                let tx = match normalize_order(raw, name, kind) {
                    Ok(tx) => tx,
                    Err(e) => {
                        warn!(source = SOURCE_NAME, order_id = %raw.id, error = %e, "Skipping order");
                        continue;
                    }
                };
                match window.position(tx.time_ms) {
                    WindowPosition::After => continue,
                    WindowPosition::Before => return Ok(txs),
                    WindowPosition::Within => txs.push(tx),
                }
            }

            if page >= data.total_pages {
                return Ok(txs);
            }
            page += 1;
            self.page_delay.sleep().await;
        }
    }
}

fn normalize_order(raw: &RawOrder, name: &str, kind: TxKind) -> Result<Transaction, DataSourceError> {
    let price = Decimal::from_str_canonical(&raw.price)
        .map_err(|e| DataSourceError::ParseError(format!("Invalid price: {}", e)))?;
    let fee = match raw.fee.as_deref().filter(|f| !f.trim().is_empty()) {
        Some(fee) => Decimal::from_str_canonical(fee)
            .map_err(|e| DataSourceError::ParseError(format!("Invalid fee: {}", e)))?,
        None => Decimal::zero(),
    };

    let wear = match raw.asset_info.paintwear.as_deref().filter(|w| !w.trim().is_empty()) {
        Some(w) => w
            .trim()
            .parse::<f64>()
            .map_err(|e| DataSourceError::ParseError(format!("Invalid paintwear: {}", e)))?,
        None => 0.0,
    };

    let info = &raw.asset_info.info;
    // A charm's own pattern applies only when the listed item is the charm.
    let charm_pattern = info
        .keychains
        .first()
        .filter(|k| name.contains(k.name.as_str()))
        .and_then(|k| k.pattern);

    let phase = info
        .metaphysic
        .as_ref()
        .and_then(|m| m.data.as_ref())
        .and_then(|d| d.name.clone())
        .unwrap_or_default();

    Ok(Transaction::new(
        SOURCE_NAME,
        kind,
        raw.id.as_str(),
        raw.asset_info.assetid.as_str(),
        ItemIdentity {
            name: name.to_string(),
            wear,
            pattern: resolve_pattern(info.paintseed, charm_pattern),
            phase,
        },
        price - fee,
        TimeMs::from_secs(raw.updated_at),
    ))
}

#[async_trait]
impl MarketSource for BuffMarketSource {
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
