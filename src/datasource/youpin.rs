//! Youpin898 order history client. Prices settle in CNY and are converted
//! to USD at the historical rate for the order date.

use super::currency::RateProvider;
use super::http::{build_client, send_json, with_headers, FlexScalar, PageDelay};
use super::{DataSourceError, MarketSource, TimeWindow, WindowPosition};
use crate::domain::{resolve_pattern, Decimal, ItemIdentity, TimeMs, Transaction, TxKind};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

pub const SOURCE_NAME: &str = "Youpin";
pub const DEFAULT_BASE_URL: &str = "https://api.youpin898.com";

const PAGE_SIZE: usize = 20;
/// Completed orders.
const ORDER_STATUS_FINISHED: u32 = 340;
/// Seller proceeds after the marketplace fee.
const SELLER_SHARE: &str = "0.99";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ListRequest<'a> {
    keys: &'a str,
    order_status: u32,
    page_index: usize,
    page_size: usize,
}

#[derive(Debug, Deserialize)]
struct ListResponse {
    #[serde(default)]
    data: Option<ListData>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListData {
    #[serde(default)]
    order_list: Vec<RawOrder>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawOrder {
    #[serde(default)]
    order_detail_no: String,
    finish_order_time: Option<i64>,
    revocable_offer_deadline: Option<i64>,
    presenter_steam_id: Option<FlexScalar>,
    #[serde(default)]
    product_detail_list: Vec<RawProduct>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawProduct {
    commodity_hash_name: String,
    /// Fen (CNY / 100).
    price: i64,
    /// Spelled this way by the API.
    assert_id: Option<FlexScalar>,
    #[serde(default)]
    abrade: String,
    paint_seed: Option<i64>,
    #[serde(default)]
    doppler_title: Option<String>,
}

#[derive(Debug, Clone)]
pub struct YoupinSource {
    client: reqwest::Client,
    base_url: String,
    headers: HashMap<String, String>,
    steam_id: String,
    rates: Arc<RateProvider>,
    page_delay: PageDelay,
}

impl YoupinSource {
    pub fn new(
        base_url: String,
        headers: HashMap<String, String>,
        steam_id: String,
        rates: Arc<RateProvider>,
    ) -> Self {
        Self {
            client: build_client(),
            base_url,
            headers,
            steam_id,
            rates,
            page_delay: PageDelay::jittered(Duration::from_millis(3000), Duration::from_millis(2000)),
        }
    }

    pub fn default_url(
        headers: HashMap<String, String>,
        steam_id: String,
        rates: Arc<RateProvider>,
    ) -> Self {
        Self::new(DEFAULT_BASE_URL.to_string(), headers, steam_id, rates)
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
        if let Err(e) = self.rates.ensure_loaded().await {
            warn!(source = SOURCE_NAME, error = %e, "Using fallback CNY/USD rate");
        }

        let mode = match kind {
            TxKind::Sell => "sell",
            TxKind::Buy => "buy",
        };
        let url = format!("{}/api/youpin/bff/trade/sale/v1/{}/list", self.base_url, mode);
        let mut txs = Vec::new();
        let mut page = 1usize;

        loop {
            let body = ListRequest {
                keys: "",
                order_status: ORDER_STATUS_FINISHED,
                page_index: page,
                page_size: PAGE_SIZE,
            };
            debug!(source = SOURCE_NAME, mode, page, "Fetching order list page");

            let response: ListResponse = send_json(|| {
                Ok(with_headers(self.client.post(&url), &self.headers).json(&body))
            })
            .await?;
            let orders = response.data.unwrap_or_default().order_list;
            if orders.is_empty() {
                return Ok(txs);
            }

            for order in &orders {
                let time_ms = order_time(order);
                match window.position(time_ms) {
                    WindowPosition::After => continue,
                    WindowPosition::Before => return Ok(txs),
                    WindowPosition::Within => {}
                }
                if kind == TxKind::Buy && is_gift_from_other(order, &self.steam_id) {
                    debug!(source = SOURCE_NAME, order = %order.order_detail_no, "Skipping gifted purchase");
                    continue;
                }

                let rate = match time_ms.to_datetime() {
                    Some(dt) => self.rates.rate_on(dt.date_naive()).await,
                    None => {
                        warn!(source = SOURCE_NAME, order = %order.order_detail_no, "Skipping order with invalid time");
                        continue;
                    }
                };
                for product in &order.product_detail_list {
                    match normalize_product(order, product, kind, rate, time_ms) {
                        Ok(tx) => txs.push(tx),
                        Err(e) => {
                            warn!(source = SOURCE_NAME, order = %order.order_detail_no, error = %e, "Skipping product");
                        }
                    }
                }
            }

            if orders.len() < PAGE_SIZE {
                return Ok(txs);
            }
            page += 1;
            self.page_delay.sleep().await;
        }
    }
}

/// Offer deadline when set, else the finish time; both in milliseconds.
fn order_time(order: &RawOrder) -> TimeMs {
    let raw = match order.revocable_offer_deadline {
        Some(deadline) if deadline > 0 => deadline,
        _ => order.finish_order_time.unwrap_or_default(),
    };
    TimeMs::from_secs(raw / 1000)
}

fn is_gift_from_other(order: &RawOrder, steam_id: &str) -> bool {
    match &order.presenter_steam_id {
        Some(presenter) => presenter.to_id_string() != steam_id,
        None => false,
    }
}

fn normalize_product(
    order: &RawOrder,
    product: &RawProduct,
    kind: TxKind,
    rate: Decimal,
    time_ms: TimeMs,
) -> Result<Transaction, DataSourceError> {
    let mut price_cny = Decimal::from_minor_units(product.price);
    if kind == TxKind::Sell {
        let share = Decimal::from_str_canonical(SELLER_SHARE)
            .map_err(|e| DataSourceError::ParseError(e.to_string()))?;
        price_cny = price_cny * share;
    }

    Ok(Transaction::new(
        SOURCE_NAME,
        kind,
        order.order_detail_no.as_str(),
        product
            .assert_id
            .as_ref()
            .map(FlexScalar::to_id_string)
            .unwrap_or_default(),
        ItemIdentity {
            name: product.commodity_hash_name.clone(),
            wear: product.abrade.trim().parse().unwrap_or_default(),
            // Patternless items report seed 0.
            pattern: resolve_pattern(product.paint_seed.filter(|&seed| seed != 0), None),
            phase: product.doppler_title.clone().unwrap_or_default(),
        },
        (price_cny * rate).round2(),
        time_ms,
    ))
}

#[async_trait]
impl MarketSource for YoupinSource {
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

#[cfg(test)]
mod tests {
    use super::*;

    fn order(presenter: serde_json::Value, deadline: i64) -> RawOrder {
        serde_json::from_value(serde_json::json!({
            "orderNo": "O-1",
            "orderDetailNo": "OD-1",
            "finishOrderTime": 1_704_067_200_000i64,
            "revocableOfferDeadline": deadline,
            "presenterSteamId": presenter,
            "productDetailList": [{
                "commodityHashName": "AWP | Asiimov (Field-Tested)",
                "price": 100_000,
                "assertId": 38_000_000_001i64,
                "abrade": "0.2587",
                "paintSeed": 12,
                "dopplerTitle": null
            }]
        }))
        .unwrap()
    }

    fn d(s: &str) -> Decimal {
        Decimal::from_str_canonical(s).unwrap()
    }

    #[test]
    fn test_order_time_prefers_offer_deadline() {
        assert_eq!(order_time(&order(serde_json::Value::Null, 0)), TimeMs::from_secs(1_704_067_200));
        assert_eq!(
            order_time(&order(serde_json::Value::Null, 1_704_153_600_500)),
            TimeMs::from_secs(1_704_153_600)
        );
    }

    #[test]
    fn test_sale_price_converted_after_fee() {
        let o = order(serde_json::Value::Null, 0);
        let tx = normalize_product(&o, &o.product_detail_list[0], TxKind::Sell, d("0.14"), order_time(&o)).unwrap();
        // 1000 CNY * 0.99 * 0.14
        assert_eq!(tx.price, d("138.60"));
        assert_eq!(tx.asset_id, "38000000001");
        assert_eq!(tx.tx_id, "OD-1");
        assert_eq!(tx.pattern, Some(12));
        assert_eq!(tx.signature().as_str(), "AWP | Asiimov (Field-Tested)|0.25870000|12");
    }

    #[test]
    fn test_buy_price_has_no_fee() {
        let o = order(serde_json::Value::Null, 0);
        let tx = normalize_product(&o, &o.product_detail_list[0], TxKind::Buy, d("0.1395"), order_time(&o)).unwrap();
        assert_eq!(tx.price, d("139.50"));
    }

    #[test]
    fn test_zero_paint_seed_is_absent() {
        let mut o = order(serde_json::Value::Null, 0);
        o.product_detail_list[0] = serde_json::from_value(serde_json::json!({
            "commodityHashName": "Sticker | Crown (Foil)",
            "price": 5_000,
            "assertId": "77",
            "abrade": "",
            "paintSeed": 0,
            "dopplerTitle": null
        }))
        .unwrap();

        let tx = normalize_product(&o, &o.product_detail_list[0], TxKind::Buy, d("0.14"), order_time(&o)).unwrap();
        assert_eq!(tx.pattern, None);

        let elsewhere = Transaction::new(
            "CSFloat",
            TxKind::Sell,
            "cf-1",
            "77",
            ItemIdentity {
                name: "Sticker | Crown (Foil)".to_string(),
                wear: 0.0,
                pattern: resolve_pattern(None, None),
                phase: String::new(),
            },
            d("9"),
            TimeMs::from_secs(1_800_000_000),
        );
        assert_eq!(tx.signature(), elsewhere.signature());
        assert_eq!(tx.signature().as_str(), "Sticker | Crown (Foil)|0.00000000|-");
    }

    #[test]
    fn test_gift_detection() {
        assert!(!is_gift_from_other(&order(serde_json::Value::Null, 0), "7656"));
        assert!(!is_gift_from_other(&order(serde_json::json!("7656"), 0), "7656"));
        assert!(!is_gift_from_other(&order(serde_json::json!(7656), 0), "7656"));
        assert!(is_gift_from_other(&order(serde_json::json!("1234"), 0), "7656"));
    }
}
