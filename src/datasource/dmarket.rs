//! DMarket exchange history client with ed25519 request signing.

use super::http::{build_client, send_json, PageDelay};
use super::{DataSourceError, MarketSource, TimeWindow, WindowPosition};
use crate::domain::{resolve_pattern, Decimal, ItemIdentity, TimeMs, Transaction, TxKind};
use async_trait::async_trait;
use ed25519_dalek::{Signer, SigningKey};
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

pub const SOURCE_NAME: &str = "DMarket";
pub const DEFAULT_BASE_URL: &str = "https://api.dmarket.com";

const PAGE_LIMIT: usize = 1000;
/// Contractor id DMarket assigns to the CS2 game.
const CS2_CONTRACTOR_ID: &str = "a8db";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SignError {
    #[error("invalid secret key: must be 128 hex characters")]
    InvalidKeyEncoding,
    #[error("invalid secret key: {0}")]
    InvalidKey(String),
}

/// Authentication headers for one DMarket request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedHeaders {
    pub api_key: String,
    pub signature: String,
    pub nonce: String,
}

/// Sign `method + path + body + nonce` with the account's ed25519 keypair.
///
/// `secret_hex` is the 64-byte keypair (seed followed by public key) in hex.
pub fn sign_request(
    secret_hex: &str,
    method: &str,
    path_and_query: &str,
    body: &str,
    nonce: i64,
) -> Result<SignedHeaders, SignError> {
    let bytes = hex::decode(secret_hex.trim()).map_err(|_| SignError::InvalidKeyEncoding)?;
    let keypair: [u8; 64] = bytes
        .try_into()
        .map_err(|_| SignError::InvalidKeyEncoding)?;
    let key = SigningKey::from_keypair_bytes(&keypair)
        .map_err(|e| SignError::InvalidKey(e.to_string()))?;

    let nonce = nonce.to_string();
    let message = format!("{}{}{}{}", method, path_and_query, body, nonce);
    let signature = key.sign(message.as_bytes());

    Ok(SignedHeaders {
        api_key: hex::encode(key.verifying_key().to_bytes()),
        signature: format!("dmar ed25519 {}", hex::encode(signature.to_bytes())),
        nonce,
    })
}

#[derive(Debug, Deserialize)]
struct HistoryPage {
    #[serde(default)]
    objects: Vec<RawActivity>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawActivity {
    id: String,
    #[serde(default)]
    subject: String,
    #[serde(default)]
    contractor: Option<Contractor>,
    #[serde(default)]
    details: Details,
    #[serde(default)]
    changes: Vec<Change>,
    #[serde(default)]
    updated_at: i64,
    #[serde(default)]
    created_at: i64,
}

#[derive(Debug, Deserialize)]
struct Contractor {
    id: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Details {
    #[serde(default)]
    item_id: String,
    #[serde(default)]
    extra: Extra,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Extra {
    float_value: Option<f64>,
    paint_seed: Option<i64>,
    #[serde(default)]
    phase_title: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Change {
    money: Money,
}

#[derive(Debug, Deserialize)]
struct Money {
    amount: String,
}

#[derive(Debug, Clone)]
pub struct DMarketSource {
    client: reqwest::Client,
    base_url: String,
    secret_key: String,
    cs2_only: bool,
    page_delay: PageDelay,
}

impl DMarketSource {
    pub fn new(base_url: String, secret_key: String, cs2_only: bool) -> Self {
        Self {
            client: build_client(),
            base_url,
            secret_key,
            cs2_only,
            page_delay: PageDelay::fixed(Duration::from_millis(200)),
        }
    }

    pub fn default_url(secret_key: String, cs2_only: bool) -> Self {
        Self::new(DEFAULT_BASE_URL.to_string(), secret_key, cs2_only)
    }

    pub fn with_page_delay(mut self, page_delay: PageDelay) -> Self {
        self.page_delay = page_delay;
        self
    }

    fn signed_get(&self, path: &str) -> Result<reqwest::RequestBuilder, DataSourceError> {
        let nonce = chrono::Utc::now().timestamp();
        let signed = sign_request(&self.secret_key, "GET", path, "", nonce)
            .map_err(|e| DataSourceError::Auth(e.to_string()))?;

        Ok(self
            .client
            .get(format!("{}{}", self.base_url, path))
            .header("X-Api-Key", signed.api_key)
            .header("X-Request-Sign", signed.signature)
            .header("X-Sign-Date", signed.nonce))
    }

    async fn fetch_history(
        &self,
        kind: TxKind,
        window: TimeWindow,
    ) -> Result<Vec<Transaction>, DataSourceError> {
        let activities = match kind {
            TxKind::Sell => "sell",
            TxKind::Buy => "purchase,target_closed",
        };
        let mut txs = Vec::new();
        let mut offset = 0usize;

        loop {
            let path = format!(
                "/exchange/v1/history?activities={}&statuses=success&sortBy=updatedAt&limit={}&offset={}",
                activities, PAGE_LIMIT, offset
            );
            debug!(source = SOURCE_NAME, activities, offset, "Fetching history page");

            let page: HistoryPage = send_json(|| self.signed_get(&path)).await?;
            let fetched = page.objects.len();
            if fetched == 0 {
                return Ok(txs);
            }

            for raw in &page.objects {
                if self.cs2_only && !is_cs2(raw) {
                    continue;
                }
                let tx = match normalize_activity(raw, kind) {
                    Ok(tx) => tx,
                    Err(e) => {
                        warn!(source = SOURCE_NAME, activity_id = %raw.id, error = %e, "Skipping activity");
                        continue;
                    }
                };
                match window.position(tx.time_ms) {
                    WindowPosition::After => continue,
                    WindowPosition::Before => return Ok(txs),
                    WindowPosition::Within => txs.push(tx),
                }
            }

            if fetched < PAGE_LIMIT {
                return Ok(txs);
            }
            offset += fetched;
            self.page_delay.sleep().await;
        }
    }
}

fn is_cs2(raw: &RawActivity) -> bool {
    raw.contractor
        .as_ref()
        .map(|c| c.id == CS2_CONTRACTOR_ID)
        .unwrap_or(false)
}

fn normalize_activity(raw: &RawActivity, kind: TxKind) -> Result<Transaction, DataSourceError> {
    let amount = raw
        .changes
        .first()
        .map(|c| c.money.amount.as_str())
        .ok_or_else(|| DataSourceError::ParseError("Missing balance change".to_string()))?;
    let price = Decimal::from_str_canonical(amount)
        .map_err(|e| DataSourceError::ParseError(format!("Invalid amount: {}", e)))?;

    let secs = if raw.updated_at != 0 {
        raw.updated_at
    } else {
        raw.created_at
    };

    let extra = &raw.details.extra;
    Ok(Transaction::new(
        SOURCE_NAME,
        kind,
        raw.id.as_str(),
        raw.details.item_id.as_str(),
        ItemIdentity {
            name: raw.subject.clone(),
            wear: extra.float_value.unwrap_or_default(),
            pattern: resolve_pattern(extra.paint_seed, None),
            phase: extra.phase_title.clone().unwrap_or_default(),
        },
        price,
        TimeMs::from_secs(secs),
    ))
}

#[async_trait]
impl MarketSource for DMarketSource {
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
    use ed25519_dalek::{Signature, Verifier, VerifyingKey};

    fn test_secret() -> String {
        let key = SigningKey::from_bytes(&[7u8; 32]);
        hex::encode(key.to_keypair_bytes())
    }

    #[test]
    fn test_sign_request_verifies() {
        let signed = sign_request(&test_secret(), "GET", "/exchange/v1/history?limit=1", "", 1_700_000_000).unwrap();
        assert_eq!(signed.nonce, "1700000000");
        assert!(signed.signature.starts_with("dmar ed25519 "));

        let public: [u8; 32] = hex::decode(&signed.api_key).unwrap().try_into().unwrap();
        let verifying = VerifyingKey::from_bytes(&public).unwrap();
        let sig_bytes: [u8; 64] = hex::decode(signed.signature.trim_start_matches("dmar ed25519 "))
            .unwrap()
            .try_into()
            .unwrap();
        verifying
            .verify(
                b"GET/exchange/v1/history?limit=11700000000",
                &Signature::from_bytes(&sig_bytes),
            )
            .unwrap();
    }

    #[test]
    fn test_sign_request_rejects_short_key() {
        assert_eq!(
            sign_request("abcd", "GET", "/", "", 0),
            Err(SignError::InvalidKeyEncoding)
        );
        assert_eq!(
            sign_request("zz", "GET", "/", "", 0),
            Err(SignError::InvalidKeyEncoding)
        );
    }

    fn activity(paint_seed: serde_json::Value, updated_at: i64) -> RawActivity {
        serde_json::from_value(serde_json::json!({
            "type": "sell",
            "id": "dm-1",
            "subject": "M4A1-S | Printstream (Minimal Wear)",
            "contractor": {"id": "a8db", "title": "CS2", "type": "game"},
            "details": {
                "itemId": "item-77",
                "extra": {"floatValue": 0.1011, "paintSeed": paint_seed, "phaseTitle": ""}
            },
            "changes": [{"money": {"amount": "154.32", "currency": "USD"}, "changeType": "sell"}],
            "updatedAt": updated_at,
            "createdAt": 1_600_000_000
        }))
        .unwrap()
    }

    #[test]
    fn test_normalize_activity() {
        let tx = normalize_activity(&activity(serde_json::json!(512), 1_700_000_000), TxKind::Sell).unwrap();
        assert_eq!(tx.price, Decimal::from_str_canonical("154.32").unwrap());
        assert_eq!(tx.asset_id, "item-77");
        assert_eq!(tx.pattern, Some(512));
        assert_eq!(tx.time_ms, TimeMs::from_secs(1_700_000_000));
        assert!(is_cs2(&activity(serde_json::Value::Null, 0)));
    }

    #[test]
    fn test_null_paint_seed_is_absent_and_created_at_fallback() {
        let tx = normalize_activity(&activity(serde_json::Value::Null, 0), TxKind::Buy).unwrap();
        assert_eq!(tx.pattern, None);
        assert_eq!(tx.time_ms, TimeMs::from_secs(1_600_000_000));
        assert!(tx.signature().as_str().ends_with("|-"));
    }
}
