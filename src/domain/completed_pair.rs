//! A sale merged with the purchase that funded it.

use crate::domain::{Decimal, Signature, TimeMs, Transaction};
use serde::Serialize;

/// Source label written for the buy leg of an unmatched sale.
pub const UNMATCHED_SOURCE: &str = "N/A";

/// One side of a completed pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TradeLeg {
    pub source: String,
    pub price: Decimal,
    pub time_ms: TimeMs,
    pub tx_id: String,
}

impl TradeLeg {
    pub fn from_transaction(tx: &Transaction) -> Self {
        Self {
            source: tx.source.clone(),
            price: tx.price,
            time_ms: tx.time_ms,
            tx_id: tx.tx_id.clone(),
        }
    }
}

/// Reconciliation output: exactly one per input sale.
///
/// `buy` is `None` when no eligible purchase was found; profit fields are
/// zero in that case.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(into = "PairRecord")]
pub struct CompletedPair {
    pub item_name: String,
    pub signature: Signature,
    pub sell: TradeLeg,
    pub buy: Option<TradeLeg>,
    pub profit: Decimal,
    pub profit_percent: Decimal,
    pub wear: f64,
    pub pattern: Option<u32>,
    pub phase: String,
}

impl CompletedPair {
    pub fn is_matched(&self) -> bool {
        self.buy.is_some()
    }

    pub fn to_record(&self) -> PairRecord {
        PairRecord::from(self.clone())
    }
}

/// Flat, stably named view of a [`CompletedPair`] for file sinks.
///
/// Every field is always present; an absent buy leg is written as source
/// `N/A`, price 0, null time and an empty tx id.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PairRecord {
    pub item_name: String,
    pub buy_source: String,
    pub buy_price: Decimal,
    pub buy_time: Option<TimeMs>,
    pub buy_tx_id: String,
    pub sell_source: String,
    pub sell_price: Decimal,
    pub sell_time: TimeMs,
    pub sell_tx_id: String,
    pub profit: Decimal,
    pub profit_percent: Decimal,
    pub signature: Signature,
    pub float_value: f64,
    pub phase: String,
    pub pattern: Option<u32>,
}

impl From<CompletedPair> for PairRecord {
    fn from(pair: CompletedPair) -> Self {
        let (buy_source, buy_price, buy_time, buy_tx_id) = match pair.buy {
            Some(leg) => (leg.source, leg.price, Some(leg.time_ms), leg.tx_id),
            None => (
                UNMATCHED_SOURCE.to_string(),
                Decimal::zero(),
                None,
                String::new(),
            ),
        };

        PairRecord {
            item_name: pair.item_name,
            buy_source,
            buy_price,
            buy_time,
            buy_tx_id,
            sell_source: pair.sell.source,
            sell_price: pair.sell.price,
            sell_time: pair.sell.time_ms,
            sell_tx_id: pair.sell.tx_id,
            profit: pair.profit,
            profit_percent: pair.profit_percent,
            signature: pair.signature,
            float_value: pair.wear,
            phase: pair.phase,
            pattern: pair.pattern,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unmatched() -> CompletedPair {
        CompletedPair {
            item_name: "Glove Case".to_string(),
            signature: Signature::compute("Glove Case", 0.0, None),
            sell: TradeLeg {
                source: "DMarket".to_string(),
                price: Decimal::from_str_canonical("5").unwrap(),
                time_ms: TimeMs::new(1000),
                tx_id: "s1".to_string(),
            },
            buy: None,
            profit: Decimal::zero(),
            profit_percent: Decimal::zero(),
            wear: 0.0,
            pattern: None,
            phase: String::new(),
        }
    }

    #[test]
    fn test_unmatched_record_has_every_buy_field() {
        let json = serde_json::to_value(unmatched()).unwrap();
        let obj = json.as_object().unwrap();
        for key in ["buy_source", "buy_price", "buy_time", "buy_tx_id"] {
            assert!(obj.contains_key(key), "missing {}", key);
        }
        assert_eq!(json["buy_source"], "N/A");
        assert_eq!(json["buy_price"], 0.0);
        assert!(json["buy_time"].is_null());
        assert_eq!(json["buy_tx_id"], "");
        assert_eq!(json["sell_tx_id"], "s1");
    }

    #[test]
    fn test_to_record_matches_serde_view() {
        let pair = unmatched();
        assert_eq!(
            serde_json::to_value(pair.to_record()).unwrap(),
            serde_json::to_value(&pair).unwrap()
        );
        assert!(!pair.is_matched());
    }
}
