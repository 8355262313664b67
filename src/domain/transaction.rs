//! Canonical marketplace transaction.

use crate::domain::{Decimal, Signature, TimeMs, TxKind};
use serde::Serialize;

/// Settlement currency every source normalizes prices into.
pub const SETTLEMENT_CURRENCY: &str = "USD";

/// A single normalized buy or sale of one item instance.
///
/// Built only through [`Transaction::new`], so the signature always agrees
/// with the identity fields.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Transaction {
    pub source: String,
    #[serde(rename = "type")]
    pub kind: TxKind,
    pub tx_id: String,
    pub asset_id: String,
    pub item_name: String,
    pub price: Decimal,
    pub currency: String,
    #[serde(rename = "date")]
    pub time_ms: TimeMs,
    #[serde(rename = "float_value")]
    pub wear: f64,
    pub phase: String,
    pub pattern: Option<u32>,
    signature: Signature,
}

/// Identity fields of an item; the input to signature computation.
#[derive(Debug, Clone, PartialEq)]
pub struct ItemIdentity {
    pub name: String,
    pub wear: f64,
    pub pattern: Option<u32>,
    pub phase: String,
}

impl Transaction {
    /// Create a transaction priced in the settlement currency.
    pub fn new(
        source: impl Into<String>,
        kind: TxKind,
        tx_id: impl Into<String>,
        asset_id: impl Into<String>,
        item: ItemIdentity,
        price: Decimal,
        time_ms: TimeMs,
    ) -> Self {
        let signature = Signature::compute(&item.name, item.wear, item.pattern);
        Transaction {
            source: source.into(),
            kind,
            tx_id: tx_id.into(),
            asset_id: asset_id.into(),
            item_name: item.name,
            price,
            currency: SETTLEMENT_CURRENCY.to_string(),
            time_ms,
            wear: item.wear,
            phase: item.phase,
            pattern: item.pattern,
            signature,
        }
    }

    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    pub fn is_buy(&self) -> bool {
        self.kind == TxKind::Buy
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(pattern: Option<u32>) -> ItemIdentity {
        ItemIdentity {
            name: "AWP | Dragon Lore (Factory New)".to_string(),
            wear: 0.0123,
            pattern,
            phase: String::new(),
        }
    }

    #[test]
    fn test_new_derives_signature() {
        let tx = Transaction::new(
            "CSFloat",
            TxKind::Buy,
            "t1",
            "a1",
            item(Some(7)),
            Decimal::from_str_canonical("10").unwrap(),
            TimeMs::new(1000),
        );
        assert_eq!(
            tx.signature().as_str(),
            "AWP | Dragon Lore (Factory New)|0.01230000|7"
        );
        assert_eq!(tx.currency, "USD");
        assert!(tx.is_buy());
    }

    #[test]
    fn test_same_item_from_two_sources_correlates() {
        let price = Decimal::from_str_canonical("10").unwrap();
        let a = Transaction::new("DMarket", TxKind::Buy, "x", "1", item(None), price, TimeMs::new(1));
        let b = Transaction::new("CSMoney", TxKind::Sell, "y", "2", item(None), price, TimeMs::new(2));
        assert_eq!(a.signature(), b.signature());
    }

    #[test]
    fn test_serialized_field_names() {
        let tx = Transaction::new(
            "Youpin",
            TxKind::Sell,
            "t",
            "a",
            item(None),
            Decimal::zero(),
            TimeMs::new(5),
        );
        let json = serde_json::to_value(&tx).unwrap();
        assert_eq!(json["type"], "SELL");
        assert_eq!(json["date"], 5);
        assert!(json["pattern"].is_null());
        assert!(json["signature"].is_string());
    }
}
