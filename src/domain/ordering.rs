//! Stable transaction ordering for deterministic processing.

use crate::domain::{TimeMs, Transaction};
use std::cmp::Ordering;

/// Stable ordering key for transactions.
///
/// Ensures deterministic ordering of transactions sharing a timestamp.
/// Ordering: time_ms -> source -> tx_id
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct TxOrderingKey<'a> {
    /// Time in milliseconds (primary sort).
    pub time_ms: TimeMs,
    /// Marketplace name (secondary sort).
    pub source: &'a str,
    /// Source-native transaction id (tertiary sort).
    pub tx_id: &'a str,
}

impl<'a> TxOrderingKey<'a> {
    pub fn from_tx(tx: &'a Transaction) -> Self {
        TxOrderingKey {
            time_ms: tx.time_ms,
            source: &tx.source,
            tx_id: &tx.tx_id,
        }
    }

    pub fn compare(a: &Transaction, b: &Transaction) -> Ordering {
        TxOrderingKey::from_tx(a).cmp(&TxOrderingKey::from_tx(b))
    }
}

/// Sort oldest first.
pub fn sort_oldest_first<T: AsRef<Transaction>>(txs: &mut [T]) {
    txs.sort_by(|a, b| TxOrderingKey::compare(a.as_ref(), b.as_ref()));
}

/// Sort newest first; the exact reverse of [`sort_oldest_first`].
pub fn sort_newest_first<T: AsRef<Transaction>>(txs: &mut [T]) {
    txs.sort_by(|a, b| TxOrderingKey::compare(b.as_ref(), a.as_ref()));
}

impl AsRef<Transaction> for Transaction {
    fn as_ref(&self) -> &Transaction {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Decimal, ItemIdentity, TxKind};

    fn tx(source: &str, tx_id: &str, time_ms: i64) -> Transaction {
        Transaction::new(
            source,
            TxKind::Buy,
            tx_id,
            "",
            ItemIdentity {
                name: "Item".to_string(),
                wear: 0.1,
                pattern: Some(1),
                phase: String::new(),
            },
            Decimal::zero(),
            TimeMs::new(time_ms),
        )
    }

    #[test]
    fn test_sort_oldest_first_breaks_ties_by_source_then_id() {
        let mut txs = vec![
            tx("DMarket", "b", 1000),
            tx("CSFloat", "z", 1000),
            tx("DMarket", "a", 1000),
            tx("Youpin", "a", 500),
        ];
        sort_oldest_first(&mut txs);
        let order: Vec<_> = txs.iter().map(|t| (t.source.as_str(), t.tx_id.as_str())).collect();
        assert_eq!(
            order,
            vec![("Youpin", "a"), ("CSFloat", "z"), ("DMarket", "a"), ("DMarket", "b")]
        );
    }

    #[test]
    fn test_compare_independent_borrows() {
        let older = tx("CSFloat", "1", 100);
        let key_holder = vec![tx("CSFloat", "2", 100)];
        assert_eq!(TxOrderingKey::compare(&older, &key_holder[0]), Ordering::Less);
        assert_eq!(TxOrderingKey::compare(&key_holder[0], &older), Ordering::Greater);
        assert_eq!(TxOrderingKey::compare(&older, &older.clone()), Ordering::Equal);
    }

    #[test]
    fn test_sort_newest_first_is_reverse() {
        let mut a = vec![tx("S", "1", 3), tx("S", "2", 1), tx("S", "3", 2), tx("T", "0", 2)];
        let mut b = a.clone();
        sort_oldest_first(&mut a);
        sort_newest_first(&mut b);
        a.reverse();
        assert_eq!(a, b);
    }
}
