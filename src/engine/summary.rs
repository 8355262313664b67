use crate::domain::{CompletedPair, Decimal};
use serde::Serialize;

/// Aggregate view of one reconciliation run.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct ReconcileSummary {
    pub sales: usize,
    pub matched: usize,
    pub unmatched: usize,
    /// Sum of realized profit over matched pairs.
    pub total_profit: Decimal,
}

impl ReconcileSummary {
    pub fn from_pairs(pairs: &[CompletedPair]) -> Self {
        let matched = pairs.iter().filter(|p| p.is_matched()).count();
        Self {
            sales: pairs.len(),
            matched,
            unmatched: pairs.len() - matched,
            total_profit: pairs.iter().map(|p| p.profit).sum(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ItemIdentity, TimeMs, Transaction, TxKind};
    use crate::engine::reconcile;

    fn tx(kind: TxKind, id: &str, price: &str, time_ms: i64) -> Transaction {
        Transaction::new(
            "Test",
            kind,
            id,
            "",
            ItemIdentity {
                name: "Sticker | Crown (Foil)".to_string(),
                wear: 0.0,
                pattern: None,
                phase: String::new(),
            },
            Decimal::from_str_canonical(price).unwrap(),
            TimeMs::new(time_ms),
        )
    }

    #[test]
    fn test_summary_counts_and_total() {
        let buys = vec![tx(TxKind::Buy, "b1", "100", 1), tx(TxKind::Buy, "b2", "50", 2)];
        let sales = vec![
            tx(TxKind::Sell, "s1", "120", 10),
            tx(TxKind::Sell, "s2", "45", 11),
            tx(TxKind::Sell, "s3", "80", 12),
        ];
        let summary = ReconcileSummary::from_pairs(&reconcile(&sales, &buys));

        assert_eq!(summary.sales, 3);
        assert_eq!(summary.matched, 2);
        assert_eq!(summary.unmatched, 1);
        // Newest-first: s1 takes b2 (+70), s2 takes b1 (-55).
        assert_eq!(summary.total_profit, Decimal::from_str_canonical("15").unwrap());
    }

    #[test]
    fn test_summary_empty() {
        assert_eq!(ReconcileSummary::from_pairs(&[]), ReconcileSummary::default());
    }
}
