//! Matching sales to the purchases that funded them.
//!
//! Purchases are bucketed by [`Signature`]; each bucket is ordered once by
//! the configured [`MatchPolicy`]. Sales are then processed in caller order
//! and each takes the first purchase in its bucket that happened strictly
//! before it. A taken purchase leaves the pool for the rest of the run.

use crate::domain::{
    sort_newest_first, sort_oldest_first, CompletedPair, Decimal, Signature, TimeMs, TradeLeg,
    Transaction,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

/// Which eligible purchase a sale consumes when several qualify.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchPolicy {
    /// FIFO: the oldest purchase preceding the sale.
    OldestFirst,
    /// LIFO: the most recent purchase preceding the sale.
    NewestFirst,
}

/// Newest-first: a resold item is paired with its most recent acquisition.
pub const DEFAULT_MATCH_POLICY: MatchPolicy = MatchPolicy::NewestFirst;

impl Default for MatchPolicy {
    fn default() -> Self {
        DEFAULT_MATCH_POLICY
    }
}

impl std::str::FromStr for MatchPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "oldest_first" | "fifo" => Ok(MatchPolicy::OldestFirst),
            "newest_first" | "lifo" => Ok(MatchPolicy::NewestFirst),
            other => Err(format!(
                "must be oldest_first or newest_first, got {}",
                other
            )),
        }
    }
}

/// Per-run pool of unconsumed purchases, partitioned by signature.
#[derive(Debug)]
pub struct PurchasePool<'a> {
    buckets: HashMap<&'a Signature, Vec<&'a Transaction>>,
}

impl<'a> PurchasePool<'a> {
    pub fn new(buys: &'a [Transaction], policy: MatchPolicy) -> Self {
        let mut buckets: HashMap<&Signature, Vec<&Transaction>> = HashMap::new();
        for buy in buys {
            buckets.entry(buy.signature()).or_default().push(buy);
        }

        for bucket in buckets.values_mut() {
            match policy {
                MatchPolicy::OldestFirst => sort_oldest_first(bucket),
                MatchPolicy::NewestFirst => sort_newest_first(bucket),
            }
        }

        Self { buckets }
    }

    /// Remove and return the first purchase in bucket order that happened
    /// strictly before `before`.
    pub fn take_preceding(
        &mut self,
        signature: &Signature,
        before: TimeMs,
    ) -> Option<&'a Transaction> {
        let bucket = self.buckets.get_mut(signature)?;
        let index = bucket.iter().position(|buy| buy.time_ms < before)?;
        // Shift removal keeps the remaining bucket in policy order.
        Some(bucket.remove(index))
    }

    /// Number of purchases not yet consumed.
    pub fn remaining(&self) -> usize {
        self.buckets.values().map(Vec::len).sum()
    }
}

/// Realized profit and profit percent, both rounded to cents.
///
/// The percent is zero when the purchase price is zero.
pub fn compute_profit(sell_price: Decimal, buy_price: Decimal) -> (Decimal, Decimal) {
    let profit = (sell_price - buy_price).round2();
    let percent = (profit * Decimal::hundred())
        .checked_div(buy_price)
        .map(|p| p.round2())
        .unwrap_or_else(Decimal::zero);
    (profit, percent)
}

/// Greedy, single-pass sale-to-purchase matcher.
#[derive(Debug, Clone, Copy, Default)]
pub struct Reconciler {
    policy: MatchPolicy,
}

impl Reconciler {
    pub fn new(policy: MatchPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> MatchPolicy {
        self.policy
    }

    /// Produce one [`CompletedPair`] per sale, in the order of `sales`.
    pub fn reconcile(&self, sales: &[Transaction], buys: &[Transaction]) -> Vec<CompletedPair> {
        let mut pool = PurchasePool::new(buys, self.policy);
        let mut pairs = Vec::with_capacity(sales.len());

        for sale in sales {
            let funding = pool.take_preceding(sale.signature(), sale.time_ms);
            if funding.is_none() {
                debug!(signature = %sale.signature(), tx_id = %sale.tx_id, "No purchase found for sale");
            }
            pairs.push(pair_sale(sale, funding));
        }

        debug!(
            sales = sales.len(),
            buys = buys.len(),
            unconsumed = pool.remaining(),
            "Reconciliation finished"
        );
        pairs
    }
}

fn pair_sale(sale: &Transaction, funding: Option<&Transaction>) -> CompletedPair {
    let (profit, profit_percent) = match funding {
        Some(buy) => compute_profit(sale.price, buy.price),
        None => (Decimal::zero(), Decimal::zero()),
    };

    CompletedPair {
        item_name: sale.item_name.clone(),
        signature: sale.signature().clone(),
        sell: TradeLeg::from_transaction(sale),
        buy: funding.map(TradeLeg::from_transaction),
        profit,
        profit_percent,
        wear: sale.wear,
        pattern: sale.pattern,
        phase: sale.phase.clone(),
    }
}

/// Reconcile with the default policy.
pub fn reconcile(sales: &[Transaction], buys: &[Transaction]) -> Vec<CompletedPair> {
    Reconciler::new(DEFAULT_MATCH_POLICY).reconcile(sales, buys)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ItemIdentity, TxKind};

    fn d(s: &str) -> Decimal {
        Decimal::from_str_canonical(s).unwrap()
    }

    fn tx(kind: TxKind, name: &str, id: &str, price: &str, time_ms: i64) -> Transaction {
        Transaction::new(
            "Test",
            kind,
            id,
            "",
            ItemIdentity {
                name: name.to_string(),
                wear: 0.15,
                pattern: Some(42),
                phase: String::new(),
            },
            d(price),
            TimeMs::new(time_ms),
        )
    }

    #[test]
    fn test_compute_profit_rounds_to_cents() {
        assert_eq!(compute_profit(d("25.00"), d("10.50")), (d("14.50"), d("138.10")));
        assert_eq!(compute_profit(d("8"), d("10")), (d("-2"), d("-20")));
    }

    #[test]
    fn test_compute_profit_zero_buy_price() {
        assert_eq!(compute_profit(d("99"), Decimal::zero()), (d("99"), Decimal::zero()));
    }

    #[test]
    fn test_pool_take_preceding_is_strict() {
        let buys = vec![tx(TxKind::Buy, "X", "b1", "1", 1000)];
        let mut pool = PurchasePool::new(&buys, MatchPolicy::OldestFirst);
        let sig = buys[0].signature().clone();

        assert!(pool.take_preceding(&sig, TimeMs::new(1000)).is_none());
        assert_eq!(pool.remaining(), 1);
        assert_eq!(pool.take_preceding(&sig, TimeMs::new(1001)).unwrap().tx_id, "b1");
        assert_eq!(pool.remaining(), 0);
        assert!(pool.take_preceding(&sig, TimeMs::new(5000)).is_none());
    }

    #[test]
    fn test_pool_skips_later_purchases_in_bucket_order() {
        let buys = vec![
            tx(TxKind::Buy, "X", "late", "1", 3000),
            tx(TxKind::Buy, "X", "early", "1", 1000),
        ];
        let mut pool = PurchasePool::new(&buys, MatchPolicy::NewestFirst);
        let sig = buys[0].signature().clone();

        assert_eq!(pool.take_preceding(&sig, TimeMs::new(2000)).unwrap().tx_id, "early");
        assert_eq!(pool.remaining(), 1);
    }

    #[test]
    fn test_match_policy_parse() {
        assert_eq!("fifo".parse::<MatchPolicy>(), Ok(MatchPolicy::OldestFirst));
        assert_eq!("newest_first".parse::<MatchPolicy>(), Ok(MatchPolicy::NewestFirst));
        assert!("random".parse::<MatchPolicy>().is_err());
    }

    #[test]
    fn test_default_policy_is_newest_first() {
        assert_eq!(MatchPolicy::default(), MatchPolicy::NewestFirst);
        assert_eq!(Reconciler::default().policy(), MatchPolicy::NewestFirst);
    }

    #[test]
    fn test_sales_are_never_merged() {
        let buys = vec![tx(TxKind::Buy, "X", "b1", "1", 0)];
        let sales = vec![
            tx(TxKind::Sell, "X", "s1", "2", 10),
            tx(TxKind::Sell, "X", "s2", "3", 20),
        ];
        let pairs = reconcile(&sales, &buys);
        assert_eq!(pairs.len(), 2);
        assert!(pairs[0].is_matched());
        assert!(!pairs[1].is_matched());
        assert_eq!(pairs[1].sell.tx_id, "s2");
    }
}
