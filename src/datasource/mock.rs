//! Mock marketplace for testing without network calls.

use super::{DataSourceError, MarketSource};
use crate::domain::{TimeMs, Transaction, TxKind};
use async_trait::async_trait;

/// Mock source that returns predefined transactions.
#[derive(Debug, Clone)]
pub struct MockSource {
    name: String,
    transactions: Vec<Transaction>,
    failure: Option<DataSourceError>,
}

impl MockSource {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            transactions: Vec::new(),
            failure: None,
        }
    }

    /// Add a transaction; its kind decides whether it is a sale or a buy.
    pub fn with_transaction(mut self, tx: Transaction) -> Self {
        self.transactions.push(tx);
        self
    }

    pub fn with_transactions(mut self, txs: Vec<Transaction>) -> Self {
        self.transactions.extend(txs);
        self
    }

    /// Make every fetch fail with `error`.
    pub fn failing(mut self, error: DataSourceError) -> Self {
        self.failure = Some(error);
        self
    }

    fn select(&self, kind: TxKind, start: TimeMs, end: TimeMs) -> Result<Vec<Transaction>, DataSourceError> {
        if let Some(err) = &self.failure {
            return Err(err.clone());
        }
        Ok(self
            .transactions
            .iter()
            .filter(|t| t.kind == kind && t.time_ms >= start && t.time_ms <= end)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl MarketSource for MockSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn get_sales(
        &self,
        start: TimeMs,
        end: TimeMs,
    ) -> Result<Vec<Transaction>, DataSourceError> {
        self.select(TxKind::Sell, start, end)
    }

    async fn get_buys(
        &self,
        start: TimeMs,
        end: TimeMs,
    ) -> Result<Vec<Transaction>, DataSourceError> {
        self.select(TxKind::Buy, start, end)
    }
}
