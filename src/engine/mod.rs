//! Pure, synchronous reconciliation of sales against purchases.
//!
//! The engine performs no I/O and cannot fail: a sale without an eligible
//! purchase is a defined output state, not an error.

pub mod reconciler;
pub mod summary;

pub use reconciler::{
    compute_profit, reconcile, MatchPolicy, PurchasePool, Reconciler, DEFAULT_MATCH_POLICY,
};
pub use summary::ReconcileSummary;
