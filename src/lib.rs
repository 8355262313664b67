pub mod config;
pub mod datasource;
pub mod domain;
pub mod engine;
pub mod error;
pub mod orchestration;
pub mod report;

pub use config::{Config, Secrets};
pub use datasource::{DataSourceError, MarketSource, MockSource, RateProvider, TimeWindow};
pub use domain::{
    CompletedPair, Decimal, ItemIdentity, Signature, TimeMs, Transaction, TxKind,
};
pub use engine::{reconcile, MatchPolicy, ReconcileSummary, Reconciler};
pub use error::AppError;
