//! Canonical domain types shared by sources, engine and report sinks.
//!
//! This module provides:
//! - Lossless price handling via Decimal wrapper
//! - Domain primitives: TimeMs, TxKind
//! - Identity signatures correlating items across marketplaces
//! - Transaction and CompletedPair records
//! - Stable transaction ordering helpers

pub mod completed_pair;
pub mod decimal;
pub mod ordering;
pub mod primitives;
pub mod signature;
pub mod transaction;

pub use completed_pair::{CompletedPair, PairRecord, TradeLeg, UNMATCHED_SOURCE};
pub use decimal::Decimal;
pub use ordering::{sort_newest_first, sort_oldest_first, TxOrderingKey};
pub use primitives::{TimeMs, TxKind};
pub use signature::{extract_phase, resolve_pattern, Signature, WEAR_PRECISION};
pub use transaction::{ItemIdentity, Transaction, SETTLEMENT_CURRENCY};
