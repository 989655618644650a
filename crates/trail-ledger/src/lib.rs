//! Buy-lot ledger for trailbot.
//!
//! Owns the set of recorded buy fills, keyed uniquely by client link id,
//! persists them with atomic full-file replacement, and reconciles local
//! totals against exchange holdings (rebalance). Also hosts the
//! append-only revenue log written on every closed sell.

pub mod error;
pub mod revenue;
pub mod store;

pub use error::{LedgerError, Result};
pub use revenue::{RevenueLog, RevenueRecord, RevenueSides};
pub use store::Ledger;
