//! Market data snapshots shared across crates.

use crate::decimal::Price;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Latest traded price for the symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ticker {
    /// Exchange timestamp (Unix ms).
    pub time: i64,
    pub symbol: String,
    pub last_price: Price,
}

/// One candlestick bar.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Kline {
    /// Bar open timestamp (Unix ms).
    pub time: i64,
    pub open: Price,
    pub high: Price,
    pub low: Price,
    pub close: Price,
    /// Volume in base units.
    pub volume: Decimal,
    /// Turnover in quote units.
    pub turnover: Decimal,
}
