//! Buy lots: recorded buy fills awaiting a profitable sell.

use crate::decimal::{Price, Qty};
use crate::order::{ClientOrderId, OrderKind, OrderSide};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Local lifecycle state of a lot.
///
/// `Open` while the placing buy order is still working on the exchange,
/// `Closed` once the fill is confirmed. Only closed lots are eligible
/// for sell selection; a closed lot is immutable except for removal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LotStatus {
    Open,
    Closed,
}

/// One recorded buy fill, persisted in the ledger.
///
/// Field names mirror the on-disk JSON format, which in turn mirrors the
/// exchange's order schema so a lot can be rebuilt from an order snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuyLot {
    /// Exchange-assigned order id. Can repeat across retries; never used
    /// as the ledger key.
    pub order_id: String,
    /// Client-generated label, the unique ledger key.
    pub order_link_id: ClientOrderId,
    /// Order creation timestamp (Unix ms).
    pub created_time: i64,
    /// Last update timestamp (Unix ms).
    pub updated_time: i64,
    /// Instrument symbol.
    pub symbol: String,
    /// Always `Buy` for a lot; kept for the revenue log.
    pub side: OrderSide,
    /// Order type on the exchange.
    pub order_type: OrderKind,
    /// Local lifecycle state.
    pub status: LotStatus,
    /// Requested price (trigger orders report the trigger reference).
    pub price: Price,
    /// Average fill price in quote units.
    pub avg_price: Price,
    /// Requested quantity in base units.
    pub qty: Qty,
    /// Cumulative executed quantity in base units.
    pub cum_exec_qty: Qty,
    /// Cumulative executed value in quote units.
    pub cum_exec_value: Decimal,
    /// Cumulative executed fee in base units.
    pub cum_exec_fee: Decimal,
    /// Trigger price the order was resting at.
    pub trigger_price: Price,
}

impl BuyLot {
    /// Price at which this lot turns profitable given the minimum profit
    /// percentage and the active trigger distance.
    pub fn profitable_price(&self, profit_pct: Decimal, distance_pct: Decimal) -> Price {
        self.avg_price.offset_up_pct(profit_pct + distance_pct)
    }

    /// Whether a sell at `spot` clears the profitability threshold.
    pub fn is_profitable_at(&self, spot: Price, profit_pct: Decimal, distance_pct: Decimal) -> bool {
        spot >= self.profitable_price(profit_pct, distance_pct)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    pub(crate) fn sample_lot(link: &str, avg_price: Decimal, qty: Decimal) -> BuyLot {
        BuyLot {
            order_id: format!("oid-{link}"),
            order_link_id: ClientOrderId::new(link),
            created_time: 1_700_000_000_000,
            updated_time: 1_700_000_000_000,
            symbol: "BTC_USDC".to_string(),
            side: OrderSide::Buy,
            order_type: OrderKind::StopMarket,
            status: LotStatus::Closed,
            price: Price::new(avg_price),
            avg_price: Price::new(avg_price),
            qty: Qty::new(qty),
            cum_exec_qty: Qty::new(qty),
            cum_exec_value: avg_price * qty,
            cum_exec_fee: Decimal::ZERO,
            trigger_price: Price::new(avg_price),
        }
    }

    #[test]
    fn test_profitable_price() {
        let lot = sample_lot("a", dec!(100), dec!(1));
        // profit 1% + distance 0.5% => 101.5
        assert_eq!(lot.profitable_price(dec!(1), dec!(0.5)).0, dec!(101.5));
    }

    #[test]
    fn test_is_profitable_at() {
        let lot = sample_lot("a", dec!(105), dec!(1));
        // 105 * 1.015 = 106.575
        assert!(lot.is_profitable_at(Price::new(dec!(107)), dec!(1), dec!(0.5)));
        assert!(!lot.is_profitable_at(Price::new(dec!(106.5)), dec!(1), dec!(0.5)));
    }

    #[test]
    fn test_lot_serde_round_trip() {
        let lot = sample_lot("a", dec!(100), dec!(0.002));
        let json = serde_json::to_string(&lot).unwrap();
        assert!(json.contains("orderLinkId"));
        assert!(json.contains("cumExecQty"));
        let back: BuyLot = serde_json::from_str(&json).unwrap();
        assert_eq!(back, lot);
    }
}
