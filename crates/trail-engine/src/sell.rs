//! Sell candidate selection.
//!
//! Scans the ledger for closed lots that clear the profitability
//! threshold at the current spot price, gated by the sell price limits.

use crate::buy::PriceLimits;
use rust_decimal::Decimal;
use tracing::info;
use trail_core::{BuyLot, ClientOrderId, LotStatus, Price, Qty};

/// Result of one sell scan.
#[derive(Debug, Clone, PartialEq)]
pub struct SellScan {
    /// Link ids of the profitable lots.
    pub lots: Vec<ClientOrderId>,
    /// Summed quantity, rounded down to base precision.
    pub qty: Qty,
    /// Profitable lots exist and the price limits allow selling.
    pub can_sell: bool,
    /// When nothing qualifies: how much further spot must rise before the
    /// nearest lot turns profitable, in quote units.
    pub rise_to: Option<Decimal>,
}

/// Scan `lots` for profitable sells at `spot`.
///
/// A lot qualifies when it is closed and
/// `avg_price * (1 + (profit + distance) / 100) <= spot`.
pub fn scan_sells(
    spot: Price,
    profit_pct: Decimal,
    distance_pct: Decimal,
    lots: &[BuyLot],
    limits: &PriceLimits,
    base_precision: Qty,
) -> SellScan {
    let mut selected = Vec::new();
    let mut qty = Qty::ZERO;
    let mut nearest: Option<Decimal> = None;

    for lot in lots {
        if lot.status != LotStatus::Closed {
            continue;
        }
        let threshold = lot.profitable_price(profit_pct, distance_pct);
        let gap = threshold.inner() - spot.inner();
        nearest = Some(match nearest {
            Some(n) => n.min(gap),
            None => gap,
        });
        if spot >= threshold {
            qty = qty + lot.cum_exec_qty;
            selected.push(lot.order_link_id.clone());
        }
    }

    let qty = qty.round_down_to(base_precision);
    let pre_sell = !selected.is_empty() && qty.is_positive();

    let (limit_ok, limit_reason) = limits.sell_allowed(spot);
    let can_sell = pre_sell && limit_ok;

    if pre_sell && !limit_ok {
        info!(
            candidates = selected.len(),
            reason = limit_reason.as_deref().unwrap_or(""),
            "Profitable lots exist but the sell price limit blocks selling"
        );
    }

    SellScan {
        lots: selected,
        qty,
        can_sell,
        rise_to: if can_sell { None } else { nearest.filter(|n| *n > Decimal::ZERO) },
    }
}
