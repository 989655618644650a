//! Instrument constraints and compounding state.

use crate::decimal::{Price, Qty};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Compounding state: grows the minimum buy size as the bot's total
/// value grows past its starting value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Compounding {
    pub enabled: bool,
    /// Bot value in quote units when the bot started.
    pub start: Decimal,
    /// Current bot value in quote units, updated from wallet reports.
    pub now: Decimal,
}

impl Compounding {
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            start: Decimal::ZERO,
            now: Decimal::ZERO,
        }
    }

    /// Sizing ratio. Only compounds when profitable; never shrinks the
    /// minimum below its configured base.
    pub fn ratio(&self) -> Decimal {
        if self.enabled && self.start > Decimal::ZERO && self.now > self.start {
            self.now / self.start
        } else {
            Decimal::ONE
        }
    }
}

/// Exchange-reported trading constraints for the traded symbol.
///
/// Refreshed periodically by the housekeeping task; the derived
/// `min_buy_*` fields are adjusted for the order multiplier and
/// compounding on every refresh and before every buy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstrumentInfo {
    pub symbol: String,
    /// Base asset, e.g. BTC in BTC_USDC.
    pub base_coin: String,
    /// Quote asset, e.g. USDC in BTC_USDC.
    pub quote_coin: String,
    /// Whether the symbol is currently trading.
    pub active: bool,
    /// Smallest base-quantity increment.
    pub base_precision: Qty,
    /// Smallest quote increment.
    pub quote_precision: Price,
    /// Smallest price increment.
    pub tick_size: Price,
    /// Minimum order quantity in base units.
    pub min_order_qty: Qty,
    /// Minimum buy size in base units after multiplier and compounding.
    pub min_buy_base: Qty,
    /// Minimum buy value in quote units after multiplier and compounding.
    pub min_buy_quote: Decimal,
    /// Unix ms of the last refresh.
    pub refreshed_at: i64,
}

impl InstrumentInfo {
    /// Recompute `min_buy_base` / `min_buy_quote` from the exchange minimum,
    /// the configured multiplier, and the compounding ratio.
    ///
    /// Rounds up so the derived sizes always satisfy the exchange minimum.
    pub fn recalculate(&mut self, spot: Price, multiplier: Decimal, compounding: &Compounding) {
        let ratio = compounding.ratio();
        let base = Qty::new(self.min_order_qty.inner() * multiplier * ratio);
        let quote = self.min_order_qty.inner() * spot.inner() * multiplier * ratio;

        self.min_buy_base = base.round_up_to(self.base_precision);
        self.min_buy_quote = Price::new(quote).round_up_to(self.quote_precision).inner();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn sample_info() -> InstrumentInfo {
        InstrumentInfo {
            symbol: "BTC_USDC".to_string(),
            base_coin: "BTC".to_string(),
            quote_coin: "USDC".to_string(),
            active: true,
            base_precision: Qty::new(dec!(0.0001)),
            quote_precision: Price::new(dec!(0.01)),
            tick_size: Price::new(dec!(0.1)),
            min_order_qty: Qty::new(dec!(0.0001)),
            min_buy_base: Qty::ZERO,
            min_buy_quote: Decimal::ZERO,
            refreshed_at: 0,
        }
    }

    #[test]
    fn test_compounding_ratio_only_when_profitable() {
        let mut c = Compounding {
            enabled: true,
            start: dec!(1000),
            now: dec!(1100),
        };
        assert_eq!(c.ratio(), dec!(1.1));

        c.now = dec!(900);
        assert_eq!(c.ratio(), Decimal::ONE);

        c.enabled = false;
        c.now = dec!(2000);
        assert_eq!(c.ratio(), Decimal::ONE);
    }

    #[test]
    fn test_recalculate_applies_multiplier_and_rounds_up() {
        let mut info = sample_info();
        let compounding = Compounding::disabled();
        info.recalculate(Price::new(dec!(50000)), dec!(1.5), &compounding);

        // 0.0001 * 1.5 = 0.00015 -> rounds up to 0.0002
        assert_eq!(info.min_buy_base.inner(), dec!(0.0002));
        // 0.0001 * 50000 * 1.5 = 7.5
        assert_eq!(info.min_buy_quote, dec!(7.5));
    }

    #[test]
    fn test_recalculate_with_compounding() {
        let mut info = sample_info();
        let compounding = Compounding {
            enabled: true,
            start: dec!(1000),
            now: dec!(2000),
        };
        info.recalculate(Price::new(dec!(50000)), dec!(1), &compounding);

        // 0.0001 * 2.0 = 0.0002
        assert_eq!(info.min_buy_base.inner(), dec!(0.0002));
    }
}
