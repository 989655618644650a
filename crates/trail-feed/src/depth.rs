//! Order-book depth advice.
//!
//! Measures buy pressure as the share of resting bid quantity within a
//! configured percentage band around spot, optionally averaged over a
//! trailing time window to smooth book flicker.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use trail_core::Price;

/// One price level of the book.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BookLevel {
    pub price: Price,
    pub qty: Decimal,
}

/// Depth tracker configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DepthConfig {
    /// Band half-width in percent of spot.
    pub depth_pct: Decimal,
    /// Number of snapshots kept.
    pub limit: usize,
    /// Average over `timeframe_ms` instead of using the latest snapshot.
    pub average: bool,
    pub timeframe_ms: i64,
}

impl Default for DepthConfig {
    fn default() -> Self {
        Self {
            depth_pct: Decimal::new(1, 1), // 0.1 %
            limit: 100,
            average: false,
            timeframe_ms: 10_000,
        }
    }
}

/// Buy/sell pressure within the depth band.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DepthAdvice {
    pub buy_pct: Decimal,
    pub sell_pct: Decimal,
}

/// Bounded history of depth measurements.
#[derive(Debug)]
pub struct DepthTracker {
    config: DepthConfig,
    history: VecDeque<(i64, Decimal, Decimal)>,
}

impl DepthTracker {
    pub fn new(config: DepthConfig) -> Self {
        Self {
            config,
            history: VecDeque::new(),
        }
    }

    /// Ingest one book snapshot and return the current advice.
    pub fn ingest(
        &mut self,
        now_ms: i64,
        spot: Price,
        bids: &[BookLevel],
        asks: &[BookLevel],
    ) -> DepthAdvice {
        let band = spot.inner() * (Decimal::TWO * self.config.depth_pct) / Decimal::from(100);
        let lower = spot.inner() - band;
        let upper = spot.inner() + band;

        let bid_qty: Decimal = bids
            .iter()
            .filter(|level| level.price.inner() >= lower && level.price.inner() <= spot.inner())
            .map(|level| level.qty)
            .sum();
        let ask_qty: Decimal = asks
            .iter()
            .filter(|level| level.price.inner() >= spot.inner() && level.price.inner() <= upper)
            .map(|level| level.qty)
            .sum();

        let total = bid_qty + ask_qty;
        let (buy_pct, sell_pct) = if total.is_zero() {
            (Decimal::ZERO, Decimal::ZERO)
        } else {
            let hundred = Decimal::from(100);
            (bid_qty / total * hundred, ask_qty / total * hundred)
        };

        self.history.push_back((now_ms, buy_pct, sell_pct));
        while self.history.len() > self.config.limit {
            self.history.pop_front();
        }

        if self.config.average {
            self.averaged(now_ms)
        } else {
            DepthAdvice { buy_pct, sell_pct }
        }
    }

    fn averaged(&self, now_ms: i64) -> DepthAdvice {
        let cutoff = now_ms - self.config.timeframe_ms;
        let mut buy = Decimal::ZERO;
        let mut sell = Decimal::ZERO;
        let mut count = 0u32;
        for &(time, b, s) in self.history.iter().rev() {
            if time < cutoff {
                break;
            }
            buy += b;
            sell += s;
            count += 1;
        }
        if count == 0 {
            return DepthAdvice::default();
        }
        let n = Decimal::from(count);
        DepthAdvice {
            buy_pct: buy / n,
            sell_pct: sell / n,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn level(price: Decimal, qty: Decimal) -> BookLevel {
        BookLevel {
            price: Price::new(price),
            qty,
        }
    }

    #[test]
    fn test_pressure_within_band() {
        let mut tracker = DepthTracker::new(DepthConfig {
            depth_pct: dec!(1),
            ..Default::default()
        });
        // Band at spot 100 with 1% depth: 98..102.
        let advice = tracker.ingest(
            0,
            Price::new(dec!(100)),
            &[level(dec!(99), dec!(3)), level(dec!(90), dec!(100))],
            &[level(dec!(101), dec!(1)), level(dec!(110), dec!(100))],
        );
        // In-band: 3 bid vs 1 ask.
        assert_eq!(advice.buy_pct, dec!(75));
        assert_eq!(advice.sell_pct, dec!(25));
    }

    #[test]
    fn test_empty_band_is_zero() {
        let mut tracker = DepthTracker::new(DepthConfig::default());
        let advice = tracker.ingest(0, Price::new(dec!(100)), &[], &[]);
        assert_eq!(advice.buy_pct, Decimal::ZERO);
    }

    #[test]
    fn test_averaging_over_timeframe() {
        let mut tracker = DepthTracker::new(DepthConfig {
            depth_pct: dec!(1),
            average: true,
            timeframe_ms: 10_000,
            ..Default::default()
        });
        tracker.ingest(
            0,
            Price::new(dec!(100)),
            &[level(dec!(100), dec!(1))],
            &[level(dec!(100), dec!(1))],
        );
        let advice = tracker.ingest(
            5_000,
            Price::new(dec!(100)),
            &[level(dec!(100), dec!(3))],
            &[level(dec!(100), dec!(1))],
        );
        // Average of 50% and 75%.
        assert_eq!(advice.buy_pct, dec!(62.5));
    }
}
