//! Trade-flow advice.
//!
//! Tracks recent public trades and reports the buy-volume share within
//! a trailing timeframe.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use trail_core::{OrderSide, Price};

/// One public trade.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Trade {
    pub time: i64,
    pub side: OrderSide,
    pub qty: Decimal,
    pub price: Price,
}

/// Flow tracker configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowConfig {
    /// Number of trades kept.
    pub limit: usize,
    /// Trailing window for the ratio.
    pub timeframe_ms: i64,
}

impl Default for FlowConfig {
    fn default() -> Self {
        Self {
            limit: 500,
            timeframe_ms: 60_000,
        }
    }
}

/// Buy/sell volume share over the trailing timeframe, in percent.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FlowAdvice {
    pub buy_ratio: Decimal,
    pub sell_ratio: Decimal,
}

/// Bounded recent-trade buffer.
#[derive(Debug)]
pub struct FlowTracker {
    config: FlowConfig,
    trades: VecDeque<Trade>,
}

impl FlowTracker {
    pub fn new(config: FlowConfig) -> Self {
        Self {
            config,
            trades: VecDeque::new(),
        }
    }

    pub fn ingest(&mut self, trades: &[Trade]) {
        for &trade in trades {
            self.trades.push_back(trade);
        }
        while self.trades.len() > self.config.limit {
            self.trades.pop_front();
        }
    }

    pub fn len(&self) -> usize {
        self.trades.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trades.is_empty()
    }

    /// Volume-weighted buy share of trades inside the timeframe ending
    /// at `now_ms`.
    pub fn advice(&self, now_ms: i64) -> FlowAdvice {
        let cutoff = now_ms - self.config.timeframe_ms;
        let mut buy = Decimal::ZERO;
        let mut sell = Decimal::ZERO;
        for trade in self.trades.iter().rev() {
            if trade.time < cutoff {
                break;
            }
            match trade.side {
                OrderSide::Buy => buy += trade.qty,
                OrderSide::Sell => sell += trade.qty,
            }
        }
        let total = buy + sell;
        if total.is_zero() {
            return FlowAdvice::default();
        }
        let hundred = Decimal::from(100);
        FlowAdvice {
            buy_ratio: buy / total * hundred,
            sell_ratio: sell / total * hundred,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn trade(time: i64, side: OrderSide, qty: Decimal) -> Trade {
        Trade {
            time,
            side,
            qty,
            price: Price::new(dec!(100)),
        }
    }

    #[test]
    fn test_buy_ratio_within_timeframe() {
        let mut tracker = FlowTracker::new(FlowConfig {
            limit: 10,
            timeframe_ms: 1_000,
        });
        tracker.ingest(&[
            // Outside the window, ignored.
            trade(0, OrderSide::Sell, dec!(100)),
            trade(9_500, OrderSide::Buy, dec!(3)),
            trade(9_800, OrderSide::Sell, dec!(1)),
        ]);
        let advice = tracker.advice(10_000);
        assert_eq!(advice.buy_ratio, dec!(75));
        assert_eq!(advice.sell_ratio, dec!(25));
    }

    #[test]
    fn test_buffer_bounded_by_limit() {
        let mut tracker = FlowTracker::new(FlowConfig {
            limit: 3,
            timeframe_ms: 1_000_000,
        });
        for i in 0..10 {
            tracker.ingest(&[trade(i, OrderSide::Buy, dec!(1))]);
        }
        assert_eq!(tracker.len(), 3);
    }

    #[test]
    fn test_no_trades_is_neutral() {
        let tracker = FlowTracker::new(FlowConfig::default());
        assert_eq!(tracker.advice(1_000), FlowAdvice::default());
    }
}
