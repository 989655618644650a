//! Indicator evaluation boundary.
//!
//! The bot treats technical-indicator mathematics as an external
//! collaborator: implementations of [`IndicatorEvaluator`] are wired in
//! at startup, and the decision engine only ever sees the resulting
//! [`IndicatorAdvice`].

use crate::klines::KlineSeries;
use rust_decimal::Decimal;

/// Advice produced for one kline interval.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct IndicatorAdvice {
    /// Aggregate advice value; the decision engine checks it against the
    /// configured `[minimum, maximum]` band.
    pub value: Decimal,
    /// Whether the series held enough history to evaluate.
    pub filled: bool,
}

/// Evaluates an indicator suite over one kline series.
pub trait IndicatorEvaluator: Send + Sync {
    fn evaluate(&self, series: &KlineSeries) -> IndicatorAdvice;
}

/// Neutral evaluator: reports zero advice once the series is full.
/// Stands in wherever no indicator suite is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct NeutralIndicator;

impl IndicatorEvaluator for NeutralIndicator {
    fn evaluate(&self, series: &KlineSeries) -> IndicatorAdvice {
        IndicatorAdvice {
            value: Decimal::ZERO,
            filled: series.is_full(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use trail_core::{Kline, Price};

    #[test]
    fn test_neutral_indicator_tracks_fill_state() {
        let mut series = KlineSeries::new(1, 2);
        let evaluator = NeutralIndicator;

        assert!(!evaluator.evaluate(&series).filled);

        for i in 0..2 {
            series.push(Kline {
                time: i * 60_000,
                open: Price::new(dec!(100)),
                high: Price::new(dec!(100)),
                low: Price::new(dec!(100)),
                close: Price::new(dec!(100)),
                volume: dec!(1),
                turnover: dec!(100),
            });
        }
        let advice = evaluator.evaluate(&series);
        assert!(advice.filled);
        assert_eq!(advice.value, Decimal::ZERO);
    }
}
