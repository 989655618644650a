//! Bounded kline series per interval.

use std::collections::VecDeque;
use trail_core::Kline;

/// Ring of the most recent `limit` bars for one interval.
///
/// A pushed bar replaces the last entry when the open timestamp matches
/// (streaming updates of the forming bar), otherwise it appends and the
/// oldest bar is evicted.
#[derive(Debug, Clone)]
pub struct KlineSeries {
    interval_min: u32,
    limit: usize,
    bars: VecDeque<Kline>,
}

impl KlineSeries {
    pub fn new(interval_min: u32, limit: usize) -> Self {
        Self {
            interval_min,
            limit,
            bars: VecDeque::with_capacity(limit),
        }
    }

    pub fn interval_min(&self) -> u32 {
        self.interval_min
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Seed from history, oldest first.
    pub fn seed(&mut self, bars: impl IntoIterator<Item = Kline>) {
        self.bars.clear();
        for bar in bars {
            self.push(bar);
        }
    }

    pub fn push(&mut self, bar: Kline) {
        if let Some(last) = self.bars.back_mut() {
            if last.time == bar.time {
                *last = bar;
                return;
            }
        }
        self.bars.push_back(bar);
        while self.bars.len() > self.limit {
            self.bars.pop_front();
        }
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    /// Whether enough history is loaded for indicator evaluation.
    pub fn is_full(&self) -> bool {
        self.bars.len() == self.limit
    }

    pub fn last(&self) -> Option<&Kline> {
        self.bars.back()
    }

    pub fn bars(&self) -> impl Iterator<Item = &Kline> {
        self.bars.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use trail_core::Price;

    fn bar(time: i64, close: rust_decimal::Decimal) -> Kline {
        Kline {
            time,
            open: Price::new(close),
            high: Price::new(close),
            low: Price::new(close),
            close: Price::new(close),
            volume: dec!(1),
            turnover: close,
        }
    }

    #[test]
    fn test_same_timestamp_replaces_forming_bar() {
        let mut series = KlineSeries::new(1, 10);
        series.push(bar(60_000, dec!(100)));
        series.push(bar(60_000, dec!(101)));

        assert_eq!(series.len(), 1);
        assert_eq!(series.last().unwrap().close.inner(), dec!(101));
    }

    #[test]
    fn test_eviction_beyond_limit() {
        let mut series = KlineSeries::new(1, 3);
        for i in 0..5 {
            series.push(bar(i * 60_000, dec!(100)));
        }
        assert_eq!(series.len(), 3);
        assert!(series.is_full());
        assert_eq!(series.bars().next().unwrap().time, 2 * 60_000);
    }

    #[test]
    fn test_seed_resets_contents() {
        let mut series = KlineSeries::new(1, 5);
        series.push(bar(0, dec!(1)));
        series.seed((0..5).map(|i| bar(i * 60_000, dec!(100))));
        assert_eq!(series.len(), 5);
    }
}
