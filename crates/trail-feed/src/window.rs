//! Rolling spot-price window.

use rust_decimal::Decimal;
use std::collections::VecDeque;
use trail_core::Price;

/// Time-bounded rolling window of `(timestamp, price)` ticks.
///
/// Append-only; entries older than the configured horizon are evicted
/// on every push. Feeds the adaptive trigger-distance calculation.
#[derive(Debug, Clone)]
pub struct PriceWindow {
    horizon_ms: i64,
    entries: VecDeque<(i64, Price)>,
}

impl PriceWindow {
    pub fn new(horizon_ms: i64) -> Self {
        Self {
            horizon_ms,
            entries: VecDeque::new(),
        }
    }

    /// Seed from historical data, oldest first.
    pub fn seed(&mut self, prices: impl IntoIterator<Item = (i64, Price)>) {
        for (time, price) in prices {
            self.push(time, price);
        }
    }

    /// Append a tick and evict everything past the horizon.
    pub fn push(&mut self, time: i64, price: Price) {
        self.entries.push_back((time, price));
        while let Some(&(oldest, _)) = self.entries.front() {
            if time - oldest > self.horizon_ms {
                self.entries.pop_front();
            } else {
                break;
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn latest(&self) -> Option<(i64, Price)> {
        self.entries.back().copied()
    }

    /// Milliseconds covered by the window contents.
    pub fn span_ms(&self) -> i64 {
        match (self.entries.front(), self.entries.back()) {
            (Some(&(first, _)), Some(&(last, _))) => last - first,
            _ => 0,
        }
    }

    /// Price amplitude over the trailing `window_ms`: `(max - min) / min`
    /// as a percentage. `None` until at least two ticks are inside the
    /// slice.
    pub fn amplitude_pct(&self, window_ms: i64) -> Option<Decimal> {
        let cutoff = self.entries.back()?.0 - window_ms;
        let mut min: Option<Decimal> = None;
        let mut max: Option<Decimal> = None;
        let mut count = 0usize;

        for &(time, price) in self.entries.iter().rev() {
            if time < cutoff {
                break;
            }
            count += 1;
            let p = price.inner();
            min = Some(min.map_or(p, |m| m.min(p)));
            max = Some(max.map_or(p, |m| m.max(p)));
        }

        if count < 2 {
            return None;
        }
        let (min, max) = (min?, max?);
        if min.is_zero() {
            return None;
        }
        Some((max - min) / min * Decimal::from(100))
    }
}
