//! Trigger-distance calculation.
//!
//! The distance (percentage between spot and the trailing trigger) is
//! either a fixed configured value or adapts to recent price amplitude,
//! clamped to a configured band.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use trail_feed::PriceWindow;

/// How the trigger distance is derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DistanceMethod {
    /// Always use the configured percentage.
    #[default]
    Fixed,
    /// Follow recent price amplitude, clamped to `[min_pct, max_pct]`.
    Adaptive,
}

/// Distance configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DistanceConfig {
    #[serde(default)]
    pub method: DistanceMethod,
    /// Base distance percentage, also the adaptive lower bound.
    #[serde(default = "default_pct")]
    pub pct: Decimal,
    /// Adaptive upper bound.
    #[serde(default = "default_max_pct")]
    pub max_pct: Decimal,
    /// Amplitude lookback for the adaptive method.
    #[serde(default = "default_window_ms")]
    pub window_ms: i64,
}

fn default_pct() -> Decimal {
    Decimal::new(2, 1) // 0.2 %
}

fn default_max_pct() -> Decimal {
    Decimal::ONE
}

fn default_window_ms() -> i64 {
    60_000
}

impl Default for DistanceConfig {
    fn default() -> Self {
        Self {
            method: DistanceMethod::default(),
            pct: default_pct(),
            max_pct: default_max_pct(),
            window_ms: default_window_ms(),
        }
    }
}

impl DistanceConfig {
    /// Current fluctuation percentage given the recent price window.
    pub fn fluctuation(&self, window: &PriceWindow) -> Decimal {
        match self.method {
            DistanceMethod::Fixed => self.pct,
            DistanceMethod::Adaptive => match window.amplitude_pct(self.window_ms) {
                Some(amplitude) => amplitude.clamp(self.pct, self.max_pct),
                // Not enough ticks yet, fall back to the fixed distance.
                None => self.pct,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use trail_core::Price;

    fn window_with_amplitude() -> PriceWindow {
        let mut window = PriceWindow::new(600_000);
        window.push(0, Price::new(dec!(100)));
        window.push(1_000, Price::new(dec!(100.5)));
        window.push(2_000, Price::new(dec!(100.2)));
        window
    }

    #[test]
    fn test_fixed_ignores_window() {
        let config = DistanceConfig {
            method: DistanceMethod::Fixed,
            pct: dec!(0.3),
            ..Default::default()
        };
        assert_eq!(config.fluctuation(&window_with_amplitude()), dec!(0.3));
    }

    #[test]
    fn test_adaptive_follows_amplitude_within_band() {
        let config = DistanceConfig {
            method: DistanceMethod::Adaptive,
            pct: dec!(0.2),
            max_pct: dec!(1),
            window_ms: 60_000,
        };
        // Amplitude = 0.5%, inside [0.2, 1].
        assert_eq!(config.fluctuation(&window_with_amplitude()), dec!(0.5));
    }

    #[test]
    fn test_adaptive_clamps_to_band() {
        let mut config = DistanceConfig {
            method: DistanceMethod::Adaptive,
            pct: dec!(0.6),
            max_pct: dec!(1),
            window_ms: 60_000,
        };
        // Amplitude 0.5% below the lower bound.
        assert_eq!(config.fluctuation(&window_with_amplitude()), dec!(0.6));

        config.pct = dec!(0.1);
        config.max_pct = dec!(0.4);
        assert_eq!(config.fluctuation(&window_with_amplitude()), dec!(0.4));
    }

    #[test]
    fn test_adaptive_falls_back_on_empty_window() {
        let config = DistanceConfig {
            method: DistanceMethod::Adaptive,
            pct: dec!(0.25),
            max_pct: dec!(1),
            window_ms: 60_000,
        };
        assert_eq!(config.fluctuation(&PriceWindow::new(1_000)), dec!(0.25));
    }
}
