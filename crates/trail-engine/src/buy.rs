//! Buy decision logic.
//!
//! Pure function over the current advice snapshots: each enabled
//! sub-signal must independently vote "buy ok" inside its configured
//! bounds, disabled signals are vacuously true, and the final decision
//! is the conjunction of all of them. Only evaluated while no trailing
//! order is active.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use trail_core::{BuyLot, Price};
use trail_feed::{DepthAdvice, FlowAdvice, IndicatorAdvice};

/// A toggleable signal with an acceptance band.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalBounds {
    pub enabled: bool,
    pub minimum: Decimal,
    pub maximum: Decimal,
}

impl SignalBounds {
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            minimum: Decimal::ZERO,
            maximum: Decimal::ZERO,
        }
    }

    fn accepts(&self, value: Decimal) -> bool {
        value >= self.minimum && value <= self.maximum
    }
}

impl Default for SignalBounds {
    fn default() -> Self {
        Self::disabled()
    }
}

/// Spread gate: require a minimum distance between spot and every
/// already-held lot, so the bot ladders buys instead of stacking them
/// at one price.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpreadSignal {
    pub enabled: bool,
    /// Minimum distance in percent.
    pub distance_pct: Decimal,
}

impl SpreadSignal {
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            distance_pct: Decimal::ZERO,
        }
    }
}

impl Default for SpreadSignal {
    fn default() -> Self {
        Self::disabled()
    }
}

/// Hard price bounds; each limit is independently toggleable (absent
/// means unbounded).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PriceLimits {
    pub enabled: bool,
    pub max_buy: Option<Price>,
    pub min_sell: Option<Price>,
    pub max_sell: Option<Price>,
}

impl PriceLimits {
    /// Whether buying at `spot` is allowed.
    pub fn buy_allowed(&self, spot: Price) -> bool {
        if !self.enabled {
            return true;
        }
        match self.max_buy {
            Some(max_buy) => spot < max_buy,
            None => true,
        }
    }

    /// Whether selling at `spot` is allowed, with the blocking bound for
    /// the log line.
    pub fn sell_allowed(&self, spot: Price) -> (bool, Option<String>) {
        if !self.enabled {
            return (true, None);
        }
        if let Some(min_sell) = self.min_sell {
            if spot <= min_sell {
                return (
                    false,
                    Some(format!("price {spot} below minimum sell price {min_sell}")),
                );
            }
        }
        if let Some(max_sell) = self.max_sell {
            if spot >= max_sell {
                return (
                    false,
                    Some(format!("price {spot} above maximum sell price {max_sell}")),
                );
            }
        }
        (true, None)
    }
}

/// Full buy-signal configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuySignalConfig {
    #[serde(default)]
    pub indicators: SignalBounds,
    #[serde(default)]
    pub spread: SpreadSignal,
    #[serde(default)]
    pub depth: SignalBounds,
    #[serde(default)]
    pub flow: SignalBounds,
    #[serde(default)]
    pub price_limit: PriceLimits,
}

impl Default for BuySignalConfig {
    fn default() -> Self {
        Self {
            indicators: SignalBounds::disabled(),
            spread: SpreadSignal {
                enabled: true,
                distance_pct: Decimal::new(5, 1), // 0.5 %
            },
            depth: SignalBounds::disabled(),
            flow: SignalBounds::disabled(),
            price_limit: PriceLimits::default(),
        }
    }
}

/// Inputs for one buy evaluation.
#[derive(Debug)]
pub struct BuyInputs<'a> {
    pub spot: Price,
    /// One advice per configured kline interval.
    pub indicator_advice: &'a [IndicatorAdvice],
    pub depth_advice: DepthAdvice,
    pub flow_advice: FlowAdvice,
    pub lots: &'a [BuyLot],
}

/// Decision plus the signals that blocked it, for the log line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuyDecision {
    pub can_buy: bool,
    pub blockers: Vec<String>,
}

/// Evaluate all enabled buy signals.
pub fn decide_buy(config: &BuySignalConfig, inputs: &BuyInputs<'_>) -> BuyDecision {
    let mut blockers = Vec::new();

    if config.indicators.enabled {
        let all_ok = !inputs.indicator_advice.is_empty()
            && inputs
                .indicator_advice
                .iter()
                .all(|advice| advice.filled && config.indicators.accepts(advice.value));
        if !all_ok {
            blockers.push("indicators".to_string());
        }
    }

    if config.spread.enabled {
        let too_close = inputs.lots.iter().any(|lot| {
            inputs
                .spot
                .pct_from(lot.avg_price)
                .map(|pct| pct.abs() < config.spread.distance_pct)
                .unwrap_or(false)
        });
        if too_close {
            blockers.push("spread".to_string());
        }
    }

    if config.depth.enabled && !config.depth.accepts(inputs.depth_advice.buy_pct) {
        blockers.push("orderbook".to_string());
    }

    if config.flow.enabled && !config.flow.accepts(inputs.flow_advice.buy_ratio) {
        blockers.push("trades".to_string());
    }

    if !config.price_limit.buy_allowed(inputs.spot) {
        blockers.push("price limit".to_string());
    }

    BuyDecision {
        can_buy: blockers.is_empty(),
        blockers,
    }
}
