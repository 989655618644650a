//! Trailing order engine for trailbot.
//!
//! Owns the single in-flight trailing order and everything that decides
//! its fate: starting a trail, advancing the trigger on every tick,
//! reconciling against exchange-reported state (fills, lost orders,
//! spikes), and closing out into the ledger and revenue log. Also hosts
//! the pure buy/sell decision logic.

pub mod active;
pub mod buy;
pub mod distance;
pub mod error;
pub mod sell;
pub mod trailing;

pub use active::ActiveOrder;
pub use buy::{
    decide_buy, BuyDecision, BuyInputs, BuySignalConfig, PriceLimits, SignalBounds, SpreadSignal,
};
pub use distance::{DistanceConfig, DistanceMethod};
pub use error::{EngineError, Result};
pub use sell::{scan_sells, SellScan};
pub use trailing::{CloseReport, TrailConfig, TrailContext, TrailEngine};
