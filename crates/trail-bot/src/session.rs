//! The session aggregate.
//!
//! All mutable trading state lives here, owned by the dispatcher and
//! mutated only from its single event loop. Handlers borrow it for one
//! tick at a time; there are no ambient globals.

use std::collections::HashMap;
use trail_core::{Compounding, InstrumentInfo, Price};
use trail_engine::TrailEngine;
use trail_feed::{DepthAdvice, DepthTracker, FlowAdvice, FlowTracker, IndicatorAdvice, KlineSeries, PriceWindow};
use trail_ledger::{Ledger, RevenueLog};

/// Mutable per-run state.
pub struct Session {
    /// Latest spot price, updated on every tick even when the tick's
    /// derived actions are skipped.
    pub spot: Price,
    pub info: InstrumentInfo,
    pub engine: TrailEngine,
    pub ledger: Ledger,
    pub revenue: Option<RevenueLog>,
    pub window: PriceWindow,
    /// Kline series keyed by interval minutes.
    pub klines: HashMap<u32, KlineSeries>,
    /// Latest indicator advice per interval.
    pub indicator_advice: HashMap<u32, IndicatorAdvice>,
    pub depth: DepthTracker,
    pub depth_advice: DepthAdvice,
    pub flow: FlowTracker,
    pub flow_advice: FlowAdvice,
    pub compounding: Compounding,
    /// Single-flight guard: while a tick's derived actions run, later
    /// ticks only record their price and are otherwise skipped.
    pub busy: bool,
    /// Unix ms of the last received tick, for the staleness watchdog.
    pub last_tick_ms: i64,
}

impl Session {
    /// Indicator advice for the configured intervals, in order. Missing
    /// intervals report unfilled advice so the buy decision stays
    /// blocked until every series produced one.
    pub fn indicator_snapshot(&self, intervals: &[u32]) -> Vec<IndicatorAdvice> {
        intervals
            .iter()
            .map(|interval| {
                self.indicator_advice
                    .get(interval)
                    .copied()
                    .unwrap_or_default()
            })
            .collect()
    }
}
