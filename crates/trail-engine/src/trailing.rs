//! The trailing order state machine.
//!
//! Drives the single in-flight trailing order tick by tick: reconciles
//! it against exchange-reported state (fill, disappearance, spike),
//! then ratchets the trigger price in the favorable direction only.
//! Every exchange interaction goes through the [`OrderGateway`] trait
//! and lands back here as a structured outcome code.

use crate::active::ActiveOrder;
use crate::distance::DistanceConfig;
use crate::error::Result;
use crate::sell::SellScan;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};
use trail_core::{ClientOrderId, ExchangeCode, InstrumentInfo, LotStatus, OrderSide, Price, Qty};
use trail_gateway::{CancelOutcome, OrderGateway, OrderSnapshot, PlaceOrder};
use trail_ledger::{Ledger, RevenueLog, RevenueRecord, RevenueSides};
use trail_feed::PriceWindow;

/// Trailing configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrailConfig {
    /// Minimum profit percentage required before lots become sellable.
    #[serde(default = "default_profit_pct")]
    pub profit_pct: Decimal,
    /// Trigger distance configuration.
    #[serde(default)]
    pub distance: DistanceConfig,
    /// Reconciliation interval for orders whose trigger has not been
    /// crossed; stop orders occasionally get stuck on the exchange.
    #[serde(default = "default_stuck_interval_ms")]
    pub stuck_interval_ms: i64,
    /// Force a ledger rebalance after every closed trail.
    #[serde(default = "default_rebalance_on_close")]
    pub rebalance_on_close: bool,
}

fn default_profit_pct() -> Decimal {
    Decimal::ONE
}

fn default_stuck_interval_ms() -> i64 {
    20_000
}

fn default_rebalance_on_close() -> bool {
    true
}

impl Default for TrailConfig {
    fn default() -> Self {
        Self {
            profit_pct: default_profit_pct(),
            distance: DistanceConfig::default(),
            stuck_interval_ms: default_stuck_interval_ms(),
            rebalance_on_close: default_rebalance_on_close(),
        }
    }
}

/// Everything one engine call may touch, borrowed for the tick.
pub struct TrailContext<'a> {
    pub gateway: &'a dyn OrderGateway,
    pub ledger: &'a mut Ledger,
    pub revenue: Option<&'a RevenueLog>,
    pub info: &'a InstrumentInfo,
    pub window: &'a PriceWindow,
    /// Tick wall-clock time (Unix ms); injected for deterministic tests.
    pub now_ms: i64,
}

/// Summary of a closed trail, handed back to the dispatcher for
/// reporting and compounding.
#[derive(Debug, Clone, PartialEq)]
pub struct CloseReport {
    pub side: OrderSide,
    pub qty: Qty,
    pub avg_price: Price,
    /// Realized revenue in quote units; zero for buys.
    pub revenue: Decimal,
}

/// The trailing engine. One instance exists for the lifetime of the bot.
pub struct TrailEngine {
    config: TrailConfig,
    active: ActiveOrder,
    /// Lots matched by the running sell trail.
    sell_lots: Vec<ClientOrderId>,
    /// Unix ms of the last reconciliation check.
    last_check_ms: i64,
}

impl TrailEngine {
    pub fn new(config: TrailConfig) -> Self {
        Self {
            config,
            active: ActiveOrder::idle(),
            sell_lots: Vec::new(),
            last_check_ms: 0,
        }
    }

    pub fn active(&self) -> &ActiveOrder {
        &self.active
    }

    pub fn is_active(&self) -> bool {
        self.active.active
    }

    pub fn config(&self) -> &TrailConfig {
        &self.config
    }

    /// Distance percentage the sell profitability threshold uses.
    pub fn base_distance_pct(&self) -> Decimal {
        self.config.distance.pct
    }

    pub fn sell_lots(&self) -> &[ClientOrderId] {
        &self.sell_lots
    }

    /// Drop back to idle without touching the exchange. Used by the
    /// dispatcher as the fail-safe after an unrecoverable handler error;
    /// the next reconciliation of a genuinely live order would find it
    /// again via the startup verification path.
    pub fn force_idle(&mut self) {
        if self.active.active {
            warn!(
                order_id = %self.active.order_id,
                "Forcing trail back to idle"
            );
        }
        self.active.deactivate();
        self.sell_lots.clear();
    }

    /// Start a trailing buy at `spot`. Returns whether the trail started;
    /// any placement failure leaves the engine idle.
    pub async fn start_buy(&mut self, ctx: &mut TrailContext<'_>, spot: Price) -> Result<bool> {
        let fluctuation = self.config.distance.fluctuation(ctx.window);
        self.active.arm(OrderSide::Buy, spot, fluctuation);
        self.active.qty = ctx.info.min_buy_base;
        let trigger = spot
            .offset_up_pct(fluctuation)
            .round_up_to(ctx.info.tick_size);
        self.active.trigger = trigger;
        self.active.trigger_initial = trigger;
        self.last_check_ms = ctx.now_ms;

        info!(
            %spot,
            %trigger,
            fluctuation_pct = %fluctuation,
            qty = %self.active.qty,
            "Starting trailing buy"
        );

        let request = PlaceOrder {
            symbol: ctx.info.symbol.clone(),
            side: OrderSide::Buy,
            qty: self.active.qty,
            trigger,
            link_id: self.active.link_id.clone(),
        };
        match ctx.gateway.place(&request).await {
            Ok(placed) => {
                self.active.order_id = placed.order_id.clone();
                ctx.ledger
                    .register_buy(placed.snapshot.into_lot(LotStatus::Open))?;
                info!(
                    order_id = %self.active.order_id,
                    "Buy order opened and registered in the ledger"
                );
                Ok(true)
            }
            Err(e) => {
                error!(error = %e, "Buy order failed when placing, trailing stopped");
                self.active.deactivate();
                Ok(false)
            }
        }
    }

    /// Start a trailing sell for the scanned lot set.
    pub async fn start_sell(
        &mut self,
        ctx: &mut TrailContext<'_>,
        spot: Price,
        scan: &SellScan,
    ) -> Result<bool> {
        let fluctuation = self.config.distance.fluctuation(ctx.window);
        self.active.arm(OrderSide::Sell, spot, fluctuation);
        self.active.qty = scan.qty;
        self.active.qty_new = scan.qty;
        let trigger = spot
            .offset_down_pct(fluctuation)
            .round_down_to(ctx.info.tick_size);
        self.active.trigger = trigger;
        self.active.trigger_initial = trigger;
        self.sell_lots = scan.lots.clone();
        self.last_check_ms = ctx.now_ms;

        info!(
            %spot,
            %trigger,
            fluctuation_pct = %fluctuation,
            qty = %scan.qty,
            lots = scan.lots.len(),
            "Starting trailing sell"
        );

        let request = PlaceOrder {
            symbol: ctx.info.symbol.clone(),
            side: OrderSide::Sell,
            qty: scan.qty,
            trigger,
            link_id: self.active.link_id.clone(),
        };
        match ctx.gateway.place(&request).await {
            Ok(placed) => {
                self.active.order_id = placed.order_id;
                info!(order_id = %self.active.order_id, "Sell order opened");
                Ok(true)
            }
            Err(e) => {
                error!(error = %e, "Sell order failed when placing, trailing stopped");
                self.active.deactivate();
                self.sell_lots.clear();
                Ok(false)
            }
        }
    }

    /// Advance the trail for one tick: reconcile first, then ratchet the
    /// trigger. Returns a close report when the order turned out filled.
    pub async fn advance(
        &mut self,
        ctx: &mut TrailContext<'_>,
        spot: Price,
    ) -> Result<Option<CloseReport>> {
        if !self.active.active {
            return Ok(None);
        }
        self.active.current = spot;

        let report = self.reconcile(ctx, spot).await?;
        if report.is_some() {
            return Ok(report);
        }
        if self.active.active {
            self.adjust_trigger(ctx, spot).await;
        }
        Ok(None)
    }

    /// Reconciliation: when the trigger was crossed, or the stuck timer
    /// elapsed, ask the exchange what actually happened to the order.
    async fn reconcile(
        &mut self,
        ctx: &mut TrailContext<'_>,
        spot: Price,
    ) -> Result<Option<CloseReport>> {
        let crossed = self.active.trigger_crossed(spot);
        let stuck = ctx.now_ms - self.last_check_ms >= self.config.stuck_interval_ms;
        if !crossed && !stuck {
            return Ok(None);
        }

        info!(
            order_id = %self.active.order_id,
            check = if crossed { "regular" } else { "interval" },
            side = self.active.side.label(),
            "Checking order state on the exchange"
        );
        self.last_check_ms = ctx.now_ms;

        let fetch = ctx
            .gateway
            .fetch_order(&self.active.order_id, &self.active.link_id)
            .await;

        if fetch.code == ExchangeCode::NotFoundLive {
            // The exchange lost the order. Cancel whatever remains, drop
            // local bookkeeping and resync against the wallet.
            error!(
                order_id = %self.active.order_id,
                link_id = %self.active.link_id,
                "Order disappeared from the exchange, resetting trail"
            );
            self.abort_trail(ctx).await?;
            return Ok(None);
        }

        let Some(snapshot) = fetch.snapshot else {
            // Transient lookup failure: keep trailing, retry next tick.
            warn!(
                order_id = %self.active.order_id,
                code = %fetch.code,
                "Order lookup inconclusive, retrying on the next tick"
            );
            return Ok(None);
        };

        if snapshot.status.is_filled() {
            info!(
                side = self.active.side.label(),
                trigger = %self.active.trigger,
                "Trailing order has been filled"
            );
            let report = self.close(ctx, spot, snapshot).await?;
            return Ok(Some(report));
        }

        // Spike check: the remote trigger sits on the wrong side of spot,
        // so the order should have fired already but did not.
        let spiked = match self.active.side {
            OrderSide::Sell => snapshot.trigger_price > spot,
            OrderSide::Buy => snapshot.trigger_price < spot,
        };
        if spiked {
            warn!(
                side = self.active.side.label(),
                remote_trigger = %snapshot.trigger_price,
                %spot,
                "Order spiked without firing, cancelling current order"
            );
            self.abort_trail(ctx).await?;
        }

        Ok(None)
    }

    /// Tear down a lost or spiked trail: deactivate, cancel defensively,
    /// drop the lot (buy side) and rebalance against the wallet.
    async fn abort_trail(&mut self, ctx: &mut TrailContext<'_>) -> Result<()> {
        self.active.deactivate();
        match ctx
            .gateway
            .cancel(&self.active.order_id, &self.active.link_id)
            .await
        {
            Ok(outcome) => {
                info!(order_id = %self.active.order_id, ?outcome, "Defensive cancel");
            }
            Err(e) => {
                warn!(error = %e, "Defensive cancel failed");
            }
        }
        if self.active.side == OrderSide::Buy {
            ctx.ledger.remove_by_order_id(&self.active.order_id)?;
        }
        self.sell_lots.clear();
        self.force_rebalance(ctx).await
    }

    /// Trigger adjustment: recompute the candidate from the current price
    /// and move the resting trigger only in the favorable direction.
    async fn adjust_trigger(&mut self, ctx: &TrailContext<'_>, spot: Price) {
        self.active.previous = self.active.current;
        let fluctuation = self.config.distance.fluctuation(ctx.window);
        self.active.fluctuation_pct = fluctuation;

        let candidate = match self.active.side {
            OrderSide::Sell => spot
                .offset_down_pct(fluctuation)
                .round_down_to(ctx.info.tick_size),
            OrderSide::Buy => spot
                .offset_up_pct(fluctuation)
                .round_up_to(ctx.info.tick_size),
        };
        self.active.trigger_new = candidate;

        let favorable = match self.active.side {
            OrderSide::Sell => candidate > self.active.trigger,
            OrderSide::Buy => candidate < self.active.trigger,
        };
        if !favorable {
            return;
        }

        let outcome = ctx
            .gateway
            .amend_trigger(&self.active.order_id, self.active.qty, candidate)
            .await;
        match outcome.code {
            ExchangeCode::Ok => {
                info!(
                    side = self.active.side.label(),
                    from = %self.active.trigger,
                    to = %candidate,
                    "Adjusted trigger price"
                );
                self.active.trigger = candidate;
            }
            ExchangeCode::NotFoundOrClosed | ExchangeCode::NotFoundLive => {
                // The order hit in between; the next reconciliation pass
                // will settle it. Trigger stays untouched.
                info!(
                    side = self.active.side.label(),
                    "Adjusting trigger price not possible, order already hit"
                );
            }
            ExchangeCode::ModificationNotAllowed => {
                info!(
                    side = self.active.side.label(),
                    "Adjusting trigger price not possible, order does not support modification"
                );
            }
            ExchangeCode::TriggerTooHigh => {
                info!(
                    side = self.active.side.label(),
                    "Adjusting trigger price not possible, trigger price too high"
                );
            }
            ExchangeCode::TriggerTooLow => {
                info!(
                    side = self.active.side.label(),
                    "Adjusting trigger price not possible, trigger price too low"
                );
            }
            ExchangeCode::Other => {
                error!(
                    message = outcome.message.as_deref().unwrap_or(""),
                    "Critical failure while trailing, trigger state unchanged"
                );
            }
        }
    }

    /// Amend the sell quantity after the profitable lot set changed.
    pub async fn amend_sell_quantity(
        &mut self,
        ctx: &TrailContext<'_>,
        scan: &SellScan,
    ) -> Result<()> {
        debug_assert_eq!(self.active.side, OrderSide::Sell);
        self.active.qty_new = scan.qty;

        let outcome = ctx
            .gateway
            .amend_quantity(&self.active.order_id, scan.qty)
            .await;
        match outcome.code {
            ExchangeCode::Ok => {
                info!(
                    from = %self.active.qty,
                    to = %scan.qty,
                    "Adjusted sell order quantity"
                );
                self.active.qty = scan.qty;
                self.sell_lots = scan.lots.clone();
            }
            ExchangeCode::NotFoundOrClosed | ExchangeCode::NotFoundLive => {
                info!("Adjusting quantity not possible, sell order already hit");
            }
            ExchangeCode::ModificationNotAllowed => {
                info!("Sell order quantity could not be changed, order does not support modification");
            }
            _ => {
                error!(
                    message = outcome.message.as_deref().unwrap_or(""),
                    "Critical failure while amending sell quantity"
                );
            }
        }
        Ok(())
    }

    /// Close a filled trail: settle the ledger, compute revenue for
    /// sells, write the revenue log and optionally rebalance.
    async fn close(
        &mut self,
        ctx: &mut TrailContext<'_>,
        spot: Price,
        snapshot: OrderSnapshot,
    ) -> Result<CloseReport> {
        self.active.deactivate();
        let mut revenue = Decimal::ZERO;

        match self.active.side {
            OrderSide::Buy => {
                ctx.ledger
                    .close_lot(snapshot.clone().into_lot(LotStatus::Closed))?;
                if let Some(log) = ctx.revenue {
                    if log.sides == RevenueSides::Both {
                        log.append(&self.revenue_record(ctx, &snapshot, Decimal::ZERO))?;
                    }
                }
            }
            OrderSide::Sell => {
                // Quote value and base-denominated fees of the lots this
                // sell matched; buy fees convert to quote at current spot.
                let (buy_value, buy_fees_base) = ctx
                    .ledger
                    .lots()
                    .iter()
                    .filter(|lot| self.sell_lots.contains(&lot.order_link_id))
                    .fold((Decimal::ZERO, Decimal::ZERO), |(value, fees), lot| {
                        (value + lot.cum_exec_value, fees + lot.cum_exec_fee)
                    });
                let fees = buy_fees_base * spot.inner() + snapshot.cum_exec_fee;
                revenue = snapshot.cum_exec_value - buy_value - fees;

                ctx.ledger.register_sell(&self.sell_lots)?;
                self.sell_lots.clear();

                info!(
                    %revenue,
                    sell_value = %snapshot.cum_exec_value,
                    %buy_value,
                    %fees,
                    "Trailing sell settled"
                );
                if let Some(log) = ctx.revenue {
                    log.append(&self.revenue_record(ctx, &snapshot, revenue))?;
                }
            }
        }

        if self.config.rebalance_on_close {
            self.force_rebalance(ctx).await?;
        }

        info!(side = self.active.side.label(), "Closed trailing order");
        Ok(CloseReport {
            side: self.active.side,
            qty: snapshot.cum_exec_qty,
            avg_price: snapshot.avg_price,
            revenue,
        })
    }

    /// A running trailing buy blocks a profitable sell; cancel it. When
    /// the cancel finds nothing the buy filled in between, so it is
    /// closed out as a fill instead.
    pub async fn cancel_active_buy(
        &mut self,
        ctx: &mut TrailContext<'_>,
        spot: Price,
    ) -> Result<Option<CloseReport>> {
        debug_assert_eq!(self.active.side, OrderSide::Buy);
        warn!("Buying while selling is possible, cancelling the buy trail");
        self.active.deactivate();

        match ctx
            .gateway
            .cancel(&self.active.order_id, &self.active.link_id)
            .await
        {
            Ok(CancelOutcome::Cancelled) => {
                info!("Buy order cancelled");
                ctx.ledger.remove_by_order_id(&self.active.order_id)?;
                Ok(None)
            }
            Ok(CancelOutcome::NotFound) => {
                info!("Buy order could not be cancelled, closing the trailing buy");
                let fetch = ctx
                    .gateway
                    .fetch_order(&self.active.order_id, &self.active.link_id)
                    .await;
                match fetch.snapshot {
                    Some(snapshot) => Ok(Some(self.close(ctx, spot, snapshot).await?)),
                    None => {
                        error!(
                            code = %fetch.code,
                            "Buy order neither cancellable nor fetchable, forcing rebalance"
                        );
                        ctx.ledger.remove_by_order_id(&self.active.order_id)?;
                        self.force_rebalance(ctx).await?;
                        Ok(None)
                    }
                }
            }
            Err(e) => {
                error!(error = %e, "Cancel of the buy trail failed");
                Ok(None)
            }
        }
    }

    /// Resync the ledger against exchange holdings. Wallet lookup
    /// failures skip the rebalance rather than guessing.
    pub async fn force_rebalance(&self, ctx: &mut TrailContext<'_>) -> Result<()> {
        match ctx.gateway.wallet_balance(&ctx.info.base_coin).await {
            Ok(balance) => {
                ctx.ledger.rebalance(Qty::new(balance))?;
            }
            Err(e) => {
                warn!(error = %e, "Wallet lookup failed, skipping rebalance");
            }
        }
        Ok(())
    }

    fn revenue_record(
        &self,
        ctx: &TrailContext<'_>,
        snapshot: &OrderSnapshot,
        revenue: Decimal,
    ) -> RevenueRecord {
        RevenueRecord {
            utc_time: chrono::Utc::now().to_rfc3339(),
            created_time: snapshot.created_time,
            order_id: snapshot.order_id.clone(),
            order_link_id: snapshot.order_link_id.as_str().to_string(),
            side: snapshot.side.to_string(),
            symbol: snapshot.symbol.clone(),
            base_coin: ctx.info.base_coin.clone(),
            quote_coin: ctx.info.quote_coin.clone(),
            order_type: snapshot.order_type.to_string(),
            order_status: snapshot.status.to_string(),
            avg_price: snapshot.avg_price.inner(),
            qty: snapshot.qty.inner(),
            trigger_initial: self.active.trigger_initial.inner(),
            trigger_final: self.active.trigger.inner(),
            cum_exec_fee: snapshot.cum_exec_fee,
            cum_exec_qty: snapshot.cum_exec_qty.inner(),
            cum_exec_value: snapshot.cum_exec_value,
            revenue,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sell::scan_sells;
    use crate::buy::PriceLimits;
    use crate::distance::{DistanceConfig, DistanceMethod};
    use rust_decimal_macros::dec;
    use trail_core::{BuyLot, OrderKind, OrderStatus};
    use trail_gateway::mock::GatewayCall;
    use trail_gateway::{AmendOutcome, FetchOutcome, ScriptedGateway};

    fn test_info() -> InstrumentInfo {
        InstrumentInfo {
            symbol: "BTC_USDC".to_string(),
            base_coin: "BTC".to_string(),
            quote_coin: "USDC".to_string(),
            active: true,
            base_precision: Qty::new(dec!(0.0001)),
            quote_precision: Price::new(dec!(0.01)),
            tick_size: Price::new(dec!(0.01)),
            min_order_qty: Qty::new(dec!(0.0001)),
            min_buy_base: Qty::new(dec!(0.001)),
            min_buy_quote: dec!(50),
            refreshed_at: 0,
        }
    }

    fn test_config() -> TrailConfig {
        TrailConfig {
            profit_pct: dec!(1),
            distance: DistanceConfig {
                method: DistanceMethod::Fixed,
                pct: dec!(0.5),
                max_pct: dec!(1),
                window_ms: 60_000,
            },
            stuck_interval_ms: 20_000,
            rebalance_on_close: false,
        }
    }

    fn temp_ledger() -> (tempfile::TempDir, Ledger) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("buys.json");
        std::fs::write(&path, "").unwrap();
        (dir, Ledger::load(path).unwrap())
    }

    fn closed_lot(link: &str, avg_price: rust_decimal::Decimal, qty: rust_decimal::Decimal, value: rust_decimal::Decimal) -> BuyLot {
        BuyLot {
            order_id: format!("oid-{link}"),
            order_link_id: ClientOrderId::new(link),
            created_time: 0,
            updated_time: 0,
            symbol: "BTC_USDC".to_string(),
            side: OrderSide::Buy,
            order_type: OrderKind::StopMarket,
            status: LotStatus::Closed,
            price: Price::new(avg_price),
            avg_price: Price::new(avg_price),
            qty: Qty::new(qty),
            cum_exec_qty: Qty::new(qty),
            cum_exec_value: value,
            cum_exec_fee: rust_decimal::Decimal::ZERO,
            trigger_price: Price::new(avg_price),
        }
    }

    fn remote_order(
        engine: &TrailEngine,
        status: OrderStatus,
        trigger: rust_decimal::Decimal,
        value: rust_decimal::Decimal,
        fee: rust_decimal::Decimal,
    ) -> OrderSnapshot {
        let active = engine.active();
        OrderSnapshot {
            order_id: active.order_id.clone(),
            order_link_id: active.link_id.clone(),
            created_time: 0,
            updated_time: 0,
            symbol: "BTC_USDC".to_string(),
            side: active.side,
            order_type: OrderKind::StopMarket,
            status,
            price: Price::ZERO,
            avg_price: Price::new(dec!(100)),
            qty: active.qty,
            cum_exec_qty: active.qty,
            cum_exec_value: value,
            cum_exec_fee: fee,
            trigger_price: Price::new(trigger),
        }
    }

    macro_rules! ctx {
        ($gw:expr, $ledger:expr, $info:expr, $window:expr, $now:expr) => {
            &mut TrailContext {
                gateway: &$gw,
                ledger: &mut $ledger,
                revenue: None,
                info: &$info,
                window: &$window,
                now_ms: $now,
            }
        };
    }

    #[tokio::test]
    async fn test_start_buy_places_and_registers_open_lot() {
        let gw = ScriptedGateway::new();
        let (_dir, mut ledger) = temp_ledger();
        let info = test_info();
        let window = PriceWindow::new(600_000);
        let mut engine = TrailEngine::new(test_config());

        let started = engine
            .start_buy(ctx!(gw, ledger, info, window, 0), Price::new(dec!(100)))
            .await
            .unwrap();

        assert!(started);
        assert!(engine.is_active());
        assert_eq!(engine.active().side, OrderSide::Buy);
        // 100 * 1.005 = 100.5, already on the tick grid.
        assert_eq!(engine.active().trigger.inner(), dec!(100.5));
        assert_eq!(engine.active().qty, info.min_buy_base);
        assert_eq!(ledger.len(), 1);
        assert_eq!(ledger.lots()[0].status, LotStatus::Open);
    }

    #[tokio::test]
    async fn test_start_buy_failure_leaves_idle() {
        let gw = ScriptedGateway::new();
        gw.script_place_error("not_enough_funds");
        let (_dir, mut ledger) = temp_ledger();
        let info = test_info();
        let window = PriceWindow::new(600_000);
        let mut engine = TrailEngine::new(test_config());

        let started = engine
            .start_buy(ctx!(gw, ledger, info, window, 0), Price::new(dec!(100)))
            .await
            .unwrap();

        assert!(!started);
        assert!(!engine.is_active());
        assert!(ledger.is_empty());
    }

    #[tokio::test]
    async fn test_sell_trigger_is_monotonic_under_rising_price() {
        let gw = ScriptedGateway::new();
        let (_dir, mut ledger) = temp_ledger();
        ledger.register_buy(closed_lot("a", dec!(95), dec!(0.5), dec!(47.5))).unwrap();
        let info = test_info();
        let window = PriceWindow::new(600_000);
        let mut engine = TrailEngine::new(test_config());

        let scan = scan_sells(
            Price::new(dec!(100)),
            dec!(1),
            dec!(0.5),
            ledger.lots(),
            &PriceLimits::default(),
            info.base_precision,
        );
        assert!(scan.can_sell);
        engine
            .start_sell(ctx!(gw, ledger, info, window, 0), Price::new(dec!(100)), &scan)
            .await
            .unwrap();
        // 100 * 0.995 = 99.5.
        assert_eq!(engine.active().trigger.inner(), dec!(99.5));

        let mut last = engine.active().trigger;
        for (i, spot) in [dec!(101), dec!(100.8), dec!(102), dec!(101.5), dec!(103)]
            .into_iter()
            .enumerate()
        {
            engine
                .advance(ctx!(gw, ledger, info, window, 1_000 * (i as i64 + 1)), Price::new(spot))
                .await
                .unwrap();
            assert!(engine.is_active());
            assert!(engine.active().trigger >= last, "trigger must never loosen");
            last = engine.active().trigger;
        }
        // 103 * 0.995 = 102.485 -> 102.48 after tick rounding.
        assert_eq!(engine.active().trigger.inner(), dec!(102.48));
    }

    #[tokio::test]
    async fn test_buy_trigger_is_monotonic_under_falling_price() {
        let gw = ScriptedGateway::new();
        let (_dir, mut ledger) = temp_ledger();
        let info = test_info();
        let window = PriceWindow::new(600_000);
        let mut engine = TrailEngine::new(test_config());

        engine
            .start_buy(ctx!(gw, ledger, info, window, 0), Price::new(dec!(100)))
            .await
            .unwrap();
        assert_eq!(engine.active().trigger.inner(), dec!(100.5));

        let mut last = engine.active().trigger;
        for (i, spot) in [dec!(99), dec!(99.4), dec!(98), dec!(98.3)].into_iter().enumerate() {
            engine
                .advance(ctx!(gw, ledger, info, window, 1_000 * (i as i64 + 1)), Price::new(spot))
                .await
                .unwrap();
            assert!(engine.is_active());
            assert!(engine.active().trigger <= last, "trigger must never loosen");
            last = engine.active().trigger;
        }
        // 98 * 1.005 = 98.49.
        assert_eq!(engine.active().trigger.inner(), dec!(98.49));
    }

    #[tokio::test]
    async fn test_amend_on_filled_order_leaves_trigger_unchanged() {
        let gw = ScriptedGateway::new();
        let (_dir, mut ledger) = temp_ledger();
        ledger.register_buy(closed_lot("a", dec!(95), dec!(0.5), dec!(47.5))).unwrap();
        let info = test_info();
        let window = PriceWindow::new(600_000);
        let mut engine = TrailEngine::new(test_config());

        let scan = scan_sells(
            Price::new(dec!(100)),
            dec!(1),
            dec!(0.5),
            ledger.lots(),
            &PriceLimits::default(),
            info.base_precision,
        );
        engine
            .start_sell(ctx!(gw, ledger, info, window, 0), Price::new(dec!(100)), &scan)
            .await
            .unwrap();
        let before = engine.active().trigger;

        // The order filled remotely; both amend attempts keep reporting
        // the same code and the local trigger never moves.
        gw.script_amend_trigger(AmendOutcome::of(ExchangeCode::NotFoundOrClosed, "already_closed"));
        gw.script_amend_trigger(AmendOutcome::of(ExchangeCode::NotFoundOrClosed, "already_closed"));

        engine
            .advance(ctx!(gw, ledger, info, window, 1_000), Price::new(dec!(102)))
            .await
            .unwrap();
        assert_eq!(engine.active().trigger, before);

        engine
            .advance(ctx!(gw, ledger, info, window, 2_000), Price::new(dec!(103)))
            .await
            .unwrap();
        assert_eq!(engine.active().trigger, before);
        assert!(engine.is_active());
    }

    #[tokio::test]
    async fn test_amend_rejection_codes_keep_trigger() {
        let gw = ScriptedGateway::new();
        let (_dir, mut ledger) = temp_ledger();
        let info = test_info();
        let window = PriceWindow::new(600_000);
        let mut engine = TrailEngine::new(test_config());

        engine
            .start_buy(ctx!(gw, ledger, info, window, 0), Price::new(dec!(100)))
            .await
            .unwrap();
        let before = engine.active().trigger;

        for code in [
            ExchangeCode::ModificationNotAllowed,
            ExchangeCode::TriggerTooLow,
            ExchangeCode::Other,
        ] {
            gw.script_amend_trigger(AmendOutcome::of(code, "rejected"));
        }

        for (i, spot) in [dec!(99), dec!(98), dec!(97)].into_iter().enumerate() {
            engine
                .advance(ctx!(gw, ledger, info, window, 1_000 * (i as i64 + 1)), Price::new(spot))
                .await
                .unwrap();
            assert_eq!(engine.active().trigger, before);
            assert!(engine.is_active());
        }
    }

    #[tokio::test]
    async fn test_fill_settles_revenue_and_ledger() {
        let gw = ScriptedGateway::new();
        let (_dir, mut ledger) = temp_ledger();
        // One lot bought for 1000 quote with no fee.
        ledger
            .register_buy(closed_lot("a", dec!(100), dec!(10), dec!(1000)))
            .unwrap();
        let info = test_info();
        let window = PriceWindow::new(600_000);
        let mut engine = TrailEngine::new(test_config());

        let scan = scan_sells(
            Price::new(dec!(110)),
            dec!(1),
            dec!(0.5),
            ledger.lots(),
            &PriceLimits::default(),
            info.base_precision,
        );
        engine
            .start_sell(ctx!(gw, ledger, info, window, 0), Price::new(dec!(110)), &scan)
            .await
            .unwrap();

        // Sold for 1100 quote with a fee of 2: revenue = 1100 - 1000 - 2.
        let filled = remote_order(&engine, OrderStatus::Filled, dec!(109.45), dec!(1100), dec!(2));
        gw.script_fetch(FetchOutcome {
            snapshot: Some(filled),
            code: ExchangeCode::Ok,
        });

        // Spot at the trigger crosses and forces the reconciliation check.
        let report = engine
            .advance(ctx!(gw, ledger, info, window, 1_000), Price::new(dec!(109.4)))
            .await
            .unwrap()
            .expect("fill must produce a close report");

        assert_eq!(report.side, OrderSide::Sell);
        assert_eq!(report.revenue, dec!(98));
        assert!(!engine.is_active());
        assert!(engine.sell_lots().is_empty());
        // The matched lot left the ledger.
        assert!(ledger.is_empty());
    }

    #[tokio::test]
    async fn test_buy_fill_promotes_lot_to_closed() {
        let gw = ScriptedGateway::new();
        let (_dir, mut ledger) = temp_ledger();
        let info = test_info();
        let window = PriceWindow::new(600_000);
        let mut engine = TrailEngine::new(test_config());

        engine
            .start_buy(ctx!(gw, ledger, info, window, 0), Price::new(dec!(100)))
            .await
            .unwrap();
        assert_eq!(ledger.lots()[0].status, LotStatus::Open);

        let filled = remote_order(&engine, OrderStatus::Filled, dec!(100.5), dec!(100.6), dec!(0));
        gw.script_fetch(FetchOutcome {
            snapshot: Some(filled),
            code: ExchangeCode::Ok,
        });

        let report = engine
            .advance(ctx!(gw, ledger, info, window, 1_000), Price::new(dec!(100.5)))
            .await
            .unwrap()
            .expect("fill must produce a close report");

        assert_eq!(report.side, OrderSide::Buy);
        assert_eq!(report.revenue, rust_decimal::Decimal::ZERO);
        assert_eq!(ledger.len(), 1);
        assert_eq!(ledger.lots()[0].status, LotStatus::Closed);
    }

    #[tokio::test]
    async fn test_lost_order_aborts_and_cleans_up_buy() {
        let gw = ScriptedGateway::new();
        gw.set_wallet(dec!(100));
        let (_dir, mut ledger) = temp_ledger();
        let info = test_info();
        let window = PriceWindow::new(600_000);
        let mut engine = TrailEngine::new(test_config());

        engine
            .start_buy(ctx!(gw, ledger, info, window, 0), Price::new(dec!(100)))
            .await
            .unwrap();
        assert_eq!(ledger.len(), 1);
        let order_id = engine.active().order_id.clone();

        // Default fetch outcome is NotFoundLive: the exchange lost it.
        engine
            .advance(ctx!(gw, ledger, info, window, 1_000), Price::new(dec!(100.5)))
            .await
            .unwrap();

        assert!(!engine.is_active());
        assert!(ledger.is_empty());
        let calls = gw.calls();
        assert!(calls.iter().any(|call| matches!(
            call,
            GatewayCall::Cancel { order_id: oid, .. } if *oid == order_id
        )));
        assert!(calls
            .iter()
            .any(|call| matches!(call, GatewayCall::WalletBalance { .. })));
    }

    #[tokio::test]
    async fn test_spiked_sell_order_is_cancelled() {
        let gw = ScriptedGateway::new();
        gw.set_wallet(dec!(100));
        let (_dir, mut ledger) = temp_ledger();
        ledger.register_buy(closed_lot("a", dec!(95), dec!(0.5), dec!(47.5))).unwrap();
        let info = test_info();
        let window = PriceWindow::new(600_000);
        let mut engine = TrailEngine::new(test_config());

        let scan = scan_sells(
            Price::new(dec!(100)),
            dec!(1),
            dec!(0.5),
            ledger.lots(),
            &PriceLimits::default(),
            info.base_precision,
        );
        engine
            .start_sell(ctx!(gw, ledger, info, window, 0), Price::new(dec!(100)), &scan)
            .await
            .unwrap();

        // Remote trigger above spot on a sell: it should have fired.
        let spiked = remote_order(&engine, OrderStatus::Untriggered, dec!(101), dec!(0), dec!(0));
        gw.script_fetch(FetchOutcome {
            snapshot: Some(spiked),
            code: ExchangeCode::Ok,
        });

        engine
            .advance(ctx!(gw, ledger, info, window, 1_000), Price::new(dec!(99.4)))
            .await
            .unwrap();

        assert!(!engine.is_active());
        // Sell-side abort keeps the lots; only the wallet resync runs.
        assert_eq!(ledger.len(), 1);
        assert!(gw
            .calls()
            .iter()
            .any(|call| matches!(call, GatewayCall::Cancel { .. })));
    }

    #[tokio::test]
    async fn test_stuck_timer_forces_reconciliation() {
        let gw = ScriptedGateway::new();
        let (_dir, mut ledger) = temp_ledger();
        ledger.register_buy(closed_lot("a", dec!(95), dec!(0.5), dec!(47.5))).unwrap();
        let info = test_info();
        let window = PriceWindow::new(600_000);
        let mut engine = TrailEngine::new(test_config());

        let scan = scan_sells(
            Price::new(dec!(100)),
            dec!(1),
            dec!(0.5),
            ledger.lots(),
            &PriceLimits::default(),
            info.base_precision,
        );
        engine
            .start_sell(ctx!(gw, ledger, info, window, 0), Price::new(dec!(100)), &scan)
            .await
            .unwrap();

        // Still resting remotely, trigger consistent with spot.
        let resting = remote_order(&engine, OrderStatus::Untriggered, dec!(99.5), dec!(0), dec!(0));
        gw.script_fetch(FetchOutcome {
            snapshot: Some(resting),
            code: ExchangeCode::Ok,
        });

        // Within the interval and above the trigger: no check.
        engine
            .advance(ctx!(gw, ledger, info, window, 5_000), Price::new(dec!(100.2)))
            .await
            .unwrap();
        assert!(!gw.calls().iter().any(|c| matches!(c, GatewayCall::Fetch { .. })));

        // Past the interval: the additional check fires even though the
        // trigger was never crossed.
        engine
            .advance(ctx!(gw, ledger, info, window, 21_000), Price::new(dec!(100.2)))
            .await
            .unwrap();
        assert!(gw.calls().iter().any(|c| matches!(c, GatewayCall::Fetch { .. })));
        assert!(engine.is_active());
    }

    #[tokio::test]
    async fn test_amend_sell_quantity_adopts_new_lot_set() {
        let gw = ScriptedGateway::new();
        let (_dir, mut ledger) = temp_ledger();
        ledger.register_buy(closed_lot("a", dec!(95), dec!(0.5), dec!(47.5))).unwrap();
        ledger.register_buy(closed_lot("b", dec!(96), dec!(0.5), dec!(48))).unwrap();
        let info = test_info();
        let window = PriceWindow::new(600_000);
        let mut engine = TrailEngine::new(test_config());

        let scan = scan_sells(
            Price::new(dec!(97)),
            dec!(1),
            dec!(0.5),
            &ledger.lots()[..1],
            &PriceLimits::default(),
            info.base_precision,
        );
        engine
            .start_sell(ctx!(gw, ledger, info, window, 0), Price::new(dec!(97)), &scan)
            .await
            .unwrap();
        assert_eq!(engine.sell_lots().len(), 1);

        // Price rose, the second lot is profitable now too.
        let wider = scan_sells(
            Price::new(dec!(100)),
            dec!(1),
            dec!(0.5),
            ledger.lots(),
            &PriceLimits::default(),
            info.base_precision,
        );
        assert_eq!(wider.lots.len(), 2);
        engine
            .amend_sell_quantity(ctx!(gw, ledger, info, window, 1_000), &wider)
            .await
            .unwrap();

        assert_eq!(engine.sell_lots().len(), 2);
        assert_eq!(engine.active().qty, wider.qty);
    }

    #[tokio::test]
    async fn test_amend_sell_quantity_not_found_keeps_lot_set() {
        let gw = ScriptedGateway::new();
        let (_dir, mut ledger) = temp_ledger();
        ledger.register_buy(closed_lot("a", dec!(95), dec!(0.5), dec!(47.5))).unwrap();
        let info = test_info();
        let window = PriceWindow::new(600_000);
        let mut engine = TrailEngine::new(test_config());

        let scan = scan_sells(
            Price::new(dec!(100)),
            dec!(1),
            dec!(0.5),
            ledger.lots(),
            &PriceLimits::default(),
            info.base_precision,
        );
        engine
            .start_sell(ctx!(gw, ledger, info, window, 0), Price::new(dec!(100)), &scan)
            .await
            .unwrap();
        let qty_before = engine.active().qty;

        gw.script_amend_quantity(AmendOutcome::of(ExchangeCode::NotFoundOrClosed, "gone"));
        let changed = SellScan {
            lots: vec![],
            qty: Qty::new(dec!(0.1)),
            can_sell: true,
            rise_to: None,
        };
        engine
            .amend_sell_quantity(ctx!(gw, ledger, info, window, 1_000), &changed)
            .await
            .unwrap();

        // The order already hit; quantity and lot set stay as they were.
        assert_eq!(engine.active().qty, qty_before);
        assert_eq!(engine.sell_lots().len(), 1);
    }

    #[tokio::test]
    async fn test_cancel_active_buy_removes_lot() {
        let gw = ScriptedGateway::new();
        let (_dir, mut ledger) = temp_ledger();
        let info = test_info();
        let window = PriceWindow::new(600_000);
        let mut engine = TrailEngine::new(test_config());

        engine
            .start_buy(ctx!(gw, ledger, info, window, 0), Price::new(dec!(100)))
            .await
            .unwrap();
        assert_eq!(ledger.len(), 1);

        let report = engine
            .cancel_active_buy(ctx!(gw, ledger, info, window, 1_000), Price::new(dec!(100)))
            .await
            .unwrap();

        assert!(report.is_none());
        assert!(!engine.is_active());
        assert!(ledger.is_empty());
    }

    #[tokio::test]
    async fn test_cancel_active_buy_already_filled_closes_trail() {
        let gw = ScriptedGateway::new();
        let (_dir, mut ledger) = temp_ledger();
        let info = test_info();
        let window = PriceWindow::new(600_000);
        let mut engine = TrailEngine::new(test_config());

        engine
            .start_buy(ctx!(gw, ledger, info, window, 0), Price::new(dec!(100)))
            .await
            .unwrap();

        gw.script_cancel(CancelOutcome::NotFound);
        let filled = remote_order(&engine, OrderStatus::Filled, dec!(100.5), dec!(100.6), dec!(0));
        gw.script_fetch(FetchOutcome {
            snapshot: Some(filled),
            code: ExchangeCode::Ok,
        });

        let report = engine
            .cancel_active_buy(ctx!(gw, ledger, info, window, 1_000), Price::new(dec!(100)))
            .await
            .unwrap();

        assert!(report.is_some());
        assert_eq!(ledger.lots()[0].status, LotStatus::Closed);
    }
}
