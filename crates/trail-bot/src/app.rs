//! Application orchestration.
//!
//! Builds the component graph, preloads exchange state, then runs the
//! dispatcher: a single event loop that routes stream events to
//! handlers and runs the periodic housekeeping. All trading state lives
//! in the [`Session`] owned here; handlers execute to completion before
//! the next event is processed, and a busy flag skips the derived
//! actions of ticks that arrive while a previous tick is still being
//! handled.

use crate::audit::AuditLog;
use crate::config::AppConfig;
use crate::error::{AppError, AppResult};
use crate::session::Session;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use trail_core::{Compounding, Kline, LotStatus, OrderSide, Price};
use trail_engine::{decide_buy, scan_sells, BuyInputs, CloseReport, TrailContext, TrailEngine};
use trail_feed::{
    BookLevel, DepthTracker, FlowTracker, IndicatorEvaluator, KlineSeries, NeutralIndicator,
    PriceWindow, Trade,
};
use trail_gateway::{AuthConfig, OrderGateway, RestGateway, RestGatewayConfig};
use trail_ledger::{Ledger, RevenueLog};
use trail_ws::{BookSnapshot, MarketStream, PublicTrade, StreamConfig, WsEvent};

/// Quote coin implied by a `BASE_QUOTE` symbol.
fn quote_coin_of(symbol: &str) -> String {
    symbol
        .rsplit('_')
        .next()
        .unwrap_or(symbol)
        .to_uppercase()
}

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Main application.
pub struct Application {
    config: AppConfig,
    gateway: Arc<RestGateway>,
    evaluator: Arc<dyn IndicatorEvaluator>,
    audit: AuditLog,
    session: Option<Session>,
    halt: CancellationToken,
}

impl Application {
    /// Build the component graph. Market state is loaded later by
    /// [`Application::preload`].
    pub fn new(config: AppConfig) -> AppResult<Self> {
        let (client_id, client_secret) = config.credentials()?;
        let auth_config = AuthConfig::new(&config.api_url, client_id, client_secret);
        let gateway_config = RestGatewayConfig {
            api_url: config.api_url.clone(),
            currency: quote_coin_of(&config.symbol),
        };
        let gateway = Arc::new(RestGateway::with_auth(gateway_config, auth_config)?);
        let audit = AuditLog::init(&config.audit_file)?;

        Ok(Self {
            config,
            gateway,
            evaluator: Arc::new(NeutralIndicator),
            audit,
            session: None,
            halt: CancellationToken::new(),
        })
    }

    /// Replace the indicator evaluator before preload.
    pub fn with_indicator(mut self, evaluator: Arc<dyn IndicatorEvaluator>) -> Self {
        self.evaluator = evaluator;
        self
    }

    /// Token that halts the event loop and the stream at their next
    /// checkpoint.
    pub fn halt_token(&self) -> CancellationToken {
        self.halt.clone()
    }

    /// Preload everything the loop needs: ticker, instrument info,
    /// klines, the ledger (verified against the exchange), wallet
    /// report and the initial price window.
    pub async fn preload(&mut self) -> AppResult<()> {
        let config = &self.config;
        info!(symbol = %config.symbol, "Preloading exchange state");

        let ticker = self.gateway.fetch_ticker(&config.symbol).await?;
        let spot = ticker.last_price;
        info!(%spot, "Initial spot price set from exchange");

        let mut compounding = Compounding {
            enabled: config.compounding.enabled,
            start: config.compounding.start,
            now: config.compounding.start,
        };

        let mut info = self.gateway.fetch_instrument(&config.symbol).await?;
        info.recalculate(spot, config.multiplier, &compounding);
        info!(
            base = %info.base_coin,
            quote = %info.quote_coin,
            tick_size = %info.tick_size,
            min_buy_base = %info.min_buy_base,
            "Instrument info loaded"
        );

        // First run: the ledger file must exist before the strict load.
        ensure_file(&config.ledger_file)?;
        let mut ledger = Ledger::load(&config.ledger_file)?;
        self.verify_ledger_orders(&mut ledger).await?;

        let revenue = if config.revenue_file.is_empty() {
            None
        } else {
            Some(RevenueLog::init(&config.revenue_file, config.revenue_sides)?)
        };

        let mut klines = HashMap::new();
        for interval in config.active_intervals() {
            let mut series = KlineSeries::new(interval, config.kline_limit);
            series.seed(
                self.gateway
                    .fetch_klines(&config.symbol, interval, config.kline_limit)
                    .await?,
            );
            info!(interval, bars = series.len(), "Kline history loaded");
            klines.insert(interval, series);
        }

        let mut window = PriceWindow::new(config.price_window_ms);
        let minutes = (config.price_window_ms / 60_000).clamp(2, 1_000) as usize;
        let seed_bars: Vec<Kline> = self.gateway.fetch_klines(&config.symbol, 1, minutes).await?;
        window.seed(seed_bars.into_iter().map(|bar| (bar.time, bar.close)));
        window.push(ticker.time, spot);
        info!(ticks = window.len(), "Price window seeded from klines");

        if config.rebalance_at_start {
            match self.gateway.wallet_balance(&info.base_coin).await {
                Ok(balance) => {
                    ledger.rebalance(trail_core::Qty::new(balance))?;
                }
                Err(e) => warn!(error = %e, "Startup rebalance skipped, wallet unavailable"),
            }
        }

        if config.wallet_report {
            match self.report_wallet(&info, &ledger, spot).await {
                Ok(bot_value) => {
                    compounding.now = bot_value;
                    if compounding.enabled {
                        info.recalculate(spot, config.multiplier, &compounding);
                    }
                }
                Err(e) => warn!(error = %e, "Startup wallet report failed"),
            }
        }

        let engine = TrailEngine::new(config.trail.clone());
        self.session = Some(Session {
            spot,
            info,
            engine,
            ledger,
            revenue,
            window,
            klines,
            indicator_advice: HashMap::new(),
            depth: DepthTracker::new(config.depth.clone()),
            depth_advice: Default::default(),
            flow: FlowTracker::new(config.flow.clone()),
            flow_advice: Default::default(),
            compounding,
            busy: false,
            last_tick_ms: now_ms(),
        });
        info!("Preload complete");
        Ok(())
    }

    /// Re-check every persisted lot against the exchange; only fills
    /// survive, promoted to closed.
    async fn verify_ledger_orders(&self, ledger: &mut Ledger) -> AppResult<()> {
        info!(lots = ledger.len(), "Verifying ledger orders on the exchange");
        let mut kept = Vec::new();
        for lot in ledger.lots().to_vec() {
            if self.config.quick_check && lot.status == LotStatus::Closed {
                kept.push(lot);
                continue;
            }
            let fetch = self
                .gateway
                .fetch_order(&lot.order_id, &lot.order_link_id)
                .await;
            match fetch.snapshot {
                Some(snapshot) if snapshot.status.is_filled() => {
                    kept.push(snapshot.into_lot(LotStatus::Closed));
                }
                Some(snapshot) => {
                    warn!(
                        order_id = %lot.order_id,
                        status = %snapshot.status,
                        "Persisted lot is not filled on the exchange, dropping it"
                    );
                }
                None => {
                    warn!(
                        order_id = %lot.order_id,
                        code = %fetch.code,
                        "Persisted lot unknown to the exchange, dropping it"
                    );
                }
            }
        }
        ledger.replace_all(kept)?;
        Ok(())
    }

    /// Run the dispatcher until halted.
    pub async fn run(mut self) -> AppResult<()> {
        let mut session = self
            .session
            .take()
            .ok_or_else(|| AppError::Config("preload must run before the event loop".into()))?;

        let (event_tx, mut event_rx) = mpsc::channel::<WsEvent>(1024);
        let stream_config = StreamConfig {
            url: self.config.ws_url.clone(),
            symbol: self.config.symbol.clone(),
            intervals: self.config.active_intervals(),
            subscribe_book: self.config.subscribe_book,
            subscribe_trades: self.config.subscribe_trades,
            reconnect_delay_ms: self.config.websocket.reconnect_delay_ms,
            heartbeat_interval_ms: self.config.websocket.heartbeat_interval_ms,
        };
        let stream = MarketStream::new(stream_config, event_tx, self.halt.clone());
        let stream_handle = tokio::spawn(async move { stream.run().await });

        let mut ping = tokio::time::interval(Duration::from_millis(
            self.config.watchdog.ping_interval_ms,
        ));
        ping.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        let mut periodic =
            tokio::time::interval(Duration::from_millis(self.config.periodic_interval_ms));
        periodic.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // Both intervals fire immediately once; swallow that.
        ping.tick().await;
        periodic.tick().await;

        info!("Entering event loop");
        loop {
            tokio::select! {
                maybe_event = event_rx.recv() => {
                    match maybe_event {
                        Some(event) => {
                            if let Err(e) = self.handle_event(&mut session, event).await {
                                // The tick must not take the loop down:
                                // log, audit, drop to the idle-safe state.
                                error!(error = %e, "Handler failed, dropping to idle-safe state");
                                self.audit.record("handler-failure", &e.to_string());
                                session.engine.force_idle();
                                session.busy = false;
                            }
                        }
                        None => {
                            warn!("Event stream closed");
                            break;
                        }
                    }
                }

                _ = ping.tick() => {
                    self.watchdog(&session);
                }

                _ = periodic.tick() => {
                    if let Err(e) = self.refresh_instrument(&mut session).await {
                        warn!(error = %e, "Periodic instrument refresh failed");
                    }
                }

                _ = tokio::signal::ctrl_c() => {
                    info!("Shutdown signal received");
                    self.halt.cancel();
                    break;
                }

                () = self.halt.cancelled() => {
                    info!("Halt requested");
                    break;
                }
            }
        }

        stream_handle.abort();
        info!("Dispatcher stopped");
        Ok(())
    }

    async fn handle_event(&self, session: &mut Session, event: WsEvent) -> AppResult<()> {
        match event {
            WsEvent::Tick { time, price } => self.on_tick(session, time, price).await,
            WsEvent::Kline { interval_min, bar } => self.on_kline(session, interval_min, bar).await,
            WsEvent::Book(snapshot) => {
                self.on_book(session, snapshot);
                Ok(())
            }
            WsEvent::Trades(trades) => {
                self.on_trades(session, trades);
                Ok(())
            }
            WsEvent::Subscribed(channels) => {
                info!(?channels, "Subscription confirmed");
                Ok(())
            }
            WsEvent::Unhandled { channel } => {
                debug!(channel, "Message on unhandled channel, this can occur at start");
                Ok(())
            }
        }
    }

    /// Price tick: always record the price; run the derived actions only
    /// when no earlier tick is still being processed.
    pub(crate) async fn on_tick(
        &self,
        session: &mut Session,
        time: i64,
        price: Price,
    ) -> AppResult<()> {
        // The stream does not align prices to the tick grid.
        let price = price.round_down_to(session.info.tick_size);
        session.window.push(time, price);
        session.last_tick_ms = now_ms();

        if session.busy {
            session.spot = price;
            info!("Tick handler busy, catching up on the next tick");
            return Ok(());
        }

        session.busy = true;
        let result = self.process_tick(session, price).await;
        session.spot = price;
        session.busy = false;
        result
    }

    async fn process_tick(&self, session: &mut Session, price: Price) -> AppResult<()> {
        let now = now_ms();

        // Advance the running trail before anything else looks at the
        // ledger; a fill changes what is sellable.
        if session.engine.is_active() {
            let report = {
                let mut ctx = TrailContext {
                    gateway: &*self.gateway,
                    ledger: &mut session.ledger,
                    revenue: session.revenue.as_ref(),
                    info: &session.info,
                    window: &session.window,
                    now_ms: now,
                };
                session.engine.advance(&mut ctx, price).await?
            };
            if let Some(report) = report {
                self.after_close(session, &report, price).await;
            }
        }

        if session.spot == price {
            return Ok(());
        }

        let scan = scan_sells(
            price,
            session.engine.config().profit_pct,
            session.engine.base_distance_pct(),
            session.ledger.lots(),
            &self.config.signals.price_limit,
            session.info.base_precision,
        );
        debug!(
            from = %session.spot,
            to = %price,
            sellable = scan.can_sell,
            candidates = scan.lots.len(),
            rise_to = ?scan.rise_to,
            "Price changed"
        );

        // A trailing buy while a profitable sell exists is backwards:
        // cancel the buy and let the sell path take over.
        if session.engine.is_active()
            && session.engine.active().side == OrderSide::Buy
            && scan.can_sell
        {
            let report = {
                let mut ctx = TrailContext {
                    gateway: &*self.gateway,
                    ledger: &mut session.ledger,
                    revenue: session.revenue.as_ref(),
                    info: &session.info,
                    window: &session.window,
                    now_ms: now,
                };
                session.engine.cancel_active_buy(&mut ctx, price).await?
            };
            if let Some(report) = report {
                self.after_close(session, &report, price).await;
            }
        }

        // Initiate the sell trail.
        if !session.engine.is_active() && scan.can_sell {
            let mut ctx = TrailContext {
                gateway: &*self.gateway,
                ledger: &mut session.ledger,
                revenue: session.revenue.as_ref(),
                info: &session.info,
                window: &session.window,
                now_ms: now,
            };
            session.engine.start_sell(&mut ctx, price, &scan).await?;
        }
        // Or widen/narrow the one already running.
        else if session.engine.is_active()
            && session.engine.active().side == OrderSide::Sell
            && scan.qty.is_positive()
            && scan.qty != session.engine.active().qty
        {
            let ctx = TrailContext {
                gateway: &*self.gateway,
                ledger: &mut session.ledger,
                revenue: session.revenue.as_ref(),
                info: &session.info,
                window: &session.window,
                now_ms: now,
            };
            session.engine.amend_sell_quantity(&ctx, &scan).await?;
        }

        // Pure grid mode evaluates buys on every tick; with indicators
        // enabled the kline handler owns buy evaluation instead.
        if self.config.signals.spread.enabled
            && !self.config.signals.indicators.enabled
            && !session.engine.is_active()
        {
            self.maybe_buy(session, price, now).await?;
        }

        Ok(())
    }

    /// Kline update: maintain the series, refresh indicator advice and
    /// evaluate the buy matrix.
    async fn on_kline(&self, session: &mut Session, interval_min: u32, bar: Kline) -> AppResult<()> {
        let limit = self.config.kline_limit;
        let needs_refill = {
            let series = session
                .klines
                .entry(interval_min)
                .or_insert_with(|| KlineSeries::new(interval_min, limit));
            series.push(bar);
            !series.is_full()
        };

        if needs_refill {
            // The stream joined mid-history; refill from REST.
            match self
                .gateway
                .fetch_klines(&self.config.symbol, interval_min, limit)
                .await
            {
                Ok(bars) => {
                    if let Some(series) = session.klines.get_mut(&interval_min) {
                        series.seed(bars);
                        series.push(bar);
                    }
                }
                Err(e) => warn!(error = %e, interval_min, "Kline refill failed"),
            }
        }

        let advice = match session.klines.get(&interval_min) {
            Some(series) => self.evaluator.evaluate(series),
            None => return Ok(()),
        };
        session.indicator_advice.insert(interval_min, advice);
        debug!(
            interval_min,
            value = %advice.value,
            filled = advice.filled,
            "Indicator advice updated"
        );

        self.maybe_buy(session, session.spot, now_ms()).await
    }

    fn on_book(&self, session: &mut Session, snapshot: BookSnapshot) {
        let to_levels = |levels: &[(Decimal, Decimal)]| -> Vec<BookLevel> {
            levels
                .iter()
                .map(|&(price, qty)| BookLevel {
                    price: Price::new(price),
                    qty,
                })
                .collect()
        };
        let bids = to_levels(&snapshot.bids);
        let asks = to_levels(&snapshot.asks);
        session.depth_advice = session
            .depth
            .ingest(snapshot.time, session.spot, &bids, &asks);
    }

    fn on_trades(&self, session: &mut Session, trades: Vec<PublicTrade>) {
        let mapped: Vec<Trade> = trades
            .into_iter()
            .map(|t| Trade {
                time: t.time,
                side: t.side,
                qty: t.qty,
                price: t.price,
            })
            .collect();
        session.flow.ingest(&mapped);
        session.flow_advice = session.flow.advice(now_ms());
    }

    /// Evaluate the buy matrix and start a trailing buy when every
    /// enabled signal votes yes.
    async fn maybe_buy(&self, session: &mut Session, spot: Price, now: i64) -> AppResult<()> {
        if session.engine.is_active() {
            return Ok(());
        }

        let intervals = self.config.active_intervals();
        let decision = {
            let advice = session.indicator_snapshot(&intervals);
            let inputs = BuyInputs {
                spot,
                indicator_advice: &advice,
                depth_advice: session.depth_advice,
                flow_advice: session.flow_advice,
                lots: session.ledger.lots(),
            };
            decide_buy(&self.config.signals, &inputs)
        };

        if !decision.can_buy {
            debug!(blockers = ?decision.blockers, "Buy blocked");
            return Ok(());
        }

        info!("All enabled buy signals agree, starting trailing buy");
        session
            .info
            .recalculate(spot, self.config.multiplier, &session.compounding);
        let mut ctx = TrailContext {
            gateway: &*self.gateway,
            ledger: &mut session.ledger,
            revenue: session.revenue.as_ref(),
            info: &session.info,
            window: &session.window,
            now_ms: now,
        };
        session.engine.start_buy(&mut ctx, spot).await?;
        Ok(())
    }

    /// After a trail closed: report, refresh the wallet-derived
    /// compounding value and resize the instrument minimums.
    async fn after_close(&self, session: &mut Session, report: &CloseReport, spot: Price) {
        match report.side {
            OrderSide::Sell => info!(
                qty = %report.qty,
                avg_price = %report.avg_price,
                revenue = %report.revenue,
                quote = %session.info.quote_coin,
                "Trailing sell closed"
            ),
            OrderSide::Buy => info!(
                qty = %report.qty,
                avg_price = %report.avg_price,
                "Trailing buy closed"
            ),
        }

        if self.config.wallet_report {
            match self
                .report_wallet(&session.info, &session.ledger, spot)
                .await
            {
                Ok(bot_value) => session.compounding.now = bot_value,
                Err(e) => warn!(error = %e, "Wallet report failed"),
            }
        }
        if session.compounding.enabled {
            session
                .info
                .recalculate(spot, self.config.multiplier, &session.compounding);
        }
    }

    /// Wallet report: exchange holdings vs ledger, and the bot value in
    /// quote units (which drives compounding).
    async fn report_wallet(
        &self,
        info: &trail_core::InstrumentInfo,
        ledger: &Ledger,
        spot: Price,
    ) -> AppResult<Decimal> {
        let base_exchange = self.gateway.wallet_balance(&info.base_coin).await?;
        let quote_exchange = self.gateway.wallet_balance(&info.quote_coin).await?;
        let bot_value = base_exchange * spot.inner() + quote_exchange;
        let base_ledger = ledger.total_qty().inner();
        let out_of_sync = base_exchange - base_ledger;

        info!(
            bot_value = %bot_value,
            base_exchange = %base_exchange,
            quote_exchange = %quote_exchange,
            base_ledger = %base_ledger,
            out_of_sync = %out_of_sync,
            "Wallet report"
        );
        Ok(bot_value)
    }

    /// Staleness watchdog: announce uptime, escalate when the feed has
    /// gone quiet for too long.
    fn watchdog(&self, session: &Session) {
        let age = now_ms() - session.last_tick_ms;
        if age > self.config.watchdog.stale_after_ms {
            error!(
                age_ms = age,
                limit_ms = self.config.watchdog.stale_after_ms,
                "Last ticker update is too old"
            );
            self.audit
                .record("stale-ticker", &format!("last tick {age} ms ago"));
        } else {
            debug!(age_ms = age, "Uptime ping");
        }
    }

    /// Periodic housekeeping: refresh the exchange-reported instrument
    /// constraints.
    async fn refresh_instrument(&self, session: &mut Session) -> AppResult<()> {
        let mut fresh = self.gateway.fetch_instrument(&self.config.symbol).await?;
        fresh.recalculate(session.spot, self.config.multiplier, &session.compounding);
        session.info = fresh;
        info!("Instrument info refreshed");
        Ok(())
    }
}

/// Create an empty file (and its parent directory) when absent, so the
/// strict ledger load only ever fails on real corruption of access.
fn ensure_file(path: impl AsRef<Path>) -> AppResult<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    if !path.exists() {
        std::fs::write(path, "")?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use trail_core::{InstrumentInfo, Qty};
    use trail_engine::TrailConfig;

    fn test_session(dir: &tempfile::TempDir) -> Session {
        let ledger_path = dir.path().join("buys.json");
        std::fs::write(&ledger_path, "").unwrap();
        Session {
            spot: Price::new(dec!(100)),
            info: InstrumentInfo {
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
            },
            engine: TrailEngine::new(TrailConfig::default()),
            ledger: Ledger::load(ledger_path).unwrap(),
            revenue: None,
            window: PriceWindow::new(600_000),
            klines: HashMap::new(),
            indicator_advice: HashMap::new(),
            depth: DepthTracker::new(Default::default()),
            depth_advice: Default::default(),
            flow: FlowTracker::new(Default::default()),
            flow_advice: Default::default(),
            compounding: Compounding::disabled(),
            busy: false,
            last_tick_ms: 0,
        }
    }

    fn test_app() -> Application {
        std::env::set_var("TRAILBOT_CLIENT_ID", "test-id");
        std::env::set_var("TRAILBOT_CLIENT_SECRET", "test-secret");
        let mut config = AppConfig::default();
        // Indicator-gated buys with no advice recorded: the buy matrix
        // stays blocked, so tick handling never reaches the network.
        config.signals.spread.enabled = false;
        config.signals.indicators.enabled = true;
        config.signals.indicators.minimum = dec!(0.3);
        config.signals.indicators.maximum = dec!(1);
        let dir = tempfile::tempdir().unwrap();
        config.audit_file = dir
            .path()
            .join("errors.log")
            .to_string_lossy()
            .into_owned();
        let app = Application::new(config).unwrap();
        // Keep the tempdir alive for the process (tests only).
        std::mem::forget(dir);
        app
    }

    #[tokio::test]
    async fn test_busy_tick_records_price_and_skips_actions() {
        let app = test_app();
        let dir = tempfile::tempdir().unwrap();
        let mut session = test_session(&dir);
        session.busy = true;

        app.on_tick(&mut session, 1_000, Price::new(dec!(101.5)))
            .await
            .unwrap();

        // Spot caught up, but the busy flag is untouched and the window
        // received the tick.
        assert_eq!(session.spot.inner(), dec!(101.5));
        assert!(session.busy);
        assert_eq!(session.window.len(), 1);
        assert!(!session.engine.is_active());
    }

    #[tokio::test]
    async fn test_idle_tick_processes_and_releases_busy_flag() {
        let app = test_app();
        let dir = tempfile::tempdir().unwrap();
        let mut session = test_session(&dir);

        app.on_tick(&mut session, 1_000, Price::new(dec!(100.5)))
            .await
            .unwrap();

        assert_eq!(session.spot.inner(), dec!(100.5));
        assert!(!session.busy);
    }

    #[tokio::test]
    async fn test_skipped_tick_equals_processing_latest_alone() {
        let app = test_app();
        let dir = tempfile::tempdir().unwrap();

        // Run 1: t1 skipped while busy, t2 processed normally.
        let mut skipped = test_session(&dir);
        skipped.busy = true;
        app.on_tick(&mut skipped, 1_000, Price::new(dec!(101)))
            .await
            .unwrap();
        skipped.busy = false;
        app.on_tick(&mut skipped, 2_000, Price::new(dec!(102)))
            .await
            .unwrap();

        // Run 2: only t1's price recorded, then t2 processed alone.
        let dir2 = tempfile::tempdir().unwrap();
        let mut direct = test_session(&dir2);
        direct.spot = Price::new(dec!(101));
        app.on_tick(&mut direct, 2_000, Price::new(dec!(102)))
            .await
            .unwrap();

        assert_eq!(skipped.spot, direct.spot);
        assert_eq!(skipped.engine.is_active(), direct.engine.is_active());
        assert_eq!(skipped.busy, direct.busy);
    }

    #[test]
    fn test_quote_coin_derivation() {
        assert_eq!(quote_coin_of("BTC_USDC"), "USDC");
        assert_eq!(quote_coin_of("eth_usdt"), "USDT");
        assert_eq!(quote_coin_of("PLAIN"), "PLAIN");
    }
}
