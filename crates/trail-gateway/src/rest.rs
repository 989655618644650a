//! REST implementation of the order gateway.
//!
//! JSON-RPC over HTTP GET, bearer-authenticated for private endpoints.
//! All responses pass the envelope check; order payloads pass the decode
//! boundary. Amend and fetch never surface transport errors — they
//! degrade to `ExchangeCode::Other` with the message preserved.

use crate::auth::RestAuthProvider;
use crate::decode::{OrderSnapshot, RawOrder, RawPlaceResult};
use crate::envelope::RpcEnvelope;
use crate::error::{GatewayError, GatewayResult};
use crate::gateway::{
    AmendOutcome, AuthProvider, CancelOutcome, FetchOutcome, OrderGateway, PlaceOrder, PlacedOrder,
};
use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};
use trail_core::{ClientOrderId, ExchangeCode, InstrumentInfo, Kline, OrderSide, Price, Qty, Ticker};

/// Default timeout for REST requests.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// REST gateway configuration.
#[derive(Debug, Clone)]
pub struct RestGatewayConfig {
    /// API base URL, e.g. `https://www.deribit.com/api/v2`.
    pub api_url: String,
    /// Quote currency used for label lookups and account queries.
    pub currency: String,
}

/// Outcome of one validated private call.
enum CallResult {
    Ok(Value),
    Exchange(ExchangeCode, String),
}

/// REST order gateway.
pub struct RestGateway {
    http: reqwest::Client,
    config: RestGatewayConfig,
    auth: Arc<dyn AuthProvider>,
}

impl RestGateway {
    pub fn new(config: RestGatewayConfig, auth: Arc<dyn AuthProvider>) -> GatewayResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .map_err(|e| GatewayError::Transport(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { http, config, auth })
    }

    /// Build a gateway with its own auth provider from credentials.
    pub fn with_auth(config: RestGatewayConfig, auth_config: crate::auth::AuthConfig) -> GatewayResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .map_err(|e| GatewayError::Transport(format!("failed to build HTTP client: {e}")))?;
        let auth = Arc::new(RestAuthProvider::new(http.clone(), auth_config));
        Ok(Self { http, config, auth })
    }

    async fn call_public(&self, endpoint: &str, params: &[(&str, String)]) -> GatewayResult<Value> {
        let url = format!("{}{}", self.config.api_url, endpoint);
        debug!(endpoint, "session");
        let response = self.http.get(&url).query(params).send().await?;
        let body = response.text().await?;
        let envelope = RpcEnvelope::parse(&body)
            .map_err(|e| GatewayError::Decode(format!("{endpoint}: {e}")))?;
        envelope
            .check(endpoint)
            .map_err(|(_, message)| GatewayError::Rejected { message })
    }

    async fn call_private(
        &self,
        endpoint: &str,
        params: &[(&str, String)],
    ) -> GatewayResult<CallResult> {
        let token = self.auth.access_token().await?;
        let url = format!("{}{}", self.config.api_url, endpoint);
        debug!(endpoint, "session");
        let response = self
            .http
            .get(&url)
            .bearer_auth(token)
            .query(params)
            .send()
            .await?;
        let body = response.text().await?;
        let envelope = RpcEnvelope::parse(&body)
            .map_err(|e| GatewayError::Decode(format!("{endpoint}: {e}")))?;
        match envelope.check(endpoint) {
            Ok(result) => Ok(CallResult::Ok(result)),
            Err((code, message)) => Ok(CallResult::Exchange(code, message)),
        }
    }

    /// Private call for operations that must never error out: transport
    /// and auth failures degrade to `ExchangeCode::Other`.
    async fn call_private_soft(&self, endpoint: &str, params: &[(&str, String)]) -> CallResult {
        match self.call_private(endpoint, params).await {
            Ok(result) => result,
            Err(e) => CallResult::Exchange(ExchangeCode::Other, e.to_string()),
        }
    }

    // --- Market data (public) ---

    /// Latest ticker for the symbol.
    pub async fn fetch_ticker(&self, symbol: &str) -> GatewayResult<Ticker> {
        #[derive(Deserialize)]
        struct RawTicker {
            timestamp: i64,
            instrument_name: String,
            last_price: Decimal,
        }

        let result = self
            .call_public("/public/ticker", &[("instrument_name", symbol.to_string())])
            .await?;
        let raw: RawTicker = serde_json::from_value(result)
            .map_err(|e| GatewayError::Decode(format!("ticker: {e}")))?;
        Ok(Ticker {
            time: raw.timestamp,
            symbol: raw.instrument_name,
            last_price: Price::new(raw.last_price),
        })
    }

    /// Trading constraints for the symbol. Derived minimum buy sizes are
    /// left at zero; the caller recalculates them for multiplier and
    /// compounding.
    pub async fn fetch_instrument(&self, symbol: &str) -> GatewayResult<InstrumentInfo> {
        #[derive(Deserialize)]
        struct RawInstrument {
            instrument_name: String,
            base_currency: String,
            quote_currency: String,
            is_active: bool,
            contract_size: Decimal,
            tick_size: Decimal,
            min_trade_amount: Decimal,
        }

        let result = self
            .call_public(
                "/public/get_instrument",
                &[("instrument_name", symbol.to_string())],
            )
            .await?;
        let raw: RawInstrument = serde_json::from_value(result)
            .map_err(|e| GatewayError::Decode(format!("instrument: {e}")))?;

        Ok(InstrumentInfo {
            symbol: raw.instrument_name,
            base_coin: raw.base_currency,
            quote_coin: raw.quote_currency,
            active: raw.is_active,
            base_precision: Qty::new(raw.contract_size),
            quote_precision: Price::new(raw.tick_size),
            tick_size: Price::new(raw.tick_size),
            min_order_qty: Qty::new(raw.min_trade_amount),
            min_buy_base: Qty::ZERO,
            min_buy_quote: Decimal::ZERO,
            refreshed_at: chrono::Utc::now().timestamp_millis(),
        })
    }

    /// Historical bars, newest last. Warns when the exchange returns
    /// fewer bars than requested.
    pub async fn fetch_klines(
        &self,
        symbol: &str,
        interval_min: u32,
        limit: usize,
    ) -> GatewayResult<Vec<Kline>> {
        #[derive(Deserialize)]
        struct RawChart {
            ticks: Vec<i64>,
            open: Vec<Decimal>,
            high: Vec<Decimal>,
            low: Vec<Decimal>,
            close: Vec<Decimal>,
            volume: Vec<Decimal>,
            cost: Vec<Decimal>,
        }

        let end = chrono::Utc::now().timestamp_millis();
        let start = end - (interval_min as i64) * (limit as i64 - 1) * 60 * 1000;
        let result = self
            .call_public(
                "/public/get_tradingview_chart_data",
                &[
                    ("instrument_name", symbol.to_string()),
                    ("start_timestamp", start.to_string()),
                    ("end_timestamp", end.to_string()),
                    ("resolution", interval_min.to_string()),
                ],
            )
            .await?;
        let raw: RawChart = serde_json::from_value(result)
            .map_err(|e| GatewayError::Decode(format!("chart data: {e}")))?;

        // The arrays are parallel; a truncated response must not panic.
        let count = raw
            .ticks
            .len()
            .min(raw.open.len())
            .min(raw.high.len())
            .min(raw.low.len())
            .min(raw.close.len())
            .min(raw.volume.len())
            .min(raw.cost.len());
        let bars: Vec<Kline> = (0..count)
            .map(|i| Kline {
                time: raw.ticks[i],
                open: Price::new(raw.open[i]),
                high: Price::new(raw.high[i]),
                low: Price::new(raw.low[i]),
                close: Price::new(raw.close[i]),
                volume: raw.volume[i],
                turnover: raw.cost[i],
            })
            .collect();

        if bars.len() != limit {
            warn!(
                requested = limit,
                received = bars.len(),
                interval_min,
                "Exchange returned fewer klines than requested"
            );
        }
        Ok(bars)
    }
}

#[async_trait]
impl OrderGateway for RestGateway {
    async fn place(&self, req: &PlaceOrder) -> GatewayResult<PlacedOrder> {
        let endpoint = match req.side {
            OrderSide::Buy => "/private/buy",
            OrderSide::Sell => "/private/sell",
        };
        let params = [
            ("instrument_name", req.symbol.clone()),
            ("amount", req.qty.inner().to_string()),
            ("type", "stop_market".to_string()),
            ("label", req.link_id.as_str().to_string()),
            ("trigger", "index_price".to_string()),
            ("trigger_price", req.trigger.inner().to_string()),
        ];

        match self.call_private(endpoint, &params).await? {
            CallResult::Ok(result) => {
                let raw: RawPlaceResult = serde_json::from_value(result)
                    .map_err(|e| GatewayError::Decode(format!("{endpoint}: {e}")))?;
                let snapshot = OrderSnapshot::from_raw(raw.order)?;
                info!(
                    order_id = %snapshot.order_id,
                    side = %req.side,
                    trigger = %req.trigger,
                    qty = %req.qty,
                    "Order placed"
                );
                Ok(PlacedOrder {
                    order_id: snapshot.order_id.clone(),
                    snapshot,
                })
            }
            CallResult::Exchange(code, message) => {
                error!(%code, %message, "Order placement rejected");
                Err(GatewayError::Rejected { message })
            }
        }
    }

    async fn cancel(
        &self,
        order_id: &str,
        link_id: &ClientOrderId,
    ) -> GatewayResult<CancelOutcome> {
        let params = [("label", link_id.as_str().to_string())];
        match self.call_private("/private/cancel_by_label", &params).await? {
            CallResult::Ok(result) => {
                // The endpoint reports how many orders were cancelled.
                let cancelled = result.as_u64().unwrap_or(0);
                if cancelled == 0 {
                    debug!(order_id, %link_id, "Cancel found nothing to cancel");
                    Ok(CancelOutcome::NotFound)
                } else {
                    info!(order_id, %link_id, "Order cancelled");
                    Ok(CancelOutcome::Cancelled)
                }
            }
            CallResult::Exchange(_, message) => Err(GatewayError::Rejected { message }),
        }
    }

    async fn amend_trigger(&self, order_id: &str, qty: Qty, trigger: Price) -> AmendOutcome {
        let params = [
            ("order_id", order_id.to_string()),
            ("amount", qty.inner().to_string()),
            ("trigger_price", trigger.inner().to_string()),
        ];
        match self.call_private_soft("/private/edit", &params).await {
            CallResult::Ok(_) => AmendOutcome::ok(),
            CallResult::Exchange(code, message) => AmendOutcome::of(code, message),
        }
    }

    async fn amend_quantity(&self, order_id: &str, qty: Qty) -> AmendOutcome {
        let params = [
            ("order_id", order_id.to_string()),
            ("amount", qty.inner().to_string()),
        ];
        match self.call_private_soft("/private/edit", &params).await {
            CallResult::Ok(_) => AmendOutcome::ok(),
            CallResult::Exchange(code, message) => AmendOutcome::of(code, message),
        }
    }

    async fn fetch_order(&self, order_id: &str, link_id: &ClientOrderId) -> FetchOutcome {
        // First try by exchange id: works while the order is live.
        let by_id = self
            .call_private_soft(
                "/private/get_order_state",
                &[("order_id", order_id.to_string())],
            )
            .await;
        if let CallResult::Ok(result) = by_id {
            if let Some(snapshot) = decode_order_value(result) {
                return FetchOutcome {
                    snapshot: Some(snapshot),
                    code: ExchangeCode::Ok,
                };
            }
        }

        // Fall back to the label lookup: finds filled orders too. An empty
        // result means the exchange lost the order.
        let by_label = self
            .call_private_soft(
                "/private/get_order_state_by_label",
                &[
                    ("currency", self.config.currency.clone()),
                    ("label", link_id.as_str().to_string()),
                ],
            )
            .await;
        match by_label {
            CallResult::Ok(Value::Array(orders)) => {
                // Labels are unique on our side; the first entry is ours.
                match orders.into_iter().next() {
                    Some(first) => match decode_order_value(first) {
                        Some(snapshot) => FetchOutcome {
                            snapshot: Some(snapshot),
                            code: ExchangeCode::Ok,
                        },
                        None => FetchOutcome {
                            snapshot: None,
                            code: ExchangeCode::Other,
                        },
                    },
                    None => {
                        error!(
                            order_id,
                            %link_id,
                            "Order disappeared from the exchange"
                        );
                        FetchOutcome {
                            snapshot: None,
                            code: ExchangeCode::NotFoundLive,
                        }
                    }
                }
            }
            CallResult::Ok(_) => {
                warn!(order_id, %link_id, "Unexpected label lookup payload");
                FetchOutcome {
                    snapshot: None,
                    code: ExchangeCode::Other,
                }
            }
            CallResult::Exchange(code, message) => {
                warn!(order_id, %link_id, %code, %message, "Order lookup failed");
                FetchOutcome {
                    snapshot: None,
                    code,
                }
            }
        }
    }

    async fn wallet_balance(&self, coin: &str) -> GatewayResult<Decimal> {
        let params = [("currency", coin.to_string())];
        match self
            .call_private("/private/get_account_summary", &params)
            .await?
        {
            CallResult::Ok(result) => {
                // Missing or null balance reads as zero.
                let balance = result
                    .get("balance")
                    .and_then(Value::as_str)
                    .and_then(|s| s.parse().ok())
                    .or_else(|| {
                        result
                            .get("balance")
                            .and_then(Value::as_f64)
                            .and_then(|f| Decimal::try_from(f).ok())
                    })
                    .unwrap_or(Decimal::ZERO);
                Ok(balance)
            }
            CallResult::Exchange(_, message) => Err(GatewayError::Rejected { message }),
        }
    }
}

/// Decode an order payload value, logging on failure.
fn decode_order_value(value: Value) -> Option<OrderSnapshot> {
    let raw: RawOrder = match serde_json::from_value(value) {
        Ok(raw) => raw,
        Err(e) => {
            warn!(error = %e, "Undecodable order payload");
            return None;
        }
    };
    match OrderSnapshot::from_raw(raw) {
        Ok(snapshot) => Some(snapshot),
        Err(e) => {
            warn!(error = %e, "Order payload failed decode boundary");
            None
        }
    }
}
