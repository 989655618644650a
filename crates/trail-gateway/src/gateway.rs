//! Capability traits the trailing engine depends on.
//!
//! The engine only ever talks to these traits; the concrete exchange
//! implementation lives in [`crate::rest`]. Amend and fetch operations
//! return outcome structs carrying an [`ExchangeCode`] instead of
//! erroring, so the state machine can branch on the closed taxonomy
//! without ever seeing a transport exception.

use crate::decode::OrderSnapshot;
use crate::error::GatewayResult;
use async_trait::async_trait;
use trail_core::{ClientOrderId, ExchangeCode, Price, Qty};

/// Request to place a trigger order.
#[derive(Debug, Clone)]
pub struct PlaceOrder {
    pub symbol: String,
    pub side: trail_core::OrderSide,
    pub qty: Qty,
    pub trigger: Price,
    pub link_id: ClientOrderId,
}

/// Successful placement: the exchange-assigned id plus the decoded order.
#[derive(Debug, Clone)]
pub struct PlacedOrder {
    pub order_id: String,
    pub snapshot: OrderSnapshot,
}

/// Outcome of an amend call. `message` preserves the raw exchange or
/// transport message for logging when `code` is not `Ok`.
#[derive(Debug, Clone)]
pub struct AmendOutcome {
    pub code: ExchangeCode,
    pub message: Option<String>,
}

impl AmendOutcome {
    pub fn ok() -> Self {
        Self {
            code: ExchangeCode::Ok,
            message: None,
        }
    }

    pub fn of(code: ExchangeCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: Some(message.into()),
        }
    }
}

/// Outcome of an order lookup. `snapshot` is present whenever the
/// exchange returned a decodable order, even alongside a non-`Ok` code.
#[derive(Debug, Clone)]
pub struct FetchOutcome {
    pub snapshot: Option<OrderSnapshot>,
    pub code: ExchangeCode,
}

/// Outcome of a cancel call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelOutcome {
    /// The order was live and is now cancelled.
    Cancelled,
    /// Nothing to cancel: the order already left the book.
    NotFound,
}

/// Order operations against the remote exchange.
///
/// One logical in-flight order at a time; the caller owns that invariant.
#[async_trait]
pub trait OrderGateway: Send + Sync {
    /// Place a trigger order. Transport or validation failure is an error;
    /// the caller leaves its state untouched and the trail never starts.
    async fn place(&self, req: &PlaceOrder) -> GatewayResult<PlacedOrder>;

    /// Cancel by client label.
    async fn cancel(&self, order_id: &str, link_id: &ClientOrderId)
        -> GatewayResult<CancelOutcome>;

    /// Move the trigger price of a resting order.
    async fn amend_trigger(&self, order_id: &str, qty: Qty, trigger: Price) -> AmendOutcome;

    /// Change the quantity of a resting order.
    async fn amend_quantity(&self, order_id: &str, qty: Qty) -> AmendOutcome;

    /// Look up an order by exchange id, falling back to the label lookup
    /// when the id is unknown. An empty label result means the exchange
    /// lost the order entirely (`ExchangeCode::NotFoundLive`).
    async fn fetch_order(&self, order_id: &str, link_id: &ClientOrderId) -> FetchOutcome;

    /// Current wallet balance for a coin, in that coin's units.
    async fn wallet_balance(&self, coin: &str) -> GatewayResult<rust_decimal::Decimal>;
}

/// Access-token provider for privileged calls.
///
/// Implementations cache the token and refresh it on expiry; repeated
/// failure past the configured retry ceiling surfaces as an error that
/// fails the enclosing call.
#[async_trait]
pub trait AuthProvider: Send + Sync {
    /// Return a valid bearer token, refreshing or re-authenticating
    /// as needed.
    async fn access_token(&self) -> GatewayResult<String>;
}
