//! Decode boundary: raw exchange order payloads into typed snapshots.
//!
//! Internal code never inspects untyped JSON; everything the engine
//! touches has passed through [`OrderSnapshot::from_raw`] here.

use crate::error::{GatewayError, GatewayResult};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use trail_core::{BuyLot, ClientOrderId, LotStatus, OrderKind, OrderSide, OrderStatus, Price, Qty};

/// Raw order payload as the exchange reports it.
#[derive(Debug, Clone, Deserialize)]
pub struct RawOrder {
    pub order_id: String,
    #[serde(default)]
    pub label: String,
    pub creation_timestamp: i64,
    pub last_update_timestamp: i64,
    pub instrument_name: String,
    pub direction: String,
    pub order_type: String,
    pub order_state: String,
    /// Either a number or the literal `"market_price"` for untriggered
    /// stop-market orders.
    #[serde(default, deserialize_with = "de_price_or_market")]
    pub price: Option<Decimal>,
    #[serde(default)]
    pub average_price: Option<Decimal>,
    pub amount: Decimal,
    #[serde(default)]
    pub filled_amount: Option<Decimal>,
    /// Fee in base units; absent on some order states.
    #[serde(default)]
    pub commission: Option<Decimal>,
    #[serde(default)]
    pub trigger_price: Option<Decimal>,
}

/// Placement result payload: the order plus its fills, of which only
/// the order part matters here.
#[derive(Debug, Deserialize)]
pub struct RawPlaceResult {
    pub order: RawOrder,
}

fn de_price_or_market<'de, D>(deserializer: D) -> Result<Option<Decimal>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    match value {
        Value::Null => Ok(None),
        Value::String(s) if s == "market_price" => Ok(None),
        Value::String(s) => s.parse().map(Some).map_err(serde::de::Error::custom),
        Value::Number(n) => n
            .to_string()
            .parse()
            .map(Some)
            .map_err(serde::de::Error::custom),
        other => Err(serde::de::Error::custom(format!(
            "unexpected price value: {other}"
        ))),
    }
}

/// Typed view of a remote order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderSnapshot {
    pub order_id: String,
    pub order_link_id: ClientOrderId,
    pub created_time: i64,
    pub updated_time: i64,
    pub symbol: String,
    pub side: OrderSide,
    pub order_type: OrderKind,
    pub status: OrderStatus,
    pub price: Price,
    pub avg_price: Price,
    pub qty: Qty,
    pub cum_exec_qty: Qty,
    /// Executed value in quote units: filled amount times average price.
    pub cum_exec_value: Decimal,
    /// Executed fee in base units.
    pub cum_exec_fee: Decimal,
    pub trigger_price: Price,
}

impl OrderSnapshot {
    /// Decode a raw order, rejecting payloads with unknown enum values.
    pub fn from_raw(raw: RawOrder) -> GatewayResult<Self> {
        let side = match raw.direction.as_str() {
            "buy" => OrderSide::Buy,
            "sell" => OrderSide::Sell,
            other => {
                return Err(GatewayError::Decode(format!("unknown direction: {other}")));
            }
        };
        let order_type = match raw.order_type.as_str() {
            "limit" => OrderKind::Limit,
            "market" => OrderKind::Market,
            "stop_limit" => OrderKind::StopLimit,
            "stop_market" => OrderKind::StopMarket,
            other => {
                return Err(GatewayError::Decode(format!("unknown order type: {other}")));
            }
        };
        let status = OrderStatus::from_exchange(&raw.order_state)
            .ok_or_else(|| GatewayError::Decode(format!("unknown state: {}", raw.order_state)))?;

        let avg_price = raw.average_price.unwrap_or(Decimal::ZERO);
        let filled = raw.filled_amount.unwrap_or(Decimal::ZERO);

        Ok(Self {
            order_id: raw.order_id,
            order_link_id: ClientOrderId::new(raw.label),
            created_time: raw.creation_timestamp,
            updated_time: raw.last_update_timestamp,
            symbol: raw.instrument_name,
            side,
            order_type,
            status,
            price: Price::new(raw.price.unwrap_or(Decimal::ZERO)),
            avg_price: Price::new(avg_price),
            qty: Qty::new(raw.amount),
            cum_exec_qty: Qty::new(filled),
            cum_exec_value: filled * avg_price,
            cum_exec_fee: raw.commission.unwrap_or(Decimal::ZERO),
            trigger_price: Price::new(raw.trigger_price.unwrap_or(Decimal::ZERO)),
        })
    }

    /// Convert into a ledger lot with the given local status.
    pub fn into_lot(self, status: LotStatus) -> BuyLot {
        BuyLot {
            order_id: self.order_id,
            order_link_id: self.order_link_id,
            created_time: self.created_time,
            updated_time: self.updated_time,
            symbol: self.symbol,
            side: self.side,
            order_type: self.order_type,
            status,
            price: self.price,
            avg_price: self.avg_price,
            qty: self.qty,
            cum_exec_qty: self.cum_exec_qty,
            cum_exec_value: self.cum_exec_value,
            cum_exec_fee: self.cum_exec_fee,
            trigger_price: self.trigger_price,
        }
    }
}
