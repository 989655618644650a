//! JSON-RPC channel messages.
//!
//! Builds the subscription request and parses incoming notifications
//! into typed events. Unknown channels are reported as such so the
//! dispatcher can log them without crashing the stream.

use crate::error::Result;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::{json, Value};
use trail_core::{Kline, OrderSide, Price};

/// One side of a parsed order-book snapshot: `(price, quantity)`.
pub type BookLevels = Vec<(Decimal, Decimal)>;

/// Parsed order-book snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct BookSnapshot {
    pub time: i64,
    pub bids: BookLevels,
    pub asks: BookLevels,
}

/// Parsed public trade.
#[derive(Debug, Clone, PartialEq)]
pub struct PublicTrade {
    pub time: i64,
    pub side: OrderSide,
    pub qty: Decimal,
    pub price: Price,
}

/// Typed event delivered to the dispatcher.
#[derive(Debug, Clone, PartialEq)]
pub enum WsEvent {
    /// Index price tick.
    Tick { time: i64, price: Price },
    /// Kline update for one interval.
    Kline { interval_min: u32, bar: Kline },
    /// Order-book snapshot.
    Book(BookSnapshot),
    /// Batch of public trades.
    Trades(Vec<PublicTrade>),
    /// Subscription confirmation with the granted channels.
    Subscribed(Vec<String>),
    /// Notification on a channel nobody asked for.
    Unhandled { channel: String },
}

/// Channel name for the index-price stream.
pub fn price_channel(symbol: &str) -> String {
    format!("deribit_price_index.{}", symbol.to_lowercase())
}

/// Channel name for one kline interval.
pub fn kline_channel(symbol: &str, interval_min: u32) -> String {
    format!("chart.trades.{}.{}", symbol.to_uppercase(), interval_min)
}

/// Channel name for the order-book stream.
pub fn book_channel(symbol: &str) -> String {
    format!("book.{}.100ms", symbol.to_uppercase())
}

/// Channel name for the public trade stream.
pub fn trades_channel(symbol: &str) -> String {
    format!("trades.{}.100ms", symbol.to_uppercase())
}

/// Build the subscribe request for a channel list.
pub fn subscribe_request(channels: &[String]) -> String {
    json!({
        "jsonrpc": "2.0",
        "id": 3600,
        "method": "public/subscribe",
        "params": { "channels": channels }
    })
    .to_string()
}

/// Build an application-level ping request.
pub fn ping_request() -> String {
    json!({
        "jsonrpc": "2.0",
        "id": 9929,
        "method": "public/test",
        "params": {}
    })
    .to_string()
}

#[derive(Debug, Deserialize)]
struct Notification {
    #[serde(default)]
    method: Option<String>,
    /// Kept loose: heartbeat frames carry params without a channel.
    #[serde(default)]
    params: Option<Value>,
    /// Response to our subscribe request: the granted channel list.
    #[serde(default)]
    result: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct NotificationParams {
    channel: String,
    data: Value,
}

#[derive(Debug, Deserialize)]
struct RawTick {
    timestamp: i64,
    price: Decimal,
}

#[derive(Debug, Deserialize)]
struct RawBar {
    tick: i64,
    open: Decimal,
    high: Decimal,
    low: Decimal,
    close: Decimal,
    volume: Decimal,
    cost: Decimal,
}

#[derive(Debug, Deserialize)]
struct RawBook {
    timestamp: i64,
    #[serde(default)]
    bids: Vec<(Decimal, Decimal)>,
    #[serde(default)]
    asks: Vec<(Decimal, Decimal)>,
}

#[derive(Debug, Deserialize)]
struct RawTrade {
    timestamp: i64,
    direction: String,
    amount: Decimal,
    price: Decimal,
}

/// Parse one incoming frame. Returns `None` for frames that carry no
/// event (plain RPC acks, heartbeats).
pub fn parse_message(text: &str) -> Result<Option<WsEvent>> {
    let notification: Notification = serde_json::from_str(text)?;

    if let Some(raw_params) = notification.params {
        // Heartbeats and other server-initiated RPCs carry no channel.
        if notification.method.as_deref() != Some("subscription") {
            return Ok(None);
        }
        let params: NotificationParams = serde_json::from_value(raw_params)?;
        let channel = params.channel;
        let event = if channel.starts_with("deribit_price_index.") {
            let tick: RawTick = serde_json::from_value(params.data)?;
            WsEvent::Tick {
                time: tick.timestamp,
                price: Price::new(tick.price),
            }
        } else if channel.starts_with("chart.trades.") {
            let interval_min = channel
                .rsplit('.')
                .next()
                .and_then(|part| part.parse().ok())
                .unwrap_or(0);
            let bar: RawBar = serde_json::from_value(params.data)?;
            WsEvent::Kline {
                interval_min,
                bar: Kline {
                    time: bar.tick,
                    open: Price::new(bar.open),
                    high: Price::new(bar.high),
                    low: Price::new(bar.low),
                    close: Price::new(bar.close),
                    volume: bar.volume,
                    turnover: bar.cost,
                },
            }
        } else if channel.starts_with("book.") {
            let book: RawBook = serde_json::from_value(params.data)?;
            WsEvent::Book(BookSnapshot {
                time: book.timestamp,
                bids: book.bids,
                asks: book.asks,
            })
        } else if channel.starts_with("trades.") {
            let raw: Vec<RawTrade> = serde_json::from_value(params.data)?;
            let trades = raw
                .into_iter()
                .map(|t| PublicTrade {
                    time: t.timestamp,
                    side: if t.direction == "buy" {
                        OrderSide::Buy
                    } else {
                        OrderSide::Sell
                    },
                    qty: t.amount,
                    price: Price::new(t.price),
                })
                .collect();
            WsEvent::Trades(trades)
        } else {
            WsEvent::Unhandled { channel }
        };
        return Ok(Some(event));
    }

    if let Some(Value::Array(granted)) = notification.result {
        let channels = granted
            .into_iter()
            .filter_map(|v| v.as_str().map(str::to_string))
            .collect();
        return Ok(Some(WsEvent::Subscribed(channels)));
    }

    Ok(None)
}
