//! Streaming market data connection for trailbot.
//!
//! One long-lived JSON-RPC websocket delivers index-price ticks and the
//! optional kline/book/trade channels. The connection task parses every
//! notification into a typed [`WsEvent`] and forwards it to the
//! dispatcher over an mpsc channel; on transport failure it reconnects
//! after a fixed delay and resubscribes everything.

pub mod connection;
pub mod error;
pub mod message;

pub use connection::{MarketStream, StreamConfig};
pub use error::{Result, WsError};
pub use message::{BookSnapshot, PublicTrade, WsEvent};
