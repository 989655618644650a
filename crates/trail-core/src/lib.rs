//! Core domain types for the trailbot trading bot.
//!
//! This crate provides the fundamental types used throughout the system:
//! - `Price`, `Qty`: precision-safe numeric types
//! - `BuyLot`: one recorded buy fill awaiting a profitable sell
//! - `InstrumentInfo`: exchange trading constraints for the traded symbol
//! - `OrderSide`, `OrderStatus`, `ExchangeCode`: trading enums

pub mod decimal;
pub mod error;
pub mod instrument;
pub mod lot;
pub mod market;
pub mod order;

pub use decimal::{Price, Qty};
pub use error::{CoreError, Result};
pub use instrument::{Compounding, InstrumentInfo};
pub use lot::{BuyLot, LotStatus};
pub use market::{Kline, Ticker};
pub use order::{ClientOrderId, ExchangeCode, OrderKind, OrderSide, OrderStatus};
