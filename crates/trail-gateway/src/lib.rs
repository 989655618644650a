//! Exchange order gateway for trailbot.
//!
//! Provides the capability traits the trailing engine depends on
//! ([`OrderGateway`], [`AuthProvider`]) and a Deribit-style JSON-RPC
//! REST implementation. Every remote response passes the envelope
//! check before it is trusted, and every outcome the engine sees is a
//! structured [`trail_core::ExchangeCode`] — transport errors never
//! cross this boundary raw.

pub mod auth;
pub mod decode;
pub mod envelope;
pub mod error;
pub mod gateway;
pub mod mock;
pub mod rest;

pub use auth::{AccessToken, AuthConfig, RestAuthProvider};
pub use decode::OrderSnapshot;
pub use error::{GatewayError, GatewayResult};
pub use gateway::{
    AmendOutcome, AuthProvider, CancelOutcome, FetchOutcome, OrderGateway, PlaceOrder, PlacedOrder,
};
pub use mock::ScriptedGateway;
pub use rest::{RestGateway, RestGatewayConfig};
