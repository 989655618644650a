//! Error types for trail-gateway.

use thiserror::Error;

/// Gateway error types.
///
/// `Transport` and `Auth` mark this attempt as failed without mutating
/// any order or lot state; callers decide whether to retry or bail.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("Transport failure: {0}")]
    Transport(String),

    #[error("Authentication failed after {attempts} attempts: {message}")]
    Auth { attempts: u32, message: String },

    #[error("Exchange rejected request: {message}")]
    Rejected { message: String },

    #[error("Failed to decode exchange response: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for GatewayError {
    fn from(e: reqwest::Error) -> Self {
        Self::Transport(e.to_string())
    }
}

/// Result type alias for gateway operations.
pub type GatewayResult<T> = std::result::Result<T, GatewayError>;
