//! Error types for trail-ws.

use thiserror::Error;

/// Websocket error types.
#[derive(Debug, Error)]
pub enum WsError {
    #[error("Websocket transport error: {0}")]
    Transport(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("Websocket message parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Connection closed by server: {reason}")]
    Closed { reason: String },

    #[error("Event receiver dropped")]
    ReceiverGone,
}

/// Result type alias for websocket operations.
pub type Result<T> = std::result::Result<T, WsError>;
