//! Error types for trail-engine.

use thiserror::Error;

/// Engine error types.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Ledger(#[from] trail_ledger::LedgerError),

    #[error(transparent)]
    Gateway(#[from] trail_gateway::GatewayError),

    #[error("Invalid engine configuration: {0}")]
    InvalidConfig(String),
}

/// Result type alias for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;
