//! Error types for the application crate.

use thiserror::Error;

/// Application error types.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Startup precheck failed: {0}")]
    Precheck(String),

    #[error(transparent)]
    Ledger(#[from] trail_ledger::LedgerError),

    #[error(transparent)]
    Gateway(#[from] trail_gateway::GatewayError),

    #[error(transparent)]
    Engine(#[from] trail_engine::EngineError),

    #[error(transparent)]
    Ws(#[from] trail_ws::WsError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for application operations.
pub type AppResult<T> = std::result::Result<T, AppError>;
