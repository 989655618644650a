//! Error types for trail-ledger.

use std::path::PathBuf;
use thiserror::Error;

/// Ledger error types.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// The ledger file does not exist. Fatal at startup: running without
    /// the recorded lots would desync the bot from its own holdings.
    #[error("Ledger file not found: {0}")]
    FileMissing(PathBuf),

    #[error("Ledger I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Ledger serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("Revenue log error: {0}")]
    Revenue(#[from] csv::Error),
}

/// Result type alias for ledger operations.
pub type Result<T> = std::result::Result<T, LedgerError>;
