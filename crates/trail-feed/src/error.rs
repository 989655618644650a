//! Error types for trail-feed.

use thiserror::Error;

/// Feed error types.
#[derive(Debug, Error)]
pub enum FeedError {
    #[error("Insufficient history: need {need} bars, have {have}")]
    InsufficientHistory { need: usize, have: usize },

    #[error("Invalid feed configuration: {0}")]
    InvalidConfig(String),
}

/// Result type alias for feed operations.
pub type Result<T> = std::result::Result<T, FeedError>;
