//! Common error types for the OSINT aggregator

use thiserror::Error;

/// Common result type for aggregator operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types shared by the engine and its storage layer
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation error (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encoding or decoding error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// The lookup query was empty, too long, or otherwise unusable
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}
