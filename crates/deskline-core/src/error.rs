//! Error types for deskline-core

use thiserror::Error;

/// Result type alias using deskline-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in deskline-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// Database error
    #[error("Database error: {0}")]
    Database(String),

    /// libSQL error
    #[error("libSQL error: {0}")]
    LibSql(#[from] libsql::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Record not found
    #[error("Record not found: {0}")]
    NotFound(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// API HTTP transport failure
    #[error("API HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-success response from the remote service
    #[error("API error: {0}")]
    Api(String),
}
