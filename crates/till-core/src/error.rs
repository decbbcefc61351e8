//! Error types for till-core

use thiserror::Error;

/// Result type alias using till-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in till-core operations
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

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Transport-level HTTP failure (connection refused, timeout, ...)
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The backend answered with a non-success status
    #[error("{message} ({status})")]
    Remote { status: u16, message: String },

    /// Entity not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Operation needs the backend but connectivity is down
    #[error("Offline: {0}")]
    Offline(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Whether this is a remote 404.
    pub const fn is_remote_not_found(&self) -> bool {
        matches!(self, Self::Remote { status: 404, .. })
    }
}
