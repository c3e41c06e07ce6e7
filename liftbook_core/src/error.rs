//! Error types for the liftbook_core library.

use std::io;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for liftbook_core operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Caller-supplied data failed a precondition (e.g. empty folder name)
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// A referenced folder or workout does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Durable bytes could not be decoded into a library
    #[error("Corrupt state: {0}")]
    CorruptState(String),

    /// The storage backend failed to read, write or clear
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// A mutation was issued before the store finished loading
    #[error("Store has not been loaded")]
    NotLoaded,

    /// IO error occurred
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// TOML parsing error
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Configuration validation error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// True when the edit was applied in memory but could not be made durable
    pub fn is_persistence(&self) -> bool {
        matches!(self, Error::Persistence(_))
    }

    /// True when the persisted library could not be decoded
    pub fn is_corrupt_state(&self) -> bool {
        matches!(self, Error::CorruptState(_))
    }
}
