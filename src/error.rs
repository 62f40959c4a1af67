//! Error types for portdb
//!
//! Provides a unified error type for all operations.

use thiserror::Error;

/// Result type alias using PortError
pub type Result<T> = std::result::Result<T, PortError>;

/// Unified error type for portdb operations
#[derive(Debug, Error)]
pub enum PortError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // Feed Errors
    // -------------------------------------------------------------------------
    /// Malformed catalog input. `offset` is the byte offset into the stream.
    #[error("Decode error at byte {offset}: {message}")]
    Decode { offset: u64, message: String },

    #[error("Operation cancelled")]
    Cancelled,

    // -------------------------------------------------------------------------
    // Service Errors
    // -------------------------------------------------------------------------
    #[error("the store operation has failed: {0}")]
    StorageOperation(String),

    // -------------------------------------------------------------------------
    // WAL Errors
    // -------------------------------------------------------------------------
    #[error("WAL corruption detected: {0}")]
    WalCorruption(String),

    // -------------------------------------------------------------------------
    // Storage Errors
    // -------------------------------------------------------------------------
    #[error("Storage error: {0}")]
    Storage(String),

    // -------------------------------------------------------------------------
    // Serialization Errors
    // -------------------------------------------------------------------------
    #[error("Serialization error: {0}")]
    Serialization(String),

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),
}

impl PortError {
    /// Build a decode error at the given input offset
    pub fn decode(offset: u64, message: impl Into<String>) -> Self {
        PortError::Decode {
            offset,
            message: message.into(),
        }
    }

    /// True if this error reports cancellation rather than a failure
    pub fn is_cancelled(&self) -> bool {
        matches!(self, PortError::Cancelled)
    }
}

impl From<bincode::Error> for PortError {
    fn from(err: bincode::Error) -> Self {
        PortError::Serialization(err.to_string())
    }
}

impl From<serde_json::Error> for PortError {
    fn from(err: serde_json::Error) -> Self {
        PortError::Serialization(err.to_string())
    }
}
