//! Error types for EmberKV
//!
//! Provides a unified error type for all operations.

use thiserror::Error;

/// Result type alias using EmberError
pub type Result<T> = std::result::Result<T, EmberError>;

/// Unified error type for EmberKV operations
#[derive(Debug, Error)]
pub enum EmberError {
    // -------------------------------------------------------------------------
    // Caller Errors (no state change)
    // -------------------------------------------------------------------------
    #[error("Key not found")]
    NotFound,

    #[error("WRONGTYPE Operation against a key holding the wrong kind of value")]
    WrongType,

    #[error("Range error: {0}")]
    Range(String),

    // -------------------------------------------------------------------------
    // Value Log Errors
    // -------------------------------------------------------------------------
    #[error("Corrupt frame: {0}")]
    CorruptFrame(String),

    #[error("Frame out of range: offset={offset} length={length} cursor={cursor}")]
    OutOfRange { offset: u64, length: u32, cursor: u64 },

    // -------------------------------------------------------------------------
    // Index Log Errors
    // -------------------------------------------------------------------------
    #[error("Index journal corruption detected: {0}")]
    IndexCorruption(String),

    #[error("Partial recovery: {0}")]
    PartialRecovery(String),

    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // Serialization Errors
    // -------------------------------------------------------------------------
    #[error("Serialization error: {0}")]
    Serialization(String),

    // -------------------------------------------------------------------------
    // Protocol Errors
    // -------------------------------------------------------------------------
    #[error("Protocol error: {0}")]
    Protocol(String),

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),
}

impl EmberError {
    /// True for errors caused by the caller's input rather than the engine
    pub fn is_caller_error(&self) -> bool {
        matches!(
            self,
            EmberError::NotFound | EmberError::WrongType | EmberError::Range(_)
        )
    }
}
