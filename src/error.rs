//! STRATA - Error Types
//! Failure modes of the engine. Absent and deleted keys are not errors;
//! they are `ReadResult` variants.

use thiserror::Error;

/// Custom Result type for the Strata engine.
pub type Result<T> = std::result::Result<T, StrataError>;

/// Error types for the Strata storage engine.
#[derive(Error, Debug)]
pub enum StrataError {
    /// I/O errors (WAL files, spawning the compaction thread).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Data corruption detected (CRC mismatch).
    #[error("Data corruption detected: {0}")]
    Corruption(String),

    /// Configuration rejected at startup.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The background compaction thread could not be stopped cleanly.
    #[error("Shutdown error: {0}")]
    Shutdown(String),
}

impl From<bincode::Error> for StrataError {
    fn from(err: bincode::Error) -> Self {
        StrataError::Serialization(err.to_string())
    }
}
