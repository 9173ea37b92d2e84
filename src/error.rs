//! # Error Types
//!
//! Custom error types for the IGC logger using `thiserror`.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for the IGC logger
#[derive(Debug, Error)]
pub enum IgcLoggerError {
    /// Open, seek, write, close or rename failed on the durable storage.
    /// The append is treated as a no-op: writer state is unchanged.
    #[error("Storage unavailable at {path}: {source}")]
    StorageUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The dated flight directory could not be created
    #[error("Failed to create directory {path}: {source}")]
    DirectoryCreateFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The incremented sequence counter could not be written back
    #[error("Failed to persist sequence counter '{key}': {source}")]
    SequencePersistFailed {
        key: String,
        #[source]
        source: std::io::Error,
    },

    /// A fix record was appended before the header block
    #[error("Fix record appended before the IGC header was written")]
    HeaderNotWritten,

    /// G-record verification failed or the file is malformed
    #[error("IGC verification failed: {0}")]
    Verification(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    /// Replay sample parse errors
    #[error("Sample parse error: {0}")]
    SampleParse(#[from] serde_json::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl IgcLoggerError {
    /// Wrap an I/O failure on `path` as [`IgcLoggerError::StorageUnavailable`]
    pub fn storage(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::StorageUnavailable {
            path: path.into(),
            source,
        }
    }

    /// True for failures that only cost the current append
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::StorageUnavailable { .. })
    }
}

/// Result type alias for the IGC logger
pub type Result<T> = std::result::Result<T, IgcLoggerError>;
