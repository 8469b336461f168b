//! Error types for the kestrel toolkit
//!
//! Lookup misses (no nearby segment, edge not found) are not errors: they are
//! reported through `Option` or the `SPECIAL_*` sentinels in [`crate::types`].

use std::path::PathBuf;

/// Library error type shared by every kestrel crate
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The leaf page file of a spatial index could not be found
    #[error("leaf index file not found: {}", .0.display())]
    MissingLeafIndex(PathBuf),

    /// Construction input contained nothing to work with
    #[error("empty dataset: {0}")]
    EmptyDataset(&'static str),

    /// Invalid or inconsistent configuration value
    #[error("configuration error: {0}")]
    Config(String),

    /// A one-shot operation was invoked a second time
    #[error("operation has already been run")]
    AlreadyRun,

    /// Invariant violation in graph data (non-positive weight, broken ranges, overflow)
    #[error("data integrity violation: {0}")]
    DataIntegrity(String),

    /// A persisted file does not have the expected layout
    #[error("invalid format in {}: {reason}", file.display())]
    InvalidFormat { file: PathBuf, reason: String },

    /// Footer checksum does not match the file body
    #[error("checksum mismatch in {}: expected {expected:#010x}, found {found:#010x}", file.display())]
    ChecksumMismatch {
        file: PathBuf,
        expected: u32,
        found: u32,
    },

    /// A query did not complete before its deadline
    #[error("query deadline exceeded")]
    DeadlineExceeded,

    /// Coordinate outside the valid latitude/longitude range
    #[error("invalid coordinate: {0}")]
    InvalidCoordinate(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub fn integrity(message: impl Into<String>) -> Self {
        Error::DataIntegrity(message.into())
    }

    pub fn format(file: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Error::InvalidFormat {
            file: file.into(),
            reason: reason.into(),
        }
    }
}

/// Result type alias for kestrel operations
pub type Result<T> = std::result::Result<T, Error>;
