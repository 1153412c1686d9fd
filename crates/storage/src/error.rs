//! Storage error types.

use musicspot_core::AssetId;
use std::fmt;
use thiserror::Error;

/// Storage operation errors.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("object not found: {0}")]
    NotFound(String),

    #[error("object already exists: {0}")]
    AlreadyExists(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid key: {0}")]
    InvalidKey(String),

    #[error("write failed for asset {asset_id} at {position}: {source}")]
    WriteFailure {
        asset_id: AssetId,
        position: WritePosition,
        #[source]
        source: Box<StorageError>,
    },

    #[error("corrupt asset: {0}")]
    Corrupt(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("configuration error: {0}")]
    Config(String),
}

impl StorageError {
    /// Whether this error means the requested object or asset does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

/// Which object of an asset a failed write was targeting.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WritePosition {
    Segment(u32),
    Header,
}

impl fmt::Display for WritePosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Segment(sequence) => write!(f, "segment {sequence}"),
            Self::Header => write!(f, "header"),
        }
    }
}

/// Result type for storage operations.
pub type StorageResult<T> = std::result::Result<T, StorageError>;
