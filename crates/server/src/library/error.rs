//! Errors raised by library operations.

use musicspot_core::ValidationError;
use musicspot_metadata::MetadataError;
use musicspot_storage::StorageError;

/// Library operation error.
#[derive(Debug, thiserror::Error)]
pub enum LibraryError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("forbidden: {0}")]
    Forbidden(String),

    /// A song references an asset that is gone.
    #[error("integrity violation: {0}")]
    Integrity(String),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("metadata error: {0}")]
    Metadata(#[from] MetadataError),
}

impl From<musicspot_core::Error> for LibraryError {
    fn from(err: musicspot_core::Error) -> Self {
        match err {
            musicspot_core::Error::Validation(e) => Self::Validation(e),
            musicspot_core::Error::Forbidden(msg) => Self::Forbidden(msg),
            other => Self::Integrity(other.to_string()),
        }
    }
}

pub type LibraryResult<T> = std::result::Result<T, LibraryError>;
