//! Error types for the core domain.

use thiserror::Error;

/// Core domain error type.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid identifier: {0}")]
    InvalidId(String),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("forbidden: {0}")]
    Forbidden(String),
}

/// User-correctable upload and edit errors.
///
/// The display strings are part of the HTTP contract.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("file required")]
    FileRequired,

    #[error("unsupported file type")]
    UnsupportedFileType,

    #[error("file too large")]
    FileTooLarge { size: u64, max: u64 },

    #[error("title and artist required")]
    TitleAndArtistRequired,

    #[error("year must be a number")]
    InvalidYear,
}

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, Error>;
