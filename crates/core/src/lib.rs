//! Core domain types and shared logic for the Music Spot asset service.
//!
//! This crate defines the canonical data model used across all other crates:
//! - Song, asset and user identifiers
//! - Song metadata records and editable fields
//! - Asset headers and the segment layout used by the chunk store
//! - Upload validation rules
//! - Configuration types

pub mod asset;
pub mod config;
pub mod error;
pub mod ids;
pub mod song;
pub mod upload;

pub use asset::{AssetHeader, DEFAULT_CONTENT_TYPE, SEGMENT_SIZE};
pub use error::{Error, Result, ValidationError};
pub use ids::{AssetId, SongId, UserId};
pub use song::{Requester, Song, SongFields};
pub use upload::{
    ALLOWED_EXTENSIONS, MAX_UPLOAD_BYTES, UploadRequest, UploadedFile, ValidatedUpload,
};
