//! HTTP service for Music Spot audio assets.
//!
//! This crate provides:
//! - Song upload with validation into the chunk store
//! - Streaming of stored assets
//! - Owner-only edit and deletion
//! - Reconciliation of the chunk store against song metadata

pub mod auth;
pub mod error;
pub mod handlers;
pub mod library;
pub mod metrics;
pub mod routes;
pub mod state;

pub use auth::{AuthenticatedUser, RequestId};
pub use error::ApiError;
pub use library::{DeleteOutcome, Library, LibraryError, OrphanReport, PurgeStats, UploadOutcome};
pub use routes::create_router;
pub use state::AppState;
